//! Port for resolving tenants and API keys.
//!
//! Implemented by the tenant-management collaborator. The admission gateway
//! is the only consumer; downstream services trust the resolved identity.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{ApiKeyRecord, Project, TenantRef};

use super::define_port_error;

define_port_error! {
    /// Errors raised by tenant resolver adapters.
    pub enum TenantResolverError {
        /// Backing store could not be reached.
        Connection { message: String } =>
            "tenant resolver connection failed: {message}",
        /// Lookup failed during execution.
        Query { message: String } =>
            "tenant resolver query failed: {message}",
    }
}

/// Lookup contract for projects and their API keys.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TenantResolver: Send + Sync {
    /// Resolve a project by internal id or public reference slug.
    async fn find_project(&self, reference: &TenantRef)
        -> Result<Option<Project>, TenantResolverError>;

    /// Resolve a raw API key string. Revoked keys are still returned so the
    /// caller can distinguish them.
    async fn find_api_key(&self, key: &str) -> Result<Option<ApiKeyRecord>, TenantResolverError>;

    /// Bump the key's own usage counter and last-used timestamp.
    async fn record_api_key_usage(&self, key_id: Uuid) -> Result<(), TenantResolverError>;
}

/// Resolver that knows no tenants.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureTenantResolver;

#[async_trait]
impl TenantResolver for FixtureTenantResolver {
    async fn find_project(
        &self,
        _reference: &TenantRef,
    ) -> Result<Option<Project>, TenantResolverError> {
        Ok(None)
    }

    async fn find_api_key(&self, _key: &str) -> Result<Option<ApiKeyRecord>, TenantResolverError> {
        Ok(None)
    }

    async fn record_api_key_usage(&self, _key_id: Uuid) -> Result<(), TenantResolverError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fixture_resolves_nothing() {
        let resolver = FixtureTenantResolver;
        let project = resolver
            .find_project(&TenantRef::Reference("acme".to_owned()))
            .await
            .expect("fixture lookup succeeds");
        assert!(project.is_none());
        let key = resolver
            .find_api_key("pk_live")
            .await
            .expect("fixture lookup succeeds");
        assert!(key.is_none());
    }

    #[test]
    fn errors_format_their_message() {
        let error = TenantResolverError::connection("refused");
        assert_eq!(error.to_string(), "tenant resolver connection failed: refused");
    }
}
