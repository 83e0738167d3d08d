//! Request admission: tenant resolution, key ownership and quota checks.
//!
//! Checks run in a fixed order and the first failure is terminal. Usage
//! accounting for admitted requests is dispatched as detached work so it never
//! delays the request.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::ports::{
    AdmissionRequest, TenantAdmission, TenantResolver, TenantResolverError, UsageLedger,
};
use crate::domain::{spawn_detached, Error, TenantContext, TenantId, TenantRef, UsageField};

/// Admission gateway logic over the tenant resolver and usage ledger.
#[derive(Clone)]
pub struct AdmissionService<R, U> {
    resolver: Arc<R>,
    usage: Arc<U>,
}

impl<R, U> AdmissionService<R, U> {
    pub fn new(resolver: Arc<R>, usage: Arc<U>) -> Self {
        Self { resolver, usage }
    }
}

fn map_resolver_error(error: TenantResolverError) -> Error {
    match error {
        TenantResolverError::Connection { message } => {
            Error::service_unavailable(format!("tenant directory unavailable: {message}"))
        }
        TenantResolverError::Query { message } => {
            Error::internal(format!("tenant directory error: {message}"))
        }
    }
}

fn parse_tenant_ref(raw: Option<&str>) -> Result<TenantRef, Error> {
    raw.and_then(TenantRef::parse)
        .ok_or_else(|| Error::invalid_request("Project ID required"))
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|text| !text.is_empty())
}

impl<R, U> AdmissionService<R, U>
where
    R: TenantResolver + 'static,
    U: UsageLedger + 'static,
{
    async fn enforce_quota(&self, tenant_id: &TenantId, path: &str) -> Result<(), Error> {
        match self.usage.get_usage(tenant_id).await {
            Ok(Some(usage)) => usage.check_path(path).map_err(|dimension| {
                debug!(%tenant_id, ?dimension, "quota exhausted");
                Error::new(dimension.error_code(), dimension.message())
            }),
            Ok(None) => Ok(()),
            Err(error) => {
                warn!(%tenant_id, %error, "usage lookup failed; admitting without quota check");
                Ok(())
            }
        }
    }

    fn record_usage(&self, tenant_id: TenantId, key_id: Uuid) {
        let resolver = Arc::clone(&self.resolver);
        spawn_detached("api_key_usage", async move {
            if let Err(error) = resolver.record_api_key_usage(key_id).await {
                warn!(%key_id, %error, "failed to record API key usage");
            }
        });
        let usage = Arc::clone(&self.usage);
        spawn_detached("api_call_usage", async move {
            if let Err(error) = usage
                .increment_field(&tenant_id, UsageField::ApiCalls, 1)
                .await
            {
                warn!(%tenant_id, %error, "failed to record API call");
            }
        });
    }
}

#[async_trait]
impl<R, U> TenantAdmission for AdmissionService<R, U>
where
    R: TenantResolver + 'static,
    U: UsageLedger + 'static,
{
    async fn admit(&self, request: &AdmissionRequest) -> Result<TenantContext, Error> {
        let tenant_ref = parse_tenant_ref(request.tenant_ref.as_deref())?;
        let raw_key = non_blank(request.api_key.as_deref())
            .ok_or_else(|| Error::unauthorized("API Key required"))?;

        let key = self
            .resolver
            .find_api_key(raw_key)
            .await
            .map_err(map_resolver_error)?
            .filter(|key| !key.revoked)
            .ok_or_else(|| Error::unauthorized("Invalid API Key"))?;

        let project = self
            .resolver
            .find_project(&tenant_ref)
            .await
            .map_err(map_resolver_error)?
            .ok_or_else(|| Error::not_found("Project not found"))?;

        if !key.belongs_to(&project) {
            warn!(
                key_id = %key.id,
                key_project = %key.project_id,
                requested_project = %project.id,
                "API key used against a foreign project"
            );
            return Err(Error::forbidden("Security Violation"));
        }

        self.enforce_quota(&project.id, &request.path).await?;
        self.record_usage(project.id, key.id);

        Ok(TenantContext::new(project.id, project.reference_id).with_api_key(key.id))
    }

    async fn resolve_tenant(&self, tenant_ref: &str) -> Result<TenantContext, Error> {
        let tenant_ref = parse_tenant_ref(Some(tenant_ref))?;
        let project = self
            .resolver
            .find_project(&tenant_ref)
            .await
            .map_err(map_resolver_error)?
            .ok_or_else(|| Error::not_found("Project not found"))?;
        Ok(TenantContext::new(project.id, project.reference_id))
    }
}

#[cfg(test)]
#[path = "admission_service_tests.rs"]
mod tests;
