//! Driving port for request admission.
//!
//! The HTTP middleware extracts raw credentials and hands them to this port;
//! the port decides whether the request may proceed and, if so, under which
//! tenant identity.

use async_trait::async_trait;

use crate::domain::{Error, TenantContext};

/// Raw credentials pulled from an inbound request.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AdmissionRequest {
    /// Tenant reference from the path or query string.
    pub tenant_ref: Option<String>,
    /// API key from the `x-api-key` header or `api_key` query parameter.
    pub api_key: Option<String>,
    /// Request path, used to select the quota dimension.
    pub path: String,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TenantAdmission: Send + Sync {
    /// Admit or reject a request. Rejections are terminal.
    async fn admit(&self, request: &AdmissionRequest) -> Result<TenantContext, Error>;

    /// Resolve a raw tenant reference without key or quota checks. Blank
    /// input is rejected like a missing reference.
    ///
    /// Used by the WebSocket handshake, which cannot carry the key header in
    /// every client.
    async fn resolve_tenant(&self, tenant_ref: &str) -> Result<TenantContext, Error>;
}

/// Admission that rejects everything as unauthenticated.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureTenantAdmission;

#[async_trait]
impl TenantAdmission for FixtureTenantAdmission {
    async fn admit(&self, _request: &AdmissionRequest) -> Result<TenantContext, Error> {
        Err(Error::unauthorized("API Key required"))
    }

    async fn resolve_tenant(&self, _tenant_ref: &str) -> Result<TenantContext, Error> {
        Err(Error::not_found("Project not found"))
    }
}
