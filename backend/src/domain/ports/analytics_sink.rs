//! Port for best-effort analytics counters.

use async_trait::async_trait;

use crate::domain::{AnalyticsType, TenantId};

use super::define_port_error;

define_port_error! {
    /// Errors raised by analytics sink adapters.
    pub enum AnalyticsSinkError {
        Connection { message: String } =>
            "analytics sink connection failed: {message}",
        Write { message: String } =>
            "analytics sink write failed: {message}",
    }
}

/// Accumulates per-tenant metric deltas.
///
/// Callers never await this on a request path; see
/// [`crate::domain::spawn_detached`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AnalyticsSink: Send + Sync {
    async fn track(
        &self,
        tenant_id: &TenantId,
        metric_type: AnalyticsType,
        key: &str,
        delta: i64,
    ) -> Result<(), AnalyticsSinkError>;
}

/// Sink that discards every metric.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureAnalyticsSink;

#[async_trait]
impl AnalyticsSink for FixtureAnalyticsSink {
    async fn track(
        &self,
        _tenant_id: &TenantId,
        _metric_type: AnalyticsType,
        _key: &str,
        _delta: i64,
    ) -> Result<(), AnalyticsSinkError> {
        Ok(())
    }
}
