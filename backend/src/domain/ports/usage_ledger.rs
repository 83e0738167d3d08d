//! Port for the per-tenant usage ledger.
//!
//! Increments are atomic at the store. Callers dispatch them as detached work
//! and accept over-counting on retry.

use async_trait::async_trait;

use crate::domain::{TenantId, UsageField, UsageRecord};

use super::define_port_error;

define_port_error! {
    /// Errors raised by usage ledger adapters.
    pub enum UsageLedgerError {
        /// Backing store could not be reached.
        Connection { message: String } =>
            "usage ledger connection failed: {message}",
        /// Read or update failed during execution.
        Query { message: String } =>
            "usage ledger query failed: {message}",
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UsageLedger: Send + Sync {
    /// Current usage snapshot; `None` when no record exists yet.
    async fn get_usage(&self, tenant_id: &TenantId) -> Result<Option<UsageRecord>, UsageLedgerError>;

    /// Apply `delta` to one counter in a single statement.
    async fn increment_field(
        &self,
        tenant_id: &TenantId,
        field: UsageField,
        delta: i32,
    ) -> Result<(), UsageLedgerError>;
}

/// Ledger with no records that accepts and discards every increment.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureUsageLedger;

#[async_trait]
impl UsageLedger for FixtureUsageLedger {
    async fn get_usage(
        &self,
        _tenant_id: &TenantId,
    ) -> Result<Option<UsageRecord>, UsageLedgerError> {
        Ok(None)
    }

    async fn increment_field(
        &self,
        _tenant_id: &TenantId,
        _field: UsageField,
        _delta: i32,
    ) -> Result<(), UsageLedgerError> {
        Ok(())
    }
}
