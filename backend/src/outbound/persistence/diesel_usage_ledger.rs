//! PostgreSQL-backed usage ledger.
//!
//! Counters are changed with a single `UPDATE ... SET col = col + $delta`
//! so concurrent requests never lose increments.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel::sql_query;
use diesel::sql_types::{Integer, Uuid as SqlUuid};
use diesel_async::RunQueryDsl;
use tracing::debug;

use crate::domain::ports::{UsageLedger, UsageLedgerError};
use crate::domain::{Allowance, StorageAllowance, TenantId, UsageField, UsageRecord};

use super::diesel_basic_error_mapping::{map_basic_diesel_error, map_basic_pool_error};
use super::models::UsageRow;
use super::pool::{DbPool, PoolError};
use super::schema::project_usages;

/// Reads and adjusts the `project_usages` row of each tenant.
#[derive(Clone)]
pub struct DieselUsageLedger {
    pool: DbPool,
}

impl DieselUsageLedger {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_pool_error(error: PoolError) -> UsageLedgerError {
    map_basic_pool_error(error, UsageLedgerError::connection)
}

fn map_diesel_error(error: diesel::result::Error) -> UsageLedgerError {
    map_basic_diesel_error(error, UsageLedgerError::query, UsageLedgerError::connection)
}

/// Statement for one counter. The column comes from [`UsageField::column`],
/// never from caller input; counters are floored at zero.
fn increment_statement(field: UsageField) -> String {
    let column = field.column();
    format!(
        "UPDATE project_usages SET {column} = GREATEST({column} + $1, 0), updated_at = NOW() \
         WHERE project_id = $2"
    )
}

impl From<UsageRow> for UsageRecord {
    fn from(row: UsageRow) -> Self {
        Self {
            tenant_id: TenantId::from_uuid(row.project_id),
            api_calls: Allowance::new(row.api_calls, row.api_calls_limit),
            auth_users: Allowance::new(row.auth_users_count, row.auth_users_limit),
            documents: Allowance::new(row.documents_count, row.documents_limit),
            storage: StorageAllowance::new(row.storage_used_mb, row.storage_limit_mb),
            notifications: Allowance::new(row.notifications_count, row.notifications_limit),
            realtime_channels: Allowance::new(
                row.realtime_channels_count,
                row.realtime_channels_limit,
            ),
            realtime_events: Allowance::new(row.realtime_events_count, row.realtime_events_limit),
        }
    }
}

#[async_trait]
impl UsageLedger for DieselUsageLedger {
    async fn get_usage(&self, tenant_id: &TenantId) -> Result<Option<UsageRecord>, UsageLedgerError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row = project_usages::table
            .filter(project_usages::project_id.eq(tenant_id.as_uuid()))
            .select(UsageRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        Ok(row.map(UsageRecord::from))
    }

    async fn increment_field(
        &self,
        tenant_id: &TenantId,
        field: UsageField,
        delta: i32,
    ) -> Result<(), UsageLedgerError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let updated = sql_query(increment_statement(field))
            .bind::<Integer, _>(delta)
            .bind::<SqlUuid, _>(*tenant_id.as_uuid())
            .execute(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        if updated == 0 {
            debug!(%tenant_id, %field, "no usage record to adjust");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use uuid::Uuid;

    #[rstest]
    #[case(UsageField::ApiCalls, "SET api_calls = GREATEST(api_calls + $1, 0)")]
    #[case(UsageField::StorageMb, "SET storage_used_mb = GREATEST(storage_used_mb + $1, 0)")]
    #[case(
        UsageField::RealtimeEvents,
        "SET realtime_events_count = GREATEST(realtime_events_count + $1, 0)"
    )]
    fn statements_target_one_fixed_column(#[case] field: UsageField, #[case] expected: &str) {
        let statement = increment_statement(field);
        assert!(statement.contains(expected), "{statement}");
        assert!(statement.ends_with("WHERE project_id = $2"));
    }

    #[rstest]
    fn rows_map_limits_alongside_counters() {
        let tenant = Uuid::new_v4();
        let record = UsageRecord::from(UsageRow {
            project_id: tenant,
            api_calls: 10,
            api_calls_limit: 1000,
            auth_users_count: 1,
            auth_users_limit: -1,
            documents_count: 50,
            documents_limit: 50,
            storage_used_mb: 1.5,
            storage_limit_mb: 100.0,
            notifications_count: 0,
            notifications_limit: -1,
            realtime_channels_count: 2,
            realtime_channels_limit: 5,
            realtime_events_count: 9,
            realtime_events_limit: -1,
        });

        assert_eq!(record.tenant_id, TenantId::from_uuid(tenant));
        assert!(record.documents.is_exhausted());
        assert!(!record.api_calls.is_exhausted());
        assert_eq!(record.realtime_channels, Allowance::new(2, 5));
    }
}
