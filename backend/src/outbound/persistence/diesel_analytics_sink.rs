//! PostgreSQL-backed analytics sink with monthly buckets.

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, Utc};
use diesel::sql_query;
use diesel::sql_types::{BigInt, Date, Text, Uuid as SqlUuid};
use diesel_async::RunQueryDsl;

use crate::domain::ports::{AnalyticsSink, AnalyticsSinkError};
use crate::domain::{AnalyticsType, TenantId};

use super::pool::{DbPool, PoolError};

/// Accumulates metrics into `analytics(project_id, type, period_start)`.
#[derive(Clone)]
pub struct DieselAnalyticsSink {
    pool: DbPool,
}

impl DieselAnalyticsSink {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

// The metric key is bound twice: once as a path element, once for `->>`.
const TRACK_SQL: &str = r#"
INSERT INTO analytics (project_id, type, period_start, metrics)
VALUES ($1, $2, $3, jsonb_build_object($4::text, $5::numeric))
ON CONFLICT (project_id, type, period_start) DO UPDATE SET
    metrics = jsonb_set(
        analytics.metrics,
        ARRAY[$4]::text[],
        to_jsonb(COALESCE((analytics.metrics ->> $4)::numeric, 0) + $5::numeric),
        true
    ),
    updated_at = NOW()
"#;

fn map_pool_error(error: PoolError) -> AnalyticsSinkError {
    AnalyticsSinkError::connection(error.into_message())
}

fn map_diesel_error(error: diesel::result::Error) -> AnalyticsSinkError {
    AnalyticsSinkError::write(error.to_string())
}

/// First day of the month containing `today`.
fn period_start(today: NaiveDate) -> NaiveDate {
    today.with_day(1).unwrap_or(today)
}

#[async_trait]
impl AnalyticsSink for DieselAnalyticsSink {
    async fn track(
        &self,
        tenant_id: &TenantId,
        metric_type: AnalyticsType,
        key: &str,
        delta: i64,
    ) -> Result<(), AnalyticsSinkError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        sql_query(TRACK_SQL)
            .bind::<SqlUuid, _>(*tenant_id.as_uuid())
            .bind::<Text, _>(metric_type.as_str())
            .bind::<Date, _>(period_start(Utc::now().date_naive()))
            .bind::<Text, _>(key)
            .bind::<BigInt, _>(delta)
            .execute(&mut conn)
            .await
            .map(|_| ())
            .map_err(map_diesel_error)
    }
}
