//! PostgreSQL-backed realtime event log.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use uuid::Uuid;

use crate::domain::ports::{EventRepository, EventRepositoryError};
use crate::domain::{EventKind, NewEvent, RealtimeEvent, TenantId};

use super::diesel_basic_error_mapping::{map_basic_diesel_error, map_basic_pool_error};
use super::models::{EventRow, NewEventRow};
use super::pool::{DbPool, PoolError};
use super::schema::realtime_events;

/// Append-only log in `realtime_events`.
#[derive(Clone)]
pub struct DieselEventRepository {
    pool: DbPool,
}

impl DieselEventRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_pool_error(error: PoolError) -> EventRepositoryError {
    map_basic_pool_error(error, EventRepositoryError::connection)
}

fn map_diesel_error(error: diesel::result::Error) -> EventRepositoryError {
    map_basic_diesel_error(
        error,
        EventRepositoryError::query,
        EventRepositoryError::connection,
    )
}

impl From<EventRow> for RealtimeEvent {
    fn from(row: EventRow) -> Self {
        Self {
            id: row.id,
            channel_id: row.channel_id,
            project_id: TenantId::from_uuid(row.project_id),
            event_type: EventKind::parse_lenient(&row.event_type),
            payload: row.payload,
            sender_id: row.sender_id,
            delivered_count: row.delivered_count,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl EventRepository for DieselEventRepository {
    async fn append(
        &self,
        tenant_id: &TenantId,
        event: &NewEvent,
    ) -> Result<RealtimeEvent, EventRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row = diesel::insert_into(realtime_events::table)
            .values(NewEventRow {
                channel_id: event.channel_id,
                project_id: *tenant_id.as_uuid(),
                event_type: event.event_type.as_str(),
                payload: &event.payload,
                sender_id: event.sender_id.as_deref(),
                created_at: event.created_at,
            })
            .returning(EventRow::as_returning())
            .get_result(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        Ok(row.into())
    }

    async fn history(
        &self,
        tenant_id: &TenantId,
        channel_id: Uuid,
        limit: i64,
    ) -> Result<Vec<RealtimeEvent>, EventRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let rows: Vec<EventRow> = realtime_events::table
            .filter(realtime_events::project_id.eq(tenant_id.as_uuid()))
            .filter(realtime_events::channel_id.eq(channel_id))
            .order_by((realtime_events::created_at.desc(), realtime_events::id.desc()))
            .limit(limit)
            .select(EventRow::as_select())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        Ok(rows.into_iter().map(RealtimeEvent::from).collect())
    }

    async fn record_delivery(
        &self,
        tenant_id: &TenantId,
        event_id: Uuid,
        delivered_count: i32,
    ) -> Result<Option<RealtimeEvent>, EventRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row = diesel::update(
            realtime_events::table
                .filter(realtime_events::project_id.eq(tenant_id.as_uuid()))
                .filter(realtime_events::id.eq(event_id)),
        )
        .set(realtime_events::delivered_count.eq(delivered_count))
        .returning(EventRow::as_returning())
        .get_result(&mut conn)
        .await
        .optional()
        .map_err(map_diesel_error)?;
        Ok(row.map(RealtimeEvent::from))
    }

    async fn delete(
        &self,
        tenant_id: &TenantId,
        event_id: Uuid,
    ) -> Result<bool, EventRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let deleted = diesel::delete(
            realtime_events::table
                .filter(realtime_events::project_id.eq(tenant_id.as_uuid()))
                .filter(realtime_events::id.eq(event_id)),
        )
        .execute(&mut conn)
        .await
        .map_err(map_diesel_error)?;
        Ok(deleted > 0)
    }
}
