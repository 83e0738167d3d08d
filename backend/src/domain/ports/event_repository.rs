//! Port for the append-only realtime event log.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{NewEvent, RealtimeEvent, TenantId};

use super::define_port_error;

define_port_error! {
    /// Errors raised by event repository adapters.
    pub enum EventRepositoryError {
        /// Backing store could not be reached.
        Connection { message: String } =>
            "event repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } =>
            "event repository query failed: {message}",
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EventRepository: Send + Sync {
    async fn append(
        &self,
        tenant_id: &TenantId,
        event: &NewEvent,
    ) -> Result<RealtimeEvent, EventRepositoryError>;

    /// Most recent events on a channel, newest first.
    async fn history(
        &self,
        tenant_id: &TenantId,
        channel_id: Uuid,
        limit: i64,
    ) -> Result<Vec<RealtimeEvent>, EventRepositoryError>;

    /// Overwrite delivery bookkeeping. The payload is never touched.
    async fn record_delivery(
        &self,
        tenant_id: &TenantId,
        event_id: Uuid,
        delivered_count: i32,
    ) -> Result<Option<RealtimeEvent>, EventRepositoryError>;

    async fn delete(&self, tenant_id: &TenantId, event_id: Uuid)
        -> Result<bool, EventRepositoryError>;
}

/// Log that stores nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureEventRepository;

#[async_trait]
impl EventRepository for FixtureEventRepository {
    async fn append(
        &self,
        _tenant_id: &TenantId,
        _event: &NewEvent,
    ) -> Result<RealtimeEvent, EventRepositoryError> {
        Err(EventRepositoryError::connection(
            "fixture repository has no backing store",
        ))
    }

    async fn history(
        &self,
        _tenant_id: &TenantId,
        _channel_id: Uuid,
        _limit: i64,
    ) -> Result<Vec<RealtimeEvent>, EventRepositoryError> {
        Ok(Vec::new())
    }

    async fn record_delivery(
        &self,
        _tenant_id: &TenantId,
        _event_id: Uuid,
        _delivered_count: i32,
    ) -> Result<Option<RealtimeEvent>, EventRepositoryError> {
        Ok(None)
    }

    async fn delete(
        &self,
        _tenant_id: &TenantId,
        _event_id: Uuid,
    ) -> Result<bool, EventRepositoryError> {
        Ok(false)
    }
}
