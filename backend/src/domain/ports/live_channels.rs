//! Driving port used by WebSocket sessions.

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::realtime_hub::{ConnectionId, Registration};
use crate::domain::{ChannelName, ClientId, EventKind, TenantId};

/// Live connection lifecycle and in-process broadcast.
///
/// Persistence triggered through this port is best-effort and detached; the
/// methods return once the in-memory registry has been updated.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LiveChannels: Send + Sync {
    async fn connect(&self, tenant_id: TenantId, client_id: ClientId) -> Registration;

    async fn subscribe(&self, tenant_id: TenantId, connection_id: ConnectionId, name: ChannelName);

    async fn unsubscribe(
        &self,
        tenant_id: TenantId,
        connection_id: ConnectionId,
        name: ChannelName,
    );

    async fn disconnect(&self, tenant_id: TenantId, connection_id: ConnectionId);

    /// Returns the number of clients the frame was queued for.
    async fn broadcast(
        &self,
        tenant_id: TenantId,
        name: ChannelName,
        event_type: EventKind,
        payload: Value,
        sender_id: Option<String>,
    ) -> usize;
}
