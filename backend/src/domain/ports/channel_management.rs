//! Driving port for REST management of realtime channels and events.

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::domain::{
    Channel, ChannelName, ChannelSettings, ChannelUpdate, Error, EventKind, RealtimeEvent,
    TenantId,
};

use super::ChannelLookup;

/// Result of publishing through the REST surface.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishReceipt {
    /// Persisted event, when the channel retains history.
    pub event: Option<RealtimeEvent>,
    /// Number of live clients the frame was queued for.
    pub delivered: usize,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChannelManagement: Send + Sync {
    async fn list_channels(&self, tenant_id: TenantId) -> Result<Vec<Channel>, Error>;

    /// Get-or-create by name; never fails on duplicates.
    async fn create_channel(
        &self,
        tenant_id: TenantId,
        name: ChannelName,
        settings: ChannelSettings,
    ) -> Result<ChannelLookup, Error>;

    async fn update_channel(
        &self,
        tenant_id: TenantId,
        channel_id: Uuid,
        update: ChannelUpdate,
    ) -> Result<Channel, Error>;

    async fn delete_channel(&self, tenant_id: TenantId, channel_id: Uuid) -> Result<(), Error>;

    /// Persist (when retained) and fan out to live subscribers.
    async fn publish(
        &self,
        tenant_id: TenantId,
        channel_id: Uuid,
        event_type: EventKind,
        payload: Value,
        sender_id: Option<String>,
    ) -> Result<PublishReceipt, Error>;

    /// Newest-first event history.
    async fn history(
        &self,
        tenant_id: TenantId,
        channel_id: Uuid,
        limit: Option<i64>,
    ) -> Result<Vec<RealtimeEvent>, Error>;

    async fn record_delivery(
        &self,
        tenant_id: TenantId,
        event_id: Uuid,
        delivered_count: i32,
    ) -> Result<RealtimeEvent, Error>;

    async fn delete_event(&self, tenant_id: TenantId, event_id: Uuid) -> Result<(), Error>;
}
