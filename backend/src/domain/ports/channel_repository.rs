//! Port for realtime channel persistence.
//!
//! Channels are tenant-scoped; adapters must filter every lookup by tenant so
//! that an id belonging to another tenant behaves as missing.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{Channel, ChannelName, ChannelSettings, ChannelUpdate, TenantId};

use super::define_port_error;

define_port_error! {
    /// Errors raised by channel repository adapters.
    pub enum ChannelRepositoryError {
        /// Backing store could not be reached.
        Connection { message: String } =>
            "channel repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } =>
            "channel repository query failed: {message}",
        /// Rename target is already used by another channel.
        NameTaken { name: String } =>
            "channel '{name}' already exists",
    }
}

/// Outcome of [`ChannelRepository::get_or_create`].
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelLookup {
    pub channel: Channel,
    pub created: bool,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChannelRepository: Send + Sync {
    async fn list(&self, tenant_id: &TenantId) -> Result<Vec<Channel>, ChannelRepositoryError>;

    async fn find_by_id(
        &self,
        tenant_id: &TenantId,
        channel_id: Uuid,
    ) -> Result<Option<Channel>, ChannelRepositoryError>;

    async fn find_by_name(
        &self,
        tenant_id: &TenantId,
        name: &ChannelName,
    ) -> Result<Option<Channel>, ChannelRepositoryError>;

    /// Return the named channel, creating it with `settings` when absent.
    ///
    /// Concurrent callers racing on the same name must all succeed and
    /// observe the same row.
    async fn get_or_create(
        &self,
        tenant_id: &TenantId,
        name: &ChannelName,
        settings: &ChannelSettings,
    ) -> Result<ChannelLookup, ChannelRepositoryError>;

    async fn update(
        &self,
        tenant_id: &TenantId,
        channel_id: Uuid,
        update: &ChannelUpdate,
    ) -> Result<Option<Channel>, ChannelRepositoryError>;

    /// Delete a channel and its events. `false` when nothing matched.
    async fn delete(
        &self,
        tenant_id: &TenantId,
        channel_id: Uuid,
    ) -> Result<bool, ChannelRepositoryError>;

    /// Atomically add `delta` to the connected-client counter, never going
    /// below zero.
    async fn adjust_connected_clients(
        &self,
        tenant_id: &TenantId,
        name: &ChannelName,
        delta: i32,
    ) -> Result<(), ChannelRepositoryError>;

    /// Stamp the channel's last-activity time with now.
    async fn touch(&self, channel_id: Uuid) -> Result<(), ChannelRepositoryError>;
}

/// Repository with no channels.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureChannelRepository;

#[async_trait]
impl ChannelRepository for FixtureChannelRepository {
    async fn list(&self, _tenant_id: &TenantId) -> Result<Vec<Channel>, ChannelRepositoryError> {
        Ok(Vec::new())
    }

    async fn find_by_id(
        &self,
        _tenant_id: &TenantId,
        _channel_id: Uuid,
    ) -> Result<Option<Channel>, ChannelRepositoryError> {
        Ok(None)
    }

    async fn find_by_name(
        &self,
        _tenant_id: &TenantId,
        _name: &ChannelName,
    ) -> Result<Option<Channel>, ChannelRepositoryError> {
        Ok(None)
    }

    async fn get_or_create(
        &self,
        _tenant_id: &TenantId,
        _name: &ChannelName,
        _settings: &ChannelSettings,
    ) -> Result<ChannelLookup, ChannelRepositoryError> {
        Err(ChannelRepositoryError::connection(
            "fixture repository has no backing store",
        ))
    }

    async fn update(
        &self,
        _tenant_id: &TenantId,
        _channel_id: Uuid,
        _update: &ChannelUpdate,
    ) -> Result<Option<Channel>, ChannelRepositoryError> {
        Ok(None)
    }

    async fn delete(
        &self,
        _tenant_id: &TenantId,
        _channel_id: Uuid,
    ) -> Result<bool, ChannelRepositoryError> {
        Ok(false)
    }

    async fn adjust_connected_clients(
        &self,
        _tenant_id: &TenantId,
        _name: &ChannelName,
        _delta: i32,
    ) -> Result<(), ChannelRepositoryError> {
        Ok(())
    }

    async fn touch(&self, _channel_id: Uuid) -> Result<(), ChannelRepositoryError> {
        Ok(())
    }
}
