//! Realtime pub/sub service.
//!
//! Live fan-out goes through the in-process [`RealtimeHub`]. Durable state
//! (channels, presence counters, the event log) goes through the repository
//! ports. Persistence triggered by WebSocket traffic runs as detached work so
//! a slow or failing store never delays delivery to online clients.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::analytics::metric;
use crate::domain::ports::{
    AnalyticsSink, ChannelLookup, ChannelManagement, ChannelRepository, ChannelRepositoryError,
    EventRepository, EventRepositoryError, LiveChannels, PublishReceipt, UsageLedger,
};
use crate::domain::realtime_hub::{ConnectionId, RealtimeHub, Registration};
use crate::domain::{
    spawn_detached, AnalyticsType, BroadcastFrame, Channel, ChannelName, ChannelSettings,
    ChannelUpdate, ClientId, Error, EventKind, NewEvent, RealtimeEvent, TenantId, UsageField,
};

/// Default number of events returned by a history query.
pub const DEFAULT_HISTORY_LIMIT: i64 = 50;
/// Upper bound on a single history page.
pub const MAX_HISTORY_LIMIT: i64 = 500;

fn map_channel_error(error: ChannelRepositoryError) -> Error {
    match error {
        ChannelRepositoryError::Connection { message } => {
            Error::service_unavailable(format!("channel store unavailable: {message}"))
        }
        ChannelRepositoryError::Query { message } => {
            Error::internal(format!("channel store error: {message}"))
        }
        ChannelRepositoryError::NameTaken { name } => {
            Error::conflict(format!("Channel '{name}' already exists"))
        }
    }
}

fn map_event_error(error: EventRepositoryError) -> Error {
    match error {
        EventRepositoryError::Connection { message } => {
            Error::service_unavailable(format!("event store unavailable: {message}"))
        }
        EventRepositoryError::Query { message } => {
            Error::internal(format!("event store error: {message}"))
        }
    }
}

fn channel_not_found(channel_id: Uuid) -> Error {
    Error::not_found(format!("Channel {channel_id} not found"))
}

fn event_not_found(event_id: Uuid) -> Error {
    Error::not_found(format!("Event {event_id} not found"))
}

/// Durable side of the realtime service, shared with detached tasks.
struct ChannelStore<C, E, U, A> {
    channels: Arc<C>,
    events: Arc<E>,
    usage: Arc<U>,
    analytics: Arc<A>,
}

impl<C, E, U, A> ChannelStore<C, E, U, A>
where
    C: ChannelRepository + 'static,
    E: EventRepository + 'static,
    U: UsageLedger + 'static,
    A: AnalyticsSink + 'static,
{
    fn count(
        &self,
        tenant_id: TenantId,
        field: UsageField,
        metric_type: AnalyticsType,
        key: &'static str,
    ) {
        let usage = Arc::clone(&self.usage);
        let analytics = Arc::clone(&self.analytics);
        spawn_detached("realtime_usage", async move {
            if let Err(error) = usage.increment_field(&tenant_id, field, 1).await {
                warn!(%tenant_id, %field, %error, "failed to record realtime usage");
            }
            if let Err(error) = analytics.track(&tenant_id, metric_type, key, 1).await {
                warn!(%tenant_id, key, %error, "failed to track realtime metric");
            }
        });
    }

    fn channel_created(&self, tenant_id: TenantId, lookup: &ChannelLookup) {
        if lookup.created {
            debug!(%tenant_id, channel = %lookup.channel.name, "channel created");
            self.count(
                tenant_id,
                UsageField::RealtimeChannels,
                AnalyticsType::RealtimeChannels,
                metric::TOTAL_CHANNELS,
            );
        }
    }

    async fn get_or_create(
        &self,
        tenant_id: TenantId,
        name: &ChannelName,
        settings: &ChannelSettings,
    ) -> Result<Channel, ChannelRepositoryError> {
        let lookup = self
            .channels
            .get_or_create(&tenant_id, name, settings)
            .await?;
        self.channel_created(tenant_id, &lookup);
        Ok(lookup.channel)
    }

    /// Append to the log when the channel retains history.
    async fn append(
        &self,
        tenant_id: TenantId,
        channel: &Channel,
        frame: &BroadcastFrame,
    ) -> Result<Option<RealtimeEvent>, EventRepositoryError> {
        if !channel.retention.is_persistent() {
            return Ok(None);
        }
        let event = self
            .events
            .append(
                &tenant_id,
                &NewEvent {
                    channel_id: channel.id,
                    event_type: frame.event_type,
                    payload: frame.payload.clone(),
                    sender_id: frame.sender_id.clone(),
                    created_at: frame.timestamp,
                },
            )
            .await?;
        self.count(
            tenant_id,
            UsageField::RealtimeEvents,
            AnalyticsType::RealtimeEvents,
            metric::TOTAL_MESSAGES,
        );
        Ok(Some(event))
    }

    async fn touch(&self, channel: &Channel) {
        if let Err(error) = self.channels.touch(channel.id).await {
            warn!(channel_id = %channel.id, %error, "failed to stamp channel activity");
        }
    }

    /// Persistence half of a WebSocket broadcast. Failures are logged only.
    async fn persist_broadcast(
        &self,
        tenant_id: TenantId,
        name: ChannelName,
        frame: BroadcastFrame,
    ) {
        let channel = match self
            .get_or_create(tenant_id, &name, &ChannelSettings::lazy_default())
            .await
        {
            Ok(channel) => channel,
            Err(error) => {
                warn!(%tenant_id, channel = %name, %error, "failed to resolve broadcast channel");
                return;
            }
        };
        if let Err(error) = self.append(tenant_id, &channel, &frame).await {
            warn!(%tenant_id, channel = %name, %error, "failed to persist broadcast");
        }
        self.touch(&channel).await;
    }

    async fn adjust_presence(&self, tenant_id: TenantId, name: &ChannelName, delta: i32) {
        if let Err(error) = self
            .channels
            .adjust_connected_clients(&tenant_id, name, delta)
            .await
        {
            warn!(%tenant_id, channel = %name, delta, %error, "failed to adjust presence");
        }
    }
}

/// Detached work chained per connection.
///
/// Each task for a connection awaits the one queued before it, so presence
/// increments and decrements reach the store in the order the connection
/// issued them even though no caller waits for them.
#[derive(Default)]
struct ConnectionTasks {
    tails: Mutex<HashMap<ConnectionId, JoinHandle<()>>>,
}

impl ConnectionTasks {
    /// Queue `work` behind the connection's pending task.
    ///
    /// With `last` set the connection is finished and its chain leaves the
    /// map; the final task still waits for everything queued before it.
    async fn enqueue<F>(
        &self,
        connection_id: ConnectionId,
        operation: &'static str,
        last: bool,
        work: F,
    ) where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut tails = self.tails.lock().await;
        let previous = tails.remove(&connection_id);
        let handle = spawn_detached(operation, async move {
            if let Some(previous) = previous {
                if let Err(error) = previous.await {
                    warn!(%error, "earlier connection task failed");
                }
            }
            work.await;
        });
        if !last {
            tails.insert(connection_id, handle);
        }
    }

    #[cfg(test)]
    async fn pending(&self) -> usize {
        self.tails.lock().await.len()
    }
}

/// Realtime service combining the live hub with durable channel state.
pub struct RealtimeService<C, E, U, A> {
    hub: Arc<RealtimeHub>,
    store: Arc<ChannelStore<C, E, U, A>>,
    connections: Arc<ConnectionTasks>,
}

impl<C, E, U, A> Clone for RealtimeService<C, E, U, A> {
    fn clone(&self) -> Self {
        Self {
            hub: Arc::clone(&self.hub),
            store: Arc::clone(&self.store),
            connections: Arc::clone(&self.connections),
        }
    }
}

impl<C, E, U, A> RealtimeService<C, E, U, A> {
    pub fn new(
        hub: Arc<RealtimeHub>,
        channels: Arc<C>,
        events: Arc<E>,
        usage: Arc<U>,
        analytics: Arc<A>,
    ) -> Self {
        Self {
            hub,
            store: Arc::new(ChannelStore {
                channels,
                events,
                usage,
                analytics,
            }),
            connections: Arc::default(),
        }
    }

    /// Shared live registry.
    pub fn hub(&self) -> &Arc<RealtimeHub> {
        &self.hub
    }
}

#[async_trait]
impl<C, E, U, A> LiveChannels for RealtimeService<C, E, U, A>
where
    C: ChannelRepository + 'static,
    E: EventRepository + 'static,
    U: UsageLedger + 'static,
    A: AnalyticsSink + 'static,
{
    /// Register a new WebSocket connection.
    async fn connect(&self, tenant_id: TenantId, client_id: ClientId) -> Registration {
        self.hub.register(tenant_id, client_id).await
    }

    /// Subscribe a connection to a channel, lazily creating the channel.
    async fn subscribe(
        &self,
        tenant_id: TenantId,
        connection_id: ConnectionId,
        name: ChannelName,
    ) {
        if !self.hub.subscribe(tenant_id, connection_id, name.clone()).await {
            return;
        }
        let store = Arc::clone(&self.store);
        self.connections
            .enqueue(connection_id, "realtime_subscribe", false, async move {
                if let Err(error) = store
                    .get_or_create(tenant_id, &name, &ChannelSettings::lazy_default())
                    .await
                {
                    warn!(%tenant_id, channel = %name, %error, "failed to record subscription channel");
                    return;
                }
                store.adjust_presence(tenant_id, &name, 1).await;
            })
            .await;
    }

    async fn unsubscribe(
        &self,
        tenant_id: TenantId,
        connection_id: ConnectionId,
        name: ChannelName,
    ) {
        if !self.hub.unsubscribe(tenant_id, connection_id, &name).await {
            return;
        }
        let store = Arc::clone(&self.store);
        self.connections
            .enqueue(connection_id, "realtime_unsubscribe", false, async move {
                store.adjust_presence(tenant_id, &name, -1).await;
            })
            .await;
    }

    /// Remove a connection and release its presence on every channel.
    ///
    /// The release runs after any presence work the connection still has
    /// queued, so a decrement never overtakes the increment it undoes.
    async fn disconnect(&self, tenant_id: TenantId, connection_id: ConnectionId) {
        let channels = self.hub.disconnect(tenant_id, connection_id).await;
        let store = Arc::clone(&self.store);
        self.connections
            .enqueue(connection_id, "realtime_disconnect", true, async move {
                for name in &channels {
                    store.adjust_presence(tenant_id, name, -1).await;
                }
            })
            .await;
    }

    /// Fan out to live subscribers now and persist in the background.
    ///
    /// Returns the number of clients the frame was queued for; zero
    /// subscribers is not an error.
    async fn broadcast(
        &self,
        tenant_id: TenantId,
        name: ChannelName,
        event_type: EventKind,
        payload: Value,
        sender_id: Option<String>,
    ) -> usize {
        let frame = BroadcastFrame::new(&name, event_type, payload, sender_id);
        let delivered = self.hub.fan_out(tenant_id, &name, frame.clone()).await;
        let store = Arc::clone(&self.store);
        spawn_detached("realtime_persist", async move {
            store.persist_broadcast(tenant_id, name, frame).await;
        });
        delivered
    }
}

impl<C, E, U, A> RealtimeService<C, E, U, A>
where
    C: ChannelRepository + 'static,
    E: EventRepository + 'static,
    U: UsageLedger + 'static,
    A: AnalyticsSink + 'static,
{
    /// Like [`LiveChannels::broadcast`] but waits for persistence to finish.
    pub async fn broadcast_and_persist(
        &self,
        tenant_id: TenantId,
        name: ChannelName,
        event_type: EventKind,
        payload: Value,
        sender_id: Option<String>,
    ) -> usize {
        let frame = BroadcastFrame::new(&name, event_type, payload, sender_id);
        let delivered = self.hub.fan_out(tenant_id, &name, frame.clone()).await;
        self.store.persist_broadcast(tenant_id, name, frame).await;
        delivered
    }

    async fn owned_channel(&self, tenant_id: TenantId, channel_id: Uuid) -> Result<Channel, Error> {
        self.store
            .channels
            .find_by_id(&tenant_id, channel_id)
            .await
            .map_err(map_channel_error)?
            .ok_or_else(|| channel_not_found(channel_id))
    }
}

#[async_trait]
impl<C, E, U, A> ChannelManagement for RealtimeService<C, E, U, A>
where
    C: ChannelRepository + 'static,
    E: EventRepository + 'static,
    U: UsageLedger + 'static,
    A: AnalyticsSink + 'static,
{
    async fn list_channels(&self, tenant_id: TenantId) -> Result<Vec<Channel>, Error> {
        self.store
            .channels
            .list(&tenant_id)
            .await
            .map_err(map_channel_error)
    }

    async fn create_channel(
        &self,
        tenant_id: TenantId,
        name: ChannelName,
        settings: ChannelSettings,
    ) -> Result<ChannelLookup, Error> {
        if settings.max_clients <= 0 {
            return Err(Error::invalid_request("max_clients must be positive"));
        }
        let lookup = self
            .store
            .channels
            .get_or_create(&tenant_id, &name, &settings)
            .await
            .map_err(map_channel_error)?;
        self.store.channel_created(tenant_id, &lookup);
        Ok(lookup)
    }

    async fn update_channel(
        &self,
        tenant_id: TenantId,
        channel_id: Uuid,
        update: ChannelUpdate,
    ) -> Result<Channel, Error> {
        update
            .validate()
            .map_err(|err| Error::invalid_request(err.to_string()))?;
        self.store
            .channels
            .update(&tenant_id, channel_id, &update)
            .await
            .map_err(map_channel_error)?
            .ok_or_else(|| channel_not_found(channel_id))
    }

    async fn delete_channel(&self, tenant_id: TenantId, channel_id: Uuid) -> Result<(), Error> {
        let deleted = self
            .store
            .channels
            .delete(&tenant_id, channel_id)
            .await
            .map_err(map_channel_error)?;
        if deleted {
            Ok(())
        } else {
            Err(channel_not_found(channel_id))
        }
    }

    async fn publish(
        &self,
        tenant_id: TenantId,
        channel_id: Uuid,
        event_type: EventKind,
        payload: Value,
        sender_id: Option<String>,
    ) -> Result<PublishReceipt, Error> {
        let channel = self.owned_channel(tenant_id, channel_id).await?;
        let frame = BroadcastFrame::new(&channel.name, event_type, payload, sender_id);
        let delivered = self
            .hub
            .fan_out(tenant_id, &channel.name, frame.clone())
            .await;
        let event = match self.store.append(tenant_id, &channel, &frame).await {
            Ok(event) => event,
            Err(error) => {
                warn!(%tenant_id, %channel_id, %error, "failed to persist published event");
                None
            }
        };
        self.store.touch(&channel).await;
        Ok(PublishReceipt { event, delivered })
    }

    async fn history(
        &self,
        tenant_id: TenantId,
        channel_id: Uuid,
        limit: Option<i64>,
    ) -> Result<Vec<RealtimeEvent>, Error> {
        let channel = self.owned_channel(tenant_id, channel_id).await?;
        let limit = match limit {
            Some(value) if value > 0 => value.min(MAX_HISTORY_LIMIT),
            _ => DEFAULT_HISTORY_LIMIT,
        };
        self.store
            .events
            .history(&tenant_id, channel.id, limit)
            .await
            .map_err(map_event_error)
    }

    async fn record_delivery(
        &self,
        tenant_id: TenantId,
        event_id: Uuid,
        delivered_count: i32,
    ) -> Result<RealtimeEvent, Error> {
        if delivered_count < 0 {
            return Err(Error::invalid_request("delivered_count must not be negative"));
        }
        self.store
            .events
            .record_delivery(&tenant_id, event_id, delivered_count)
            .await
            .map_err(map_event_error)?
            .ok_or_else(|| event_not_found(event_id))
    }

    async fn delete_event(&self, tenant_id: TenantId, event_id: Uuid) -> Result<(), Error> {
        let deleted = self
            .store
            .events
            .delete(&tenant_id, event_id)
            .await
            .map_err(map_event_error)?;
        if deleted {
            Ok(())
        } else {
            Err(event_not_found(event_id))
        }
    }
}

#[cfg(test)]
#[path = "realtime_service_tests.rs"]
mod tests;
