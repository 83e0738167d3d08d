//! Channel registry and event log for [`InMemoryBackend`].

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::domain::ports::{
    ChannelLookup, ChannelRepository, ChannelRepositoryError, EventRepository,
    EventRepositoryError,
};
use crate::domain::{
    Channel, ChannelName, ChannelSettings, ChannelUpdate, NewEvent, RealtimeEvent, TenantId,
};

use super::{InMemoryBackend, MemoryState};

impl MemoryState {
    fn channel_named(&self, tenant_id: &TenantId, name: &ChannelName) -> Option<&Channel> {
        self.channels
            .values()
            .find(|channel| channel.project_id == *tenant_id && channel.name == *name)
    }

    fn tenant_channel_mut(&mut self, tenant_id: &TenantId, id: Uuid) -> Option<&mut Channel> {
        self.channels
            .get_mut(&id)
            .filter(|channel| channel.project_id == *tenant_id)
    }
}

fn apply(channel: &mut Channel, update: &ChannelUpdate) {
    if let Some(name) = &update.name {
        channel.name = name.clone();
    }
    if let Some(subscription_type) = update.subscription_type {
        channel.subscription_type = subscription_type;
    }
    if let Some(retention) = update.retention {
        channel.retention = retention;
    }
    if let Some(description) = &update.description {
        channel.description = Some(description.clone());
    }
    if let Some(max_clients) = update.max_clients {
        channel.max_clients = max_clients;
    }
    if let Some(metadata) = &update.metadata {
        channel.metadata = metadata.clone();
    }
    channel.updated_at = Utc::now();
}

#[async_trait]
impl ChannelRepository for InMemoryBackend {
    async fn list(&self, tenant_id: &TenantId) -> Result<Vec<Channel>, ChannelRepositoryError> {
        let state = self.state.read().await;
        let mut channels: Vec<Channel> = state
            .channels
            .values()
            .filter(|channel| channel.project_id == *tenant_id)
            .cloned()
            .collect();
        channels.sort_by(|left, right| right.created_at.cmp(&left.created_at));
        Ok(channels)
    }

    async fn find_by_id(
        &self,
        tenant_id: &TenantId,
        channel_id: Uuid,
    ) -> Result<Option<Channel>, ChannelRepositoryError> {
        let state = self.state.read().await;
        Ok(state
            .channels
            .get(&channel_id)
            .filter(|channel| channel.project_id == *tenant_id)
            .cloned())
    }

    async fn find_by_name(
        &self,
        tenant_id: &TenantId,
        name: &ChannelName,
    ) -> Result<Option<Channel>, ChannelRepositoryError> {
        let state = self.state.read().await;
        Ok(state.channel_named(tenant_id, name).cloned())
    }

    async fn get_or_create(
        &self,
        tenant_id: &TenantId,
        name: &ChannelName,
        settings: &ChannelSettings,
    ) -> Result<ChannelLookup, ChannelRepositoryError> {
        let mut state = self.state.write().await;
        if let Some(existing) = state.channel_named(tenant_id, name) {
            return Ok(ChannelLookup {
                channel: existing.clone(),
                created: false,
            });
        }
        let now = Utc::now();
        let channel = Channel {
            id: Uuid::new_v4(),
            project_id: *tenant_id,
            name: name.clone(),
            subscription_type: settings.subscription_type,
            retention: settings.retention,
            description: settings.description.clone(),
            max_clients: settings.max_clients,
            connected_clients: 0,
            metadata: settings.metadata.clone(),
            last_message_at: None,
            created_at: now,
            updated_at: now,
        };
        state.channels.insert(channel.id, channel.clone());
        Ok(ChannelLookup {
            channel,
            created: true,
        })
    }

    async fn update(
        &self,
        tenant_id: &TenantId,
        channel_id: Uuid,
        update: &ChannelUpdate,
    ) -> Result<Option<Channel>, ChannelRepositoryError> {
        let mut state = self.state.write().await;
        if let Some(name) = &update.name {
            if state
                .channel_named(tenant_id, name)
                .is_some_and(|other| other.id != channel_id)
            {
                return Err(ChannelRepositoryError::name_taken(name.as_ref()));
            }
        }
        let Some(channel) = state.tenant_channel_mut(tenant_id, channel_id) else {
            return Ok(None);
        };
        apply(channel, update);
        Ok(Some(channel.clone()))
    }

    async fn delete(
        &self,
        tenant_id: &TenantId,
        channel_id: Uuid,
    ) -> Result<bool, ChannelRepositoryError> {
        let mut state = self.state.write().await;
        if state.tenant_channel_mut(tenant_id, channel_id).is_none() {
            return Ok(false);
        }
        state.channels.remove(&channel_id);
        state.events.retain(|event| event.channel_id != channel_id);
        Ok(true)
    }

    async fn adjust_connected_clients(
        &self,
        tenant_id: &TenantId,
        name: &ChannelName,
        delta: i32,
    ) -> Result<(), ChannelRepositoryError> {
        let mut state = self.state.write().await;
        if let Some(channel) = state
            .channels
            .values_mut()
            .find(|channel| channel.project_id == *tenant_id && channel.name == *name)
        {
            channel.connected_clients = channel.connected_clients.saturating_add(delta).max(0);
        }
        Ok(())
    }

    async fn touch(&self, channel_id: Uuid) -> Result<(), ChannelRepositoryError> {
        let mut state = self.state.write().await;
        if let Some(channel) = state.channels.get_mut(&channel_id) {
            channel.last_message_at = Some(Utc::now());
        }
        Ok(())
    }
}

#[async_trait]
impl EventRepository for InMemoryBackend {
    async fn append(
        &self,
        tenant_id: &TenantId,
        event: &NewEvent,
    ) -> Result<RealtimeEvent, EventRepositoryError> {
        let mut state = self.state.write().await;
        let owned = state
            .channels
            .get(&event.channel_id)
            .is_some_and(|channel| channel.project_id == *tenant_id);
        if !owned {
            return Err(EventRepositoryError::query(format!(
                "channel {} does not exist",
                event.channel_id
            )));
        }
        let stored = RealtimeEvent {
            id: Uuid::new_v4(),
            channel_id: event.channel_id,
            project_id: *tenant_id,
            event_type: event.event_type,
            payload: event.payload.clone(),
            sender_id: event.sender_id.clone(),
            delivered_count: 0,
            created_at: event.created_at,
        };
        state.events.push(stored.clone());
        Ok(stored)
    }

    async fn history(
        &self,
        tenant_id: &TenantId,
        channel_id: Uuid,
        limit: i64,
    ) -> Result<Vec<RealtimeEvent>, EventRepositoryError> {
        let state = self.state.read().await;
        let limit = usize::try_from(limit).unwrap_or(0);
        let mut events: Vec<RealtimeEvent> = state
            .events
            .iter()
            .rev()
            .filter(|event| event.project_id == *tenant_id && event.channel_id == channel_id)
            .cloned()
            .collect();
        // Stable sort: equal timestamps keep newest-appended first.
        events.sort_by(|left, right| right.created_at.cmp(&left.created_at));
        events.truncate(limit);
        Ok(events)
    }

    async fn record_delivery(
        &self,
        tenant_id: &TenantId,
        event_id: Uuid,
        delivered_count: i32,
    ) -> Result<Option<RealtimeEvent>, EventRepositoryError> {
        let mut state = self.state.write().await;
        let event = state
            .events
            .iter_mut()
            .find(|event| event.project_id == *tenant_id && event.id == event_id);
        Ok(event.map(|event| {
            event.delivered_count = delivered_count;
            event.clone()
        }))
    }

    async fn delete(
        &self,
        tenant_id: &TenantId,
        event_id: Uuid,
    ) -> Result<bool, EventRepositoryError> {
        let mut state = self.state.write().await;
        let before = state.events.len();
        state
            .events
            .retain(|event| !(event.project_id == *tenant_id && event.id == event_id));
        Ok(state.events.len() != before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::EventKind;
    use rstest::rstest;
    use serde_json::json;

    fn name(raw: &str) -> ChannelName {
        ChannelName::new(raw).expect("valid channel name")
    }

    #[rstest]
    #[tokio::test]
    async fn get_or_create_returns_the_same_channel() {
        let backend = InMemoryBackend::new();
        let tenant = TenantId::random();
        let settings = ChannelSettings::lazy_default();

        let first = ChannelRepository::get_or_create(&backend, &tenant, &name("chat"), &settings)
            .await
            .expect("create");
        let second = ChannelRepository::get_or_create(&backend, &tenant, &name("chat"), &settings)
            .await
            .expect("lookup");

        assert!(first.created);
        assert!(!second.created);
        assert_eq!(first.channel.id, second.channel.id);
    }

    #[rstest]
    #[tokio::test]
    async fn connected_clients_never_go_negative() {
        let backend = InMemoryBackend::new();
        let tenant = TenantId::random();
        let lookup = backend
            .get_or_create(&tenant, &name("chat"), &ChannelSettings::lazy_default())
            .await
            .expect("create");

        backend
            .adjust_connected_clients(&tenant, &name("chat"), -3)
            .await
            .expect("adjust");
        let channel = backend
            .find_by_id(&tenant, lookup.channel.id)
            .await
            .expect("find")
            .expect("channel");
        assert_eq!(channel.connected_clients, 0);
    }

    #[rstest]
    #[tokio::test]
    async fn renaming_onto_an_existing_channel_fails() {
        let backend = InMemoryBackend::new();
        let tenant = TenantId::random();
        let settings = ChannelSettings::lazy_default();
        backend
            .get_or_create(&tenant, &name("a"), &settings)
            .await
            .expect("create");
        let b = backend
            .get_or_create(&tenant, &name("b"), &settings)
            .await
            .expect("create");

        let update = ChannelUpdate {
            name: Some(name("a")),
            ..ChannelUpdate::default()
        };
        let err = ChannelRepository::update(&backend, &tenant, b.channel.id, &update)
            .await
            .expect_err("name clash");
        assert_eq!(err, ChannelRepositoryError::name_taken("a"));
    }

    #[rstest]
    #[tokio::test]
    async fn history_orders_by_event_time_not_arrival() {
        let backend = InMemoryBackend::new();
        let tenant = TenantId::random();
        let channel = backend
            .get_or_create(&tenant, &name("log"), &ChannelSettings::lazy_default())
            .await
            .expect("create")
            .channel;
        let earlier = Utc::now();
        let later = earlier + chrono::Duration::milliseconds(5);
        for (n, created_at) in [(2, later), (1, earlier)] {
            backend
                .append(
                    &tenant,
                    &NewEvent {
                        channel_id: channel.id,
                        event_type: EventKind::Custom,
                        payload: json!({"n": n}),
                        sender_id: None,
                        created_at,
                    },
                )
                .await
                .expect("append");
        }

        let history = backend
            .history(&tenant, channel.id, 10)
            .await
            .expect("history");
        let order: Vec<&serde_json::Value> = history.iter().map(|event| &event.payload).collect();
        assert_eq!(order, [&json!({"n": 2}), &json!({"n": 1})]);
        assert_eq!(history.last().map(|event| event.created_at), Some(earlier));
    }

    #[rstest]
    #[tokio::test]
    async fn history_is_newest_first_and_dies_with_the_channel() {
        let backend = InMemoryBackend::new();
        let tenant = TenantId::random();
        let channel = backend
            .get_or_create(&tenant, &name("log"), &ChannelSettings::lazy_default())
            .await
            .expect("create")
            .channel;
        for n in 0..3 {
            backend
                .append(
                    &tenant,
                    &NewEvent {
                        channel_id: channel.id,
                        event_type: EventKind::Custom,
                        payload: json!({"n": n}),
                        sender_id: None,
                        created_at: Utc::now(),
                    },
                )
                .await
                .expect("append");
        }

        let history = backend
            .history(&tenant, channel.id, 2)
            .await
            .expect("history");
        assert_eq!(history.len(), 2);
        assert_eq!(history.first().map(|event| &event.payload), Some(&json!({"n": 2})));

        assert!(ChannelRepository::delete(&backend, &tenant, channel.id)
            .await
            .expect("delete"));
        let history = backend
            .history(&tenant, channel.id, 10)
            .await
            .expect("history");
        assert!(history.is_empty());
    }
}
