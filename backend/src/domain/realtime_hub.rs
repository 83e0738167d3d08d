//! In-process registry of live realtime connections.
//!
//! The registry maps each tenant to its connected clients and their channel
//! subscriptions. It is the only shared mutable state in the realtime path
//! and is guarded by one read/write lock: fan-out takes the read lock,
//! connect, subscribe and disconnect take the write lock.
//!
//! Nothing here is persisted. After a restart the registry starts empty and
//! clients reconnect and resubscribe.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, RwLock};
use tracing::debug;
use uuid::Uuid;

use super::{BroadcastFrame, ChannelName, ClientId, TenantId};

/// Outbound frames buffered per client before new frames are dropped.
pub const CLIENT_QUEUE_CAPACITY: usize = 256;

/// Identity of one live connection. A user may hold several.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

struct ClientEntry {
    client_id: ClientId,
    sender: mpsc::Sender<Arc<BroadcastFrame>>,
    channels: HashSet<ChannelName>,
}

/// Receiving half handed to a connection's writer task.
#[derive(Debug)]
pub struct Registration {
    pub connection_id: ConnectionId,
    pub client_id: ClientId,
    pub frames: mpsc::Receiver<Arc<BroadcastFrame>>,
}

type TenantClients = HashMap<ConnectionId, ClientEntry>;

/// Tenant-partitioned connection registry.
#[derive(Default)]
pub struct RealtimeHub {
    tenants: RwLock<HashMap<TenantId, TenantClients>>,
}

impl RealtimeHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new connection with an empty subscription set.
    pub async fn register(&self, tenant_id: TenantId, client_id: ClientId) -> Registration {
        let (sender, frames) = mpsc::channel(CLIENT_QUEUE_CAPACITY);
        let connection_id = ConnectionId::generate();
        let entry = ClientEntry {
            client_id: client_id.clone(),
            sender,
            channels: HashSet::new(),
        };
        self.tenants
            .write()
            .await
            .entry(tenant_id)
            .or_default()
            .insert(connection_id, entry);
        debug!(%tenant_id, %connection_id, %client_id, "realtime client registered");
        Registration {
            connection_id,
            client_id,
            frames,
        }
    }

    /// Add `channel` to the connection's subscriptions.
    ///
    /// Returns `true` only when the subscription is new.
    pub async fn subscribe(
        &self,
        tenant_id: TenantId,
        connection_id: ConnectionId,
        channel: ChannelName,
    ) -> bool {
        let mut tenants = self.tenants.write().await;
        tenants
            .get_mut(&tenant_id)
            .and_then(|clients| clients.get_mut(&connection_id))
            .is_some_and(|entry| entry.channels.insert(channel))
    }

    /// Remove `channel` from the connection's subscriptions.
    pub async fn unsubscribe(
        &self,
        tenant_id: TenantId,
        connection_id: ConnectionId,
        channel: &ChannelName,
    ) -> bool {
        let mut tenants = self.tenants.write().await;
        tenants
            .get_mut(&tenant_id)
            .and_then(|clients| clients.get_mut(&connection_id))
            .is_some_and(|entry| entry.channels.remove(channel))
    }

    /// Drop a connection and return the channels it was subscribed to.
    pub async fn disconnect(
        &self,
        tenant_id: TenantId,
        connection_id: ConnectionId,
    ) -> Vec<ChannelName> {
        let mut tenants = self.tenants.write().await;
        let Some(clients) = tenants.get_mut(&tenant_id) else {
            return Vec::new();
        };
        let removed = clients.remove(&connection_id);
        if clients.is_empty() {
            tenants.remove(&tenant_id);
        }
        removed
            .map(|entry| {
                debug!(%tenant_id, %connection_id, client_id = %entry.client_id, "realtime client removed");
                entry.channels.into_iter().collect()
            })
            .unwrap_or_default()
    }

    /// Queue `frame` for every client of `tenant_id` subscribed to `channel`.
    ///
    /// Never blocks on a slow consumer: a full queue drops the frame for that
    /// client only. Returns the number of clients the frame was queued for.
    pub async fn fan_out(
        &self,
        tenant_id: TenantId,
        channel: &ChannelName,
        frame: BroadcastFrame,
    ) -> usize {
        let frame = Arc::new(frame);
        let tenants = self.tenants.read().await;
        let Some(clients) = tenants.get(&tenant_id) else {
            return 0;
        };
        let mut delivered = 0;
        for (connection_id, entry) in clients {
            if !entry.channels.contains(channel) {
                continue;
            }
            match entry.sender.try_send(Arc::clone(&frame)) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    debug!(%tenant_id, %connection_id, %channel, "client queue full; frame dropped");
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(%tenant_id, %connection_id, "client queue closed");
                }
            }
        }
        delivered
    }

    /// Number of live connections for a tenant.
    pub async fn connection_count(&self, tenant_id: TenantId) -> usize {
        self.tenants
            .read()
            .await
            .get(&tenant_id)
            .map_or(0, HashMap::len)
    }
}
