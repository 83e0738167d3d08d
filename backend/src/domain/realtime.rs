//! Realtime channels, events and the frames exchanged with WebSocket clients.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use uuid::Uuid;

use super::TenantId;

/// Default cap on clients per channel recorded for newly created channels.
pub const DEFAULT_MAX_CLIENTS: i32 = 100;
/// Maximum channel name length in characters.
pub const CHANNEL_NAME_MAX: usize = 100;

/// Validation errors for realtime identifiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RealtimeValidationError {
    EmptyChannelName,
    ChannelNameTooLong { max: usize },
    InvalidMaxClients,
}

impl fmt::Display for RealtimeValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyChannelName => write!(f, "channel name must not be empty"),
            Self::ChannelNameTooLong { max } => {
                write!(f, "channel name must be at most {max} characters")
            }
            Self::InvalidMaxClients => write!(f, "max_clients must be positive"),
        }
    }
}

impl std::error::Error for RealtimeValidationError {}

/// Tenant-unique channel name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(try_from = "String", into = "String")]
pub struct ChannelName(String);

impl ChannelName {
    pub fn new(name: impl Into<String>) -> Result<Self, RealtimeValidationError> {
        let name = name.into();
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(RealtimeValidationError::EmptyChannelName);
        }
        if trimmed.chars().count() > CHANNEL_NAME_MAX {
            return Err(RealtimeValidationError::ChannelNameTooLong {
                max: CHANNEL_NAME_MAX,
            });
        }
        Ok(Self(trimmed.to_owned()))
    }
}

impl AsRef<str> for ChannelName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<ChannelName> for String {
    fn from(value: ChannelName) -> Self {
        value.0
    }
}

impl TryFrom<String> for ChannelName {
    type Error = RealtimeValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// Privacy classification of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionType {
    #[default]
    Public,
    Private,
    Presence,
}

impl SubscriptionType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Private => "private",
            Self::Presence => "presence",
        }
    }

    /// Unknown stored values fall back to public.
    pub fn from_stored(raw: &str) -> Self {
        match raw {
            "private" => Self::Private,
            "presence" => Self::Presence,
            _ => Self::Public,
        }
    }
}

/// Whether broadcasts on a channel are appended to the event log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum RetentionPolicy {
    #[default]
    Ephemeral,
    Persistent,
}

impl RetentionPolicy {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ephemeral => "ephemeral",
            Self::Persistent => "persistent",
        }
    }

    pub fn from_stored(raw: &str) -> Self {
        match raw {
            "persistent" => Self::Persistent,
            _ => Self::Ephemeral,
        }
    }

    pub const fn is_persistent(self) -> bool {
        matches!(self, Self::Persistent)
    }
}

/// Kind of a realtime event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Insert,
    Update,
    Delete,
    #[default]
    Custom,
    System,
    Broadcast,
}

impl EventKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Custom => "custom",
            Self::System => "system",
            Self::Broadcast => "broadcast",
        }
    }

    /// Parse a client-supplied kind; anything unrecognised becomes `custom`.
    ///
    /// # Examples
    /// ```
    /// use backend::domain::EventKind;
    ///
    /// assert_eq!(EventKind::parse_lenient("INSERT"), EventKind::Insert);
    /// assert_eq!(EventKind::parse_lenient("chat_message"), EventKind::Custom);
    /// ```
    pub fn parse_lenient(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "insert" => Self::Insert,
            "update" => Self::Update,
            "delete" => Self::Delete,
            "system" => Self::System,
            "broadcast" => Self::Broadcast,
            _ => Self::Custom,
        }
    }
}

impl<'de> Deserialize<'de> for EventKind {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse_lenient(&raw))
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Optional settings accepted when a channel is created.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChannelSettings {
    pub subscription_type: SubscriptionType,
    pub retention: RetentionPolicy,
    pub description: Option<String>,
    pub max_clients: i32,
    pub metadata: Value,
}

impl ChannelSettings {
    /// Public, ephemeral, capped at [`DEFAULT_MAX_CLIENTS`].
    pub fn lazy_default() -> Self {
        Self {
            max_clients: DEFAULT_MAX_CLIENTS,
            metadata: Value::Object(serde_json::Map::new()),
            ..Self::default()
        }
    }
}

/// Partial update of a channel. `None` leaves the column untouched.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChannelUpdate {
    pub name: Option<ChannelName>,
    pub subscription_type: Option<SubscriptionType>,
    pub retention: Option<RetentionPolicy>,
    pub description: Option<String>,
    pub max_clients: Option<i32>,
    pub metadata: Option<Value>,
}

impl ChannelUpdate {
    pub fn validate(&self) -> Result<(), RealtimeValidationError> {
        match self.max_clients {
            Some(max) if max <= 0 => Err(RealtimeValidationError::InvalidMaxClients),
            _ => Ok(()),
        }
    }
}

/// Persisted channel record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Channel {
    #[schema(value_type = String, format = Uuid)]
    pub id: Uuid,
    #[schema(value_type = String, format = Uuid)]
    pub project_id: TenantId,
    pub name: ChannelName,
    pub subscription_type: SubscriptionType,
    pub retention: RetentionPolicy,
    pub description: Option<String>,
    pub max_clients: i32,
    pub connected_clients: i32,
    pub metadata: Value,
    pub last_message_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Event appended to a persistent channel's log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RealtimeEvent {
    #[schema(value_type = String, format = Uuid)]
    pub id: Uuid,
    #[schema(value_type = String, format = Uuid)]
    pub channel_id: Uuid,
    #[schema(value_type = String, format = Uuid)]
    pub project_id: TenantId,
    pub event_type: EventKind,
    pub payload: Value,
    pub sender_id: Option<String>,
    pub delivered_count: i32,
    pub created_at: DateTime<Utc>,
}

/// Event to append.
///
/// `created_at` is the moment the frame was built, not the moment the write
/// lands, so history order matches live delivery order.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEvent {
    pub channel_id: Uuid,
    pub event_type: EventKind,
    pub payload: Value,
    pub sender_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Identity of one live WebSocket connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(String);

impl ClientId {
    /// Use the caller-supplied user id, or mint an anonymous one.
    pub fn from_user(user_id: Option<&str>) -> Self {
        match user_id.map(str::trim).filter(|id| !id.is_empty()) {
            Some(id) => Self(id.to_owned()),
            None => Self(format!("anon-{}", Uuid::new_v4())),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Frame delivered to subscribed clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct BroadcastFrame {
    pub channel: String,
    pub event_type: EventKind,
    pub payload: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl BroadcastFrame {
    pub fn new(
        channel: &ChannelName,
        event_type: EventKind,
        payload: Value,
        sender_id: Option<String>,
    ) -> Self {
        Self {
            channel: channel.to_string(),
            event_type,
            payload,
            sender_id,
            timestamp: Utc::now(),
        }
    }
}
