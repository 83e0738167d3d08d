//! Wire-level message definitions for the WebSocket adapter.
//!
//! Clients send flat JSON frames tagged by `action`:
//!
//! ```json
//! {"action": "SUBSCRIBE", "channel": "chat"}
//! {"action": "BROADCAST", "channel": "chat", "event": "message", "payload": {"text": "hi"}}
//! ```
//!
//! Outbound traffic is the domain [`crate::domain::BroadcastFrame`]
//! serialised as-is.

use serde::Deserialize;
use serde_json::Value;

use crate::domain::EventKind;

/// Inbound frame sent by a connected client.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "UPPERCASE")]
pub enum ClientMessage {
    /// Join a channel, creating it on first use.
    Subscribe { channel: String },
    /// Leave a channel.
    Unsubscribe { channel: String },
    /// Fan a payload out to every subscriber of `channel`.
    Broadcast {
        channel: String,
        /// Unknown kinds map to `custom`.
        #[serde(default, alias = "event_type")]
        event: EventKind,
        #[serde(default)]
        payload: Value,
    },
}

impl ClientMessage {
    /// Channel named by the frame.
    pub fn channel(&self) -> &str {
        match self {
            Self::Subscribe { channel }
            | Self::Unsubscribe { channel }
            | Self::Broadcast { channel, .. } => channel,
        }
    }
}
