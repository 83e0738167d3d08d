//! Shared WebSocket adapter state.
//!
//! The socket endpoint resolves tenants and drives live channels through
//! domain ports only, so tests can swap in doubles or the in-memory backend.

use std::sync::Arc;

use crate::domain::ports::{LiveChannels, TenantAdmission};

/// Dependency bundle for the WebSocket entry point and its sessions.
#[derive(Clone)]
pub struct WsState {
    pub admission: Arc<dyn TenantAdmission>,
    pub live: Arc<dyn LiveChannels>,
}

impl WsState {
    /// Construct state from explicit port implementations.
    pub fn new(admission: Arc<dyn TenantAdmission>, live: Arc<dyn LiveChannels>) -> Self {
        Self { admission, live }
    }
}
