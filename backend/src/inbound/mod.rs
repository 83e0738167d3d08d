//! Inbound adapters translating client traffic into driving-port calls.
//!
//! [`http`] serves the project-scoped REST surface; [`ws`] upgrades realtime
//! clients and bridges their frames onto the pub/sub hub.

pub mod http;
pub mod ws;
