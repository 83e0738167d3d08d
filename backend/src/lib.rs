//! Backend library modules.
//!
//! Hexagonal layout: [`domain`] holds types, services and ports;
//! [`inbound`] adapts HTTP and WebSocket traffic onto the driving ports;
//! [`outbound`] implements the driven ports over PostgreSQL or memory.

pub mod doc;
pub mod domain;
pub mod inbound;
pub mod middleware;
pub mod outbound;
pub mod settings;

/// Public OpenAPI surface used by Swagger UI and tooling.
pub use doc::ApiDoc;
pub use domain::TraceId;
pub use middleware::Trace;
