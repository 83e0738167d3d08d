//! HTTP server configuration object and helpers.

use backend::outbound::persistence::DbPool;
use std::net::SocketAddr;

/// Tenant registered at startup when running on the in-memory backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemoTenant {
    pub reference_id: String,
    pub api_key: String,
}

/// Builder-style configuration for creating the HTTP server.
pub struct ServerConfig {
    pub(crate) bind_addr: SocketAddr,
    pub(crate) db_pool: Option<DbPool>,
    pub(crate) demo_tenant: Option<DemoTenant>,
}

impl ServerConfig {
    /// Construct a server configuration listening on `bind_addr`.
    #[must_use]
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            db_pool: None,
            demo_tenant: None,
        }
    }

    /// Attach a database connection pool for persistence adapters.
    ///
    /// Without one every port is served by the in-memory backend.
    #[must_use]
    pub fn with_db_pool(mut self, pool: DbPool) -> Self {
        self.db_pool = Some(pool);
        self
    }

    /// Seed a tenant into the in-memory backend. Ignored when a pool is
    /// attached.
    #[must_use]
    pub fn with_demo_tenant(mut self, demo: DemoTenant) -> Self {
        self.demo_tenant = Some(demo);
        self
    }
}
