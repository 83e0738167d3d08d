//! PostgreSQL persistence adapters using Diesel ORM.
//!
//! Each adapter implements one driven port from [`crate::domain::ports`] on
//! top of a shared `bb8` pool of `diesel-async` connections. Row structs
//! (`models.rs`) and table definitions (`schema.rs`) stay private; only the
//! adapters, the pool and the migration runner are exported.
//!
//! Every statement is scoped by `project_id`, so a row owned by another
//! tenant is indistinguishable from a missing one.
//!
//! # Example
//!
//! ```ignore
//! use backend::outbound::persistence::{DbPool, DieselDocumentRepository, PoolConfig};
//!
//! let pool = DbPool::new(PoolConfig::new("postgres://localhost/baas")).await?;
//! let documents = DieselDocumentRepository::new(pool);
//! ```

mod diesel_analytics_sink;
mod diesel_basic_error_mapping;
mod diesel_channel_repository;
mod diesel_document_repository;
mod diesel_event_repository;
mod diesel_tenant_resolver;
mod diesel_usage_ledger;
mod jsonb_filter;
mod migrations;
mod models;
mod pool;
mod schema;

pub use diesel_analytics_sink::DieselAnalyticsSink;
pub use diesel_channel_repository::DieselChannelRepository;
pub use diesel_document_repository::DieselDocumentRepository;
pub use diesel_event_repository::DieselEventRepository;
pub use diesel_tenant_resolver::DieselTenantResolver;
pub use diesel_usage_ledger::DieselUsageLedger;
pub use migrations::{MigrationError, run_migrations};
pub use pool::{DbPool, PoolConfig, PoolError};
