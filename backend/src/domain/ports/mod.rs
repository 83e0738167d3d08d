//! Domain ports and supporting types for the hexagonal boundary.
//!
//! Driven ports (`*Repository`, [`TenantResolver`], [`UsageLedger`],
//! [`AnalyticsSink`]) are implemented by outbound adapters. Driving ports
//! ([`TenantAdmission`], [`DocumentStore`], [`ChannelManagement`],
//! [`LiveChannels`]) are
//! implemented by domain services and consumed by inbound adapters.

mod macros;
pub(crate) use macros::define_port_error;

mod analytics_sink;
mod channel_management;
mod channel_repository;
mod document_repository;
mod document_store;
mod event_repository;
mod live_channels;
mod tenant_admission;
mod tenant_resolver;
mod usage_ledger;

#[cfg(test)]
pub use analytics_sink::MockAnalyticsSink;
pub use analytics_sink::{AnalyticsSink, AnalyticsSinkError, FixtureAnalyticsSink};
#[cfg(test)]
pub use channel_management::MockChannelManagement;
pub use channel_management::{ChannelManagement, PublishReceipt};
#[cfg(test)]
pub use channel_repository::MockChannelRepository;
pub use channel_repository::{
    ChannelLookup, ChannelRepository, ChannelRepositoryError, FixtureChannelRepository,
};
#[cfg(test)]
pub use document_repository::MockDocumentRepository;
pub use document_repository::{
    CountFilter, DocumentRepository, DocumentRepositoryError, FixtureDocumentRepository,
};
#[cfg(test)]
pub use document_store::MockDocumentStore;
pub use document_store::DocumentStore;
#[cfg(test)]
pub use event_repository::MockEventRepository;
pub use event_repository::{EventRepository, EventRepositoryError, FixtureEventRepository};
#[cfg(test)]
pub use live_channels::MockLiveChannels;
pub use live_channels::LiveChannels;
#[cfg(test)]
pub use tenant_admission::MockTenantAdmission;
pub use tenant_admission::{AdmissionRequest, FixtureTenantAdmission, TenantAdmission};
#[cfg(test)]
pub use tenant_resolver::MockTenantResolver;
pub use tenant_resolver::{FixtureTenantResolver, TenantResolver, TenantResolverError};
#[cfg(test)]
pub use usage_ledger::MockUsageLedger;
pub use usage_ledger::{FixtureUsageLedger, UsageLedger, UsageLedgerError};
