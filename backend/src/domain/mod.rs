//! Domain primitives, services and ports.
//!
//! Purpose: define the tenant, document and realtime types shared by the
//! inbound and outbound adapters, together with the services that implement
//! the driving ports. Nothing in this module knows about HTTP, WebSockets or
//! SQL; adapters translate at the edges.
//!
//! Public surface:
//! - [`Error`] and [`ErrorCode`]: transport-agnostic failure payload.
//! - [`TenantContext`]: the admitted tenant carried through a request.
//! - [`DocumentQuery`] and [`Filter`]: typed, validated document queries.
//! - [`RealtimeHub`]: the in-process registry of live connections.
//! - [`AdmissionService`], [`DocumentService`] and [`RealtimeService`]:
//!   implementations of the driving ports in [`ports`].

pub mod analytics;
mod background;
pub mod document;
pub mod error;
pub mod ports;
pub mod query;
pub mod realtime;
pub mod tenant;
pub mod trace_id;
pub mod usage;

mod admission_service;
mod document_service;
pub mod realtime_hub;
mod realtime_service;

pub use self::admission_service::AdmissionService;
pub use self::analytics::AnalyticsType;
pub use self::background::spawn_detached;
pub use self::document::{
    COLLECTION_NAME_MAX, Collection, CollectionName, Document, DocumentId,
    DocumentValidationError, Payload, WriteOutcome,
};
pub use self::document_service::DocumentService;
pub use self::error::{Error, ErrorCode, TRACE_ID_HEADER};
pub use self::query::{
    DEFAULT_QUERY_LIMIT, DocumentQuery, FIELD_NAME_MAX, FieldPath, Filter, FilterOp,
    MAX_QUERY_LIMIT, OrderBy, QueryValidationError, SortColumn, SortDirection, escape_like,
    scalar_text, search_matches,
};
pub use self::realtime::{
    BroadcastFrame, CHANNEL_NAME_MAX, Channel, ChannelName, ChannelSettings, ChannelUpdate,
    ClientId, DEFAULT_MAX_CLIENTS, EventKind, NewEvent, RealtimeEvent, RealtimeValidationError,
    RetentionPolicy, SubscriptionType,
};
pub use self::realtime_hub::{CLIENT_QUEUE_CAPACITY, ConnectionId, RealtimeHub, Registration};
pub use self::realtime_service::{DEFAULT_HISTORY_LIMIT, MAX_HISTORY_LIMIT, RealtimeService};
pub use self::tenant::{ApiKeyRecord, Project, TenantContext, TenantId, TenantRef};
pub use self::trace_id::TraceId;
pub use self::usage::{
    Allowance, QuotaDimension, StorageAllowance, UNLIMITED, UsageField, UsageRecord,
};

/// Convenient API result alias.
///
/// # Examples
/// ```
/// use actix_web::HttpResponse;
/// use backend::domain::{ApiResult, Error};
///
/// fn handler() -> ApiResult<HttpResponse> {
///     Err(Error::forbidden("Security Violation"))
/// }
/// ```
pub type ApiResult<T> = Result<T, Error>;
