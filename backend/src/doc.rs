//! OpenAPI documentation configuration.
//!
//! This module defines the [`ApiDoc`] struct which generates the OpenAPI
//! specification for the REST API. It registers:
//!
//! - **Paths**: every project-scoped handler (documents, collections,
//!   realtime management) plus the health probes
//! - **Schemas**: domain types, request bodies and the response envelopes
//! - **Security**: the `x-api-key` header and its `api_key` query fallback
//!
//! The WebSocket endpoint is not described; OpenAPI has no vocabulary for
//! upgraded connections. The generated specification is used by Swagger UI
//! (debug builds) and exported via `cargo run --bin openapi-dump`.

use crate::domain::{
    BroadcastFrame, Channel, Collection, Document, Error, ErrorCode, EventKind, Filter, FilterOp,
    RealtimeEvent, RetentionPolicy, SubscriptionType,
};
use crate::inbound::http::collections::{CreateCollectionRequest, RenameCollectionRequest};
use crate::inbound::http::documents::{
    CountRequest, CountResponse, ExistsResponse, IncrementRequest, QueryRequest,
};
use crate::inbound::http::realtime::{
    CreateChannelRequest, DeliveryRequest, PublishRequest, PublishResponse, UpdateChannelRequest,
};
use crate::inbound::http::schemas::{FailureEnvelopeSchema, SuccessEnvelopeSchema};
use crate::middleware::admission::{API_KEY_HEADER, API_KEY_PARAM};
use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::{Modify, OpenApi};

/// Enrich the generated document with the API key security schemes.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi
            .components
            .get_or_insert_with(utoipa::openapi::Components::default);

        components.add_security_scheme(
            "ApiKeyHeader",
            SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::with_description(
                API_KEY_HEADER,
                "Project API key.",
            ))),
        );
        components.add_security_scheme(
            "ApiKeyQuery",
            SecurityScheme::ApiKey(ApiKey::Query(ApiKeyValue::with_description(
                API_KEY_PARAM,
                "Project API key for clients that cannot set headers.",
            ))),
        );
    }
}

/// OpenAPI document for the REST API.
/// Swagger UI is enabled in debug builds only and used by tooling.
#[derive(OpenApi)]
#[openapi(
    modifiers(&SecurityAddon),
    info(
        title = "BaaS backend API",
        description = "Multi-tenant document store and realtime channels behind API key admission."
    ),
    servers(
        (url = "/", description = "Relative to the deployment base URL")
    ),
    security(("ApiKeyHeader" = []), ("ApiKeyQuery" = [])),
    paths(
        crate::inbound::http::health::ready,
        crate::inbound::http::health::live,
        crate::inbound::http::collections::list_collections,
        crate::inbound::http::collections::create_collection,
        crate::inbound::http::collections::rename_collection,
        crate::inbound::http::collections::delete_collection,
        crate::inbound::http::collections::rename_collection_config,
        crate::inbound::http::collections::delete_collection_config,
        crate::inbound::http::documents::create_document,
        crate::inbound::http::documents::list_documents,
        crate::inbound::http::documents::query_documents,
        crate::inbound::http::documents::count_documents,
        crate::inbound::http::documents::count_all_documents,
        crate::inbound::http::documents::get_document,
        crate::inbound::http::documents::update_document,
        crate::inbound::http::documents::set_document,
        crate::inbound::http::documents::delete_document,
        crate::inbound::http::documents::upsert_document,
        crate::inbound::http::documents::document_exists,
        crate::inbound::http::documents::increment_field,
        crate::inbound::http::realtime::list_channels,
        crate::inbound::http::realtime::create_channel,
        crate::inbound::http::realtime::update_channel,
        crate::inbound::http::realtime::delete_channel,
        crate::inbound::http::realtime::publish_event,
        crate::inbound::http::realtime::channel_history,
        crate::inbound::http::realtime::update_event,
        crate::inbound::http::realtime::delete_event,
    ),
    components(schemas(
        Error,
        ErrorCode,
        FailureEnvelopeSchema,
        SuccessEnvelopeSchema,
        Document,
        Collection,
        Filter,
        FilterOp,
        QueryRequest,
        CountRequest,
        CountResponse,
        ExistsResponse,
        IncrementRequest,
        CreateCollectionRequest,
        RenameCollectionRequest,
        Channel,
        RealtimeEvent,
        BroadcastFrame,
        EventKind,
        SubscriptionType,
        RetentionPolicy,
        CreateChannelRequest,
        UpdateChannelRequest,
        PublishRequest,
        PublishResponse,
        DeliveryRequest,
    )),
    tags(
        (name = "documents", description = "JSON documents within a collection"),
        (name = "collections", description = "Collection management"),
        (name = "realtime", description = "Channel management, publishing and history"),
        (name = "health", description = "Endpoints for health checks")
    )
)]
pub struct ApiDoc;
