//! Realtime channel and event management handlers.
//!
//! ```text
//! GET    /api/v1/projects/{project_id}/realtime/channels
//! POST   /api/v1/projects/{project_id}/realtime/channels            {"name":"chat"}
//! PATCH  /api/v1/projects/{project_id}/realtime/channels/{id}
//! DELETE /api/v1/projects/{project_id}/realtime/channels/{id}
//! POST   /api/v1/projects/{project_id}/realtime/channels/{id}/events
//! GET    /api/v1/projects/{project_id}/realtime/channels/{id}/events?limit=50
//! PATCH  /api/v1/projects/{project_id}/realtime/events/{event_id}   {"delivered_count":3}
//! DELETE /api/v1/projects/{project_id}/realtime/events/{event_id}
//! ```

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, delete, get, patch, post, put, web};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::domain::{
    Channel, ChannelSettings, ChannelUpdate, DEFAULT_MAX_CLIENTS, Error, EventKind,
    RealtimeEvent, RetentionPolicy, SubscriptionType, TenantContext,
};
use crate::inbound::http::ApiResult;
use crate::inbound::http::envelope::{Envelope, ok};
use crate::inbound::http::state::HttpState;
use crate::inbound::http::validation::{
    FieldName, missing_field_error, parse_channel_name, parse_uuid,
};

#[derive(Debug, Deserialize)]
pub struct ChannelPath {
    channel_id: String,
}

#[derive(Debug, Deserialize)]
pub struct EventPath {
    event_id: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct HistoryParams {
    limit: Option<i64>,
}

/// Body of `POST /realtime/channels`. Only `name` is required.
#[derive(Debug, Default, Deserialize, Serialize, ToSchema)]
pub struct CreateChannelRequest {
    #[schema(example = "chat")]
    pub name: Option<String>,
    pub subscription_type: Option<SubscriptionType>,
    /// Shorthand for `subscription_type = "private"`.
    pub is_private: Option<bool>,
    #[serde(alias = "retention")]
    pub retention_policy: Option<RetentionPolicy>,
    pub description: Option<String>,
    pub max_clients: Option<i32>,
    pub metadata: Option<Value>,
}

impl CreateChannelRequest {
    fn settings(&self) -> ChannelSettings {
        let defaults = ChannelSettings::lazy_default();
        ChannelSettings {
            subscription_type: subscription_type(self.subscription_type, self.is_private)
                .unwrap_or(defaults.subscription_type),
            retention: self.retention_policy.unwrap_or(defaults.retention),
            description: self.description.clone(),
            max_clients: self.max_clients.unwrap_or(DEFAULT_MAX_CLIENTS),
            metadata: self.metadata.clone().unwrap_or(defaults.metadata),
        }
    }
}

/// Body of the channel update endpoints. Absent members stay unchanged.
#[derive(Debug, Default, Deserialize, Serialize, ToSchema)]
pub struct UpdateChannelRequest {
    pub name: Option<String>,
    pub subscription_type: Option<SubscriptionType>,
    pub is_private: Option<bool>,
    #[serde(alias = "retention")]
    pub retention_policy: Option<RetentionPolicy>,
    pub description: Option<String>,
    pub max_clients: Option<i32>,
    pub metadata: Option<Value>,
}

impl UpdateChannelRequest {
    fn into_update(self) -> Result<ChannelUpdate, Error> {
        let name = self
            .name
            .as_deref()
            .map(|raw| parse_channel_name(raw, FieldName::new("name")))
            .transpose()?;
        Ok(ChannelUpdate {
            name,
            subscription_type: subscription_type(self.subscription_type, self.is_private),
            retention: self.retention_policy,
            description: self.description,
            max_clients: self.max_clients,
            metadata: self.metadata,
        })
    }
}

/// An explicit `subscription_type` wins over the `is_private` shorthand.
fn subscription_type(
    explicit: Option<SubscriptionType>,
    is_private: Option<bool>,
) -> Option<SubscriptionType> {
    explicit.or(match is_private {
        Some(true) => Some(SubscriptionType::Private),
        Some(false) => Some(SubscriptionType::Public),
        None => None,
    })
}

/// Body of `POST /realtime/channels/{channel_id}/events`.
#[derive(Debug, Default, Deserialize, Serialize, ToSchema)]
pub struct PublishRequest {
    /// Unknown kinds are stored as `custom`.
    #[serde(default, alias = "event")]
    pub event_type: EventKind,
    #[serde(default)]
    pub payload: Value,
    pub sender_id: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PublishResponse {
    /// Persisted event; absent for ephemeral channels.
    pub event: Option<RealtimeEvent>,
    /// Live clients the frame was queued for.
    pub delivered: usize,
}

/// Body of the event update endpoints.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct DeliveryRequest {
    pub delivered_count: Option<i32>,
}

fn channel_id(path: &ChannelPath) -> Result<Uuid, Error> {
    parse_uuid(&path.channel_id, FieldName::new("channel_id"))
}

fn event_id(path: &EventPath) -> Result<Uuid, Error> {
    parse_uuid(&path.event_id, FieldName::new("event_id"))
}

/// List the project's channels.
#[utoipa::path(
    get,
    path = "/api/v1/projects/{project_id}/realtime/channels",
    params(("project_id" = String, Path, description = "Project UUID or reference id")),
    responses(
        (status = 200, description = "Channels", body = [Channel]),
        (status = 401, description = "Missing or invalid API key", body = Error)
    ),
    tags = ["realtime"],
    operation_id = "listChannels"
)]
#[get("/realtime/channels")]
pub async fn list_channels(
    state: web::Data<HttpState>,
    tenant: TenantContext,
) -> ApiResult<HttpResponse> {
    let channels = state.channels.list_channels(tenant.tenant_id()).await?;
    Ok(ok("Success", channels))
}

/// Create a channel, or return the existing one with that name.
#[utoipa::path(
    post,
    path = "/api/v1/projects/{project_id}/realtime/channels",
    params(("project_id" = String, Path, description = "Project UUID or reference id")),
    request_body = CreateChannelRequest,
    responses(
        (status = 201, description = "Channel created", body = Channel),
        (status = 200, description = "Channel already existed", body = Channel),
        (status = 400, description = "Invalid channel settings", body = Error)
    ),
    tags = ["realtime"],
    operation_id = "createChannel"
)]
#[post("/realtime/channels")]
pub async fn create_channel(
    state: web::Data<HttpState>,
    tenant: TenantContext,
    payload: web::Json<CreateChannelRequest>,
) -> ApiResult<HttpResponse> {
    let request = payload.into_inner();
    let field = FieldName::new("name");
    let name = request
        .name
        .as_deref()
        .ok_or_else(|| missing_field_error(field))
        .and_then(|raw| parse_channel_name(raw, field))?;
    let lookup = state
        .channels
        .create_channel(tenant.tenant_id(), name, request.settings())
        .await?;
    let status = if lookup.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok(Envelope::new("Success", lookup.channel).respond(status))
}

async fn apply_update(
    state: &HttpState,
    tenant: &TenantContext,
    path: &ChannelPath,
    body: UpdateChannelRequest,
) -> ApiResult<HttpResponse> {
    let id = channel_id(path)?;
    let update = body.into_update()?;
    let channel = state
        .channels
        .update_channel(tenant.tenant_id(), id, update)
        .await?;
    Ok(ok("Updated", channel))
}

/// Update channel settings.
#[utoipa::path(
    patch,
    path = "/api/v1/projects/{project_id}/realtime/channels/{channel_id}",
    params(
        ("project_id" = String, Path, description = "Project UUID or reference id"),
        ("channel_id" = String, Path, description = "Channel UUID")
    ),
    request_body = UpdateChannelRequest,
    responses(
        (status = 200, description = "Updated channel", body = Channel),
        (status = 404, description = "Channel not found", body = Error),
        (status = 409, description = "Name already in use", body = Error)
    ),
    tags = ["realtime"],
    operation_id = "updateChannel"
)]
#[patch("/realtime/channels/{channel_id}")]
pub async fn update_channel(
    state: web::Data<HttpState>,
    tenant: TenantContext,
    path: web::Path<ChannelPath>,
    payload: web::Json<UpdateChannelRequest>,
) -> ApiResult<HttpResponse> {
    apply_update(&state, &tenant, &path, payload.into_inner()).await
}

/// Method alias of [`update_channel`]; the OpenAPI document lists only the
/// canonical verb.
#[put("/realtime/channels/{channel_id}")]
pub async fn replace_channel(
    state: web::Data<HttpState>,
    tenant: TenantContext,
    path: web::Path<ChannelPath>,
    payload: web::Json<UpdateChannelRequest>,
) -> ApiResult<HttpResponse> {
    apply_update(&state, &tenant, &path, payload.into_inner()).await
}

/// Delete a channel and its event log.
#[utoipa::path(
    delete,
    path = "/api/v1/projects/{project_id}/realtime/channels/{channel_id}",
    params(
        ("project_id" = String, Path, description = "Project UUID or reference id"),
        ("channel_id" = String, Path, description = "Channel UUID")
    ),
    responses(
        (status = 200, description = "Channel deleted"),
        (status = 404, description = "Channel not found", body = Error)
    ),
    tags = ["realtime"],
    operation_id = "deleteChannel"
)]
#[delete("/realtime/channels/{channel_id}")]
pub async fn delete_channel(
    state: web::Data<HttpState>,
    tenant: TenantContext,
    path: web::Path<ChannelPath>,
) -> ApiResult<HttpResponse> {
    let id = channel_id(&path)?;
    state.channels.delete_channel(tenant.tenant_id(), id).await?;
    Ok(ok("Deleted", ()))
}

/// Publish an event: persist it when the channel retains history, then
/// fan it out to live subscribers.
#[utoipa::path(
    post,
    path = "/api/v1/projects/{project_id}/realtime/channels/{channel_id}/events",
    params(
        ("project_id" = String, Path, description = "Project UUID or reference id"),
        ("channel_id" = String, Path, description = "Channel UUID")
    ),
    request_body = PublishRequest,
    responses(
        (status = 201, description = "Event published", body = PublishResponse),
        (status = 404, description = "Channel not found", body = Error)
    ),
    tags = ["realtime"],
    operation_id = "publishEvent"
)]
#[post("/realtime/channels/{channel_id}/events")]
pub async fn publish_event(
    state: web::Data<HttpState>,
    tenant: TenantContext,
    path: web::Path<ChannelPath>,
    payload: web::Json<PublishRequest>,
) -> ApiResult<HttpResponse> {
    let id = channel_id(&path)?;
    let PublishRequest {
        event_type,
        payload,
        sender_id,
    } = payload.into_inner();
    let receipt = state
        .channels
        .publish(tenant.tenant_id(), id, event_type, payload, sender_id)
        .await?;
    Ok(Envelope::new(
        "Created & Saved",
        PublishResponse {
            event: receipt.event,
            delivered: receipt.delivered,
        },
    )
    .respond(StatusCode::CREATED))
}

/// Newest-first event history.
#[utoipa::path(
    get,
    path = "/api/v1/projects/{project_id}/realtime/channels/{channel_id}/events",
    params(
        ("project_id" = String, Path, description = "Project UUID or reference id"),
        ("channel_id" = String, Path, description = "Channel UUID"),
        ("limit" = Option<i64>, Query, description = "Events to return, default 50, max 500")
    ),
    responses(
        (status = 200, description = "Events", body = [RealtimeEvent]),
        (status = 404, description = "Channel not found", body = Error)
    ),
    tags = ["realtime"],
    operation_id = "channelHistory"
)]
#[get("/realtime/channels/{channel_id}/events")]
pub async fn channel_history(
    state: web::Data<HttpState>,
    tenant: TenantContext,
    path: web::Path<ChannelPath>,
    params: web::Query<HistoryParams>,
) -> ApiResult<HttpResponse> {
    let id = channel_id(&path)?;
    let events = state
        .channels
        .history(tenant.tenant_id(), id, params.limit)
        .await?;
    Ok(ok("Success", events))
}

async fn apply_delivery(
    state: &HttpState,
    tenant: &TenantContext,
    path: &EventPath,
    body: DeliveryRequest,
) -> ApiResult<HttpResponse> {
    let id = event_id(path)?;
    let delivered_count = body
        .delivered_count
        .ok_or_else(|| missing_field_error(FieldName::new("delivered_count")))?;
    let event = state
        .channels
        .record_delivery(tenant.tenant_id(), id, delivered_count)
        .await?;
    Ok(ok("Updated", event))
}

/// Record delivery bookkeeping. Event payloads are immutable.
#[utoipa::path(
    patch,
    path = "/api/v1/projects/{project_id}/realtime/events/{event_id}",
    params(
        ("project_id" = String, Path, description = "Project UUID or reference id"),
        ("event_id" = String, Path, description = "Event UUID")
    ),
    request_body = DeliveryRequest,
    responses(
        (status = 200, description = "Updated event", body = RealtimeEvent),
        (status = 404, description = "Event not found", body = Error)
    ),
    tags = ["realtime"],
    operation_id = "recordDelivery"
)]
#[patch("/realtime/events/{event_id}")]
pub async fn update_event(
    state: web::Data<HttpState>,
    tenant: TenantContext,
    path: web::Path<EventPath>,
    payload: web::Json<DeliveryRequest>,
) -> ApiResult<HttpResponse> {
    apply_delivery(&state, &tenant, &path, payload.into_inner()).await
}

/// Method alias of [`update_event`]; the OpenAPI document lists only the
/// canonical verb.
#[put("/realtime/events/{event_id}")]
pub async fn replace_event(
    state: web::Data<HttpState>,
    tenant: TenantContext,
    path: web::Path<EventPath>,
    payload: web::Json<DeliveryRequest>,
) -> ApiResult<HttpResponse> {
    apply_delivery(&state, &tenant, &path, payload.into_inner()).await
}

/// Delete one event from the log.
#[utoipa::path(
    delete,
    path = "/api/v1/projects/{project_id}/realtime/events/{event_id}",
    params(
        ("project_id" = String, Path, description = "Project UUID or reference id"),
        ("event_id" = String, Path, description = "Event UUID")
    ),
    responses(
        (status = 200, description = "Event deleted"),
        (status = 404, description = "Event not found", body = Error)
    ),
    tags = ["realtime"],
    operation_id = "deleteEvent"
)]
#[delete("/realtime/events/{event_id}")]
pub async fn delete_event(
    state: web::Data<HttpState>,
    tenant: TenantContext,
    path: web::Path<EventPath>,
) -> ApiResult<HttpResponse> {
    let id = event_id(&path)?;
    state.channels.delete_event(tenant.tenant_id(), id).await?;
    Ok(ok("Deleted", ()))
}

#[cfg(test)]
#[path = "realtime_tests.rs"]
mod tests;
