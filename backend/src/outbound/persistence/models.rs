//! Internal Diesel row structs for database operations.
//!
//! These types are implementation details of the persistence layer and must
//! never be exposed to the domain. Adapters convert them into domain types at
//! the port boundary.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::sql_types::Bool;
use uuid::Uuid;

use super::schema::{
    api_keys, collections, documents, project_usages, projects, realtime_channels,
    realtime_events,
};

// ---------------------------------------------------------------------------
// Tenants
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = projects)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct ProjectRow {
    pub id: Uuid,
    pub reference_id: String,
    pub owner_id: Uuid,
    pub name: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = api_keys)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct ApiKeyRow {
    pub id: Uuid,
    pub project_id: Uuid,
    pub is_active: bool,
    pub usage_count: i64,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = project_usages)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct UsageRow {
    pub project_id: Uuid,
    pub api_calls: i64,
    pub api_calls_limit: i64,
    pub auth_users_count: i64,
    pub auth_users_limit: i64,
    pub documents_count: i64,
    pub documents_limit: i64,
    pub storage_used_mb: f64,
    pub storage_limit_mb: f64,
    pub notifications_count: i64,
    pub notifications_limit: i64,
    pub realtime_channels_count: i64,
    pub realtime_channels_limit: i64,
    pub realtime_events_count: i64,
    pub realtime_events_limit: i64,
}

// ---------------------------------------------------------------------------
// Document store
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = collections)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct CollectionRow {
    pub id: Uuid,
    pub project_id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = collections)]
pub(crate) struct NewCollectionRow<'a> {
    pub project_id: Uuid,
    pub name: &'a str,
}

/// Live document columns. Also readable from raw `RETURNING` clauses.
#[derive(Debug, Clone, Queryable, QueryableByName, Selectable)]
#[diesel(table_name = documents)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct DocumentRow {
    pub id: Uuid,
    pub project_id: Uuid,
    pub collection_id: Uuid,
    pub data: serde_json::Value,
    pub version: i64,
    pub etag: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Row returned by the upsert statement, flagging fresh inserts.
#[derive(Debug, Clone, QueryableByName)]
pub(crate) struct PutDocumentRow {
    #[diesel(embed)]
    pub document: DocumentRow,
    #[diesel(sql_type = Bool)]
    pub inserted: bool,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = documents)]
pub(crate) struct NewDocumentRow<'a> {
    pub id: Uuid,
    pub project_id: Uuid,
    pub collection_id: Uuid,
    pub data: &'a serde_json::Value,
    pub version: i64,
    pub etag: &'a str,
}

// ---------------------------------------------------------------------------
// Realtime
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = realtime_channels)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct ChannelRow {
    pub id: Uuid,
    pub project_id: Uuid,
    pub name: String,
    pub subscription_type: String,
    pub retention: String,
    pub description: Option<String>,
    pub max_clients: i32,
    pub connected_clients: i32,
    pub metadata: serde_json::Value,
    pub last_message_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = realtime_channels)]
pub(crate) struct NewChannelRow<'a> {
    pub project_id: Uuid,
    pub name: &'a str,
    pub subscription_type: &'a str,
    pub retention: &'a str,
    pub description: Option<&'a str>,
    pub max_clients: i32,
    pub metadata: &'a serde_json::Value,
}

/// Partial channel update; `None` fields are left untouched.
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = realtime_channels)]
pub(crate) struct ChannelChangeset<'a> {
    pub name: Option<&'a str>,
    pub subscription_type: Option<&'a str>,
    pub retention: Option<&'a str>,
    pub description: Option<&'a str>,
    pub max_clients: Option<i32>,
    pub metadata: Option<&'a serde_json::Value>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = realtime_events)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct EventRow {
    pub id: Uuid,
    pub channel_id: Uuid,
    pub project_id: Uuid,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub sender_id: Option<String>,
    pub delivered_count: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = realtime_events)]
pub(crate) struct NewEventRow<'a> {
    pub channel_id: Uuid,
    pub project_id: Uuid,
    pub event_type: &'a str,
    pub payload: &'a serde_json::Value,
    pub sender_id: Option<&'a str>,
    pub created_at: DateTime<Utc>,
}
