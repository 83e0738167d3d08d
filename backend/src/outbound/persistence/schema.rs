//! Diesel table definitions for the PostgreSQL schema.
//!
//! These definitions must match `backend/migrations` exactly. Queries that
//! need JSONB operators Diesel does not model (`->>`, `||`, `jsonb_set`) are
//! written as bound SQL fragments in the adapters and still name these
//! columns.

diesel::table! {
    /// Tenants. `reference_id` is the public slug accepted in URLs.
    projects (id) {
        id -> Uuid,
        reference_id -> Varchar,
        owner_id -> Uuid,
        name -> Varchar,
        is_active -> Bool,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// API keys; an inactive key is treated as revoked.
    api_keys (id) {
        id -> Uuid,
        project_id -> Uuid,
        key -> Varchar,
        name -> Varchar,
        is_active -> Bool,
        usage_count -> Int8,
        last_used_at -> Nullable<Timestamptz>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    /// One usage ledger row per tenant. A limit of `-1` is unbounded.
    project_usages (project_id) {
        project_id -> Uuid,
        api_calls -> Int8,
        api_calls_limit -> Int8,
        auth_users_count -> Int8,
        auth_users_limit -> Int8,
        documents_count -> Int8,
        documents_limit -> Int8,
        storage_used_mb -> Float8,
        storage_limit_mb -> Float8,
        notifications_count -> Int8,
        notifications_limit -> Int8,
        realtime_channels_count -> Int8,
        realtime_channels_limit -> Int8,
        realtime_events_count -> Int8,
        realtime_events_limit -> Int8,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Monthly metric buckets keyed by `(project_id, type, period_start)`.
    analytics (id) {
        id -> Uuid,
        project_id -> Uuid,
        #[sql_name = "type"]
        metric_type -> Varchar,
        period_start -> Date,
        metrics -> Jsonb,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    collections (id) {
        id -> Uuid,
        project_id -> Uuid,
        name -> Varchar,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Schema-less documents. Soft-deleted rows stay until the owning
    /// project is removed.
    documents (id) {
        id -> Uuid,
        project_id -> Uuid,
        collection_id -> Uuid,
        data -> Jsonb,
        version -> Int8,
        etag -> Varchar,
        is_deleted -> Bool,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    realtime_channels (id) {
        id -> Uuid,
        project_id -> Uuid,
        name -> Varchar,
        subscription_type -> Varchar,
        retention -> Varchar,
        description -> Nullable<Text>,
        max_clients -> Int4,
        connected_clients -> Int4,
        metadata -> Jsonb,
        last_message_at -> Nullable<Timestamptz>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Append-only event log; only `delivered_count` is ever updated.
    realtime_events (id) {
        id -> Uuid,
        channel_id -> Uuid,
        project_id -> Uuid,
        event_type -> Varchar,
        payload -> Jsonb,
        sender_id -> Nullable<Varchar>,
        delivered_count -> Int4,
        created_at -> Timestamptz,
    }
}

diesel::joinable!(api_keys -> projects (project_id));
diesel::joinable!(project_usages -> projects (project_id));
diesel::joinable!(analytics -> projects (project_id));
diesel::joinable!(collections -> projects (project_id));
diesel::joinable!(realtime_channels -> projects (project_id));
diesel::joinable!(realtime_events -> realtime_channels (channel_id));

diesel::allow_tables_to_appear_in_same_query!(
    projects,
    api_keys,
    project_usages,
    analytics,
    collections,
    documents,
    realtime_channels,
    realtime_events,
);
