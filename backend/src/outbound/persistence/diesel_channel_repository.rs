//! PostgreSQL-backed realtime channel registry.

use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use diesel::sql_query;
use diesel::sql_types::{Integer, Text, Uuid as SqlUuid};
use diesel_async::RunQueryDsl;
use tracing::debug;
use uuid::Uuid;

use crate::domain::ports::{ChannelLookup, ChannelRepository, ChannelRepositoryError};
use crate::domain::{
    Channel, ChannelName, ChannelSettings, ChannelUpdate, RetentionPolicy, SubscriptionType,
    TenantId,
};

use super::diesel_basic_error_mapping::{
    is_unique_violation, map_basic_diesel_error, map_basic_pool_error,
};
use super::models::{ChannelChangeset, ChannelRow, NewChannelRow};
use super::pool::{DbPool, PoolError};
use super::schema::realtime_channels;

/// Channel rows in `realtime_channels`, unique per `(project_id, name)`.
#[derive(Clone)]
pub struct DieselChannelRepository {
    pool: DbPool,
}

impl DieselChannelRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const ADJUST_CLIENTS_SQL: &str = r#"
UPDATE realtime_channels
SET connected_clients = GREATEST(connected_clients + $1, 0)
WHERE project_id = $2 AND name = $3
"#;

fn map_pool_error(error: PoolError) -> ChannelRepositoryError {
    map_basic_pool_error(error, ChannelRepositoryError::connection)
}

fn map_diesel_error(error: diesel::result::Error) -> ChannelRepositoryError {
    map_basic_diesel_error(
        error,
        ChannelRepositoryError::query,
        ChannelRepositoryError::connection,
    )
}

fn row_to_channel(row: ChannelRow) -> Result<Channel, ChannelRepositoryError> {
    let name = ChannelName::new(row.name).map_err(|err| {
        ChannelRepositoryError::query(format!("invalid channel name in database: {err}"))
    })?;
    Ok(Channel {
        id: row.id,
        project_id: TenantId::from_uuid(row.project_id),
        name,
        subscription_type: SubscriptionType::from_stored(&row.subscription_type),
        retention: RetentionPolicy::from_stored(&row.retention),
        description: row.description,
        max_clients: row.max_clients,
        connected_clients: row.connected_clients,
        metadata: row.metadata,
        last_message_at: row.last_message_at,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

#[async_trait]
impl ChannelRepository for DieselChannelRepository {
    async fn list(&self, tenant_id: &TenantId) -> Result<Vec<Channel>, ChannelRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let rows: Vec<ChannelRow> = realtime_channels::table
            .filter(realtime_channels::project_id.eq(tenant_id.as_uuid()))
            .select(ChannelRow::as_select())
            .order_by(realtime_channels::created_at.desc())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        rows.into_iter().map(row_to_channel).collect()
    }

    async fn find_by_id(
        &self,
        tenant_id: &TenantId,
        channel_id: Uuid,
    ) -> Result<Option<Channel>, ChannelRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row = realtime_channels::table
            .filter(realtime_channels::project_id.eq(tenant_id.as_uuid()))
            .filter(realtime_channels::id.eq(channel_id))
            .select(ChannelRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        row.map(row_to_channel).transpose()
    }

    async fn find_by_name(
        &self,
        tenant_id: &TenantId,
        name: &ChannelName,
    ) -> Result<Option<Channel>, ChannelRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row = realtime_channels::table
            .filter(realtime_channels::project_id.eq(tenant_id.as_uuid()))
            .filter(realtime_channels::name.eq(name.as_ref()))
            .select(ChannelRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        row.map(row_to_channel).transpose()
    }

    async fn get_or_create(
        &self,
        tenant_id: &TenantId,
        name: &ChannelName,
        settings: &ChannelSettings,
    ) -> Result<ChannelLookup, ChannelRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let new_row = NewChannelRow {
            project_id: *tenant_id.as_uuid(),
            name: name.as_ref(),
            subscription_type: settings.subscription_type.as_str(),
            retention: settings.retention.as_str(),
            description: settings.description.as_deref(),
            max_clients: settings.max_clients,
            metadata: &settings.metadata,
        };
        let created = diesel::insert_into(realtime_channels::table)
            .values(&new_row)
            .on_conflict((realtime_channels::project_id, realtime_channels::name))
            .do_nothing()
            .returning(ChannelRow::as_returning())
            .get_result(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;

        if let Some(row) = created {
            debug!(%tenant_id, channel = %name, "channel created");
            return Ok(ChannelLookup {
                channel: row_to_channel(row)?,
                created: true,
            });
        }

        let row = realtime_channels::table
            .filter(realtime_channels::project_id.eq(tenant_id.as_uuid()))
            .filter(realtime_channels::name.eq(name.as_ref()))
            .select(ChannelRow::as_select())
            .first(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        Ok(ChannelLookup {
            channel: row_to_channel(row)?,
            created: false,
        })
    }

    async fn update(
        &self,
        tenant_id: &TenantId,
        channel_id: Uuid,
        update: &ChannelUpdate,
    ) -> Result<Option<Channel>, ChannelRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let changeset = ChannelChangeset {
            name: update.name.as_ref().map(AsRef::as_ref),
            subscription_type: update.subscription_type.map(SubscriptionType::as_str),
            retention: update.retention.map(RetentionPolicy::as_str),
            description: update.description.as_deref(),
            max_clients: update.max_clients,
            metadata: update.metadata.as_ref(),
            updated_at: Utc::now(),
        };
        let updated = diesel::update(
            realtime_channels::table
                .filter(realtime_channels::project_id.eq(tenant_id.as_uuid()))
                .filter(realtime_channels::id.eq(channel_id)),
        )
        .set(&changeset)
        .returning(ChannelRow::as_returning())
        .get_result(&mut conn)
        .await
        .optional();

        match updated {
            Ok(row) => row.map(row_to_channel).transpose(),
            Err(err) if is_unique_violation(&err) => Err(ChannelRepositoryError::name_taken(
                changeset.name.unwrap_or_default(),
            )),
            Err(err) => Err(map_diesel_error(err)),
        }
    }

    async fn delete(
        &self,
        tenant_id: &TenantId,
        channel_id: Uuid,
    ) -> Result<bool, ChannelRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let deleted = diesel::delete(
            realtime_channels::table
                .filter(realtime_channels::project_id.eq(tenant_id.as_uuid()))
                .filter(realtime_channels::id.eq(channel_id)),
        )
        .execute(&mut conn)
        .await
        .map_err(map_diesel_error)?;
        Ok(deleted > 0)
    }

    async fn adjust_connected_clients(
        &self,
        tenant_id: &TenantId,
        name: &ChannelName,
        delta: i32,
    ) -> Result<(), ChannelRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        sql_query(ADJUST_CLIENTS_SQL)
            .bind::<Integer, _>(delta)
            .bind::<SqlUuid, _>(*tenant_id.as_uuid())
            .bind::<Text, _>(name.as_ref())
            .execute(&mut conn)
            .await
            .map(|_| ())
            .map_err(map_diesel_error)
    }

    async fn touch(&self, channel_id: Uuid) -> Result<(), ChannelRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        diesel::update(realtime_channels::table.filter(realtime_channels::id.eq(channel_id)))
            .set(realtime_channels::last_message_at.eq(Some(Utc::now())))
            .execute(&mut conn)
            .await
            .map(|_| ())
            .map_err(map_diesel_error)
    }
}
