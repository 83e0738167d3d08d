//! PostgreSQL-backed tenant resolution for the admission gateway.

use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use uuid::Uuid;

use crate::domain::ports::{TenantResolver, TenantResolverError};
use crate::domain::{ApiKeyRecord, Project, TenantId, TenantRef};

use super::diesel_basic_error_mapping::{map_basic_diesel_error, map_basic_pool_error};
use super::models::{ApiKeyRow, ProjectRow};
use super::pool::{DbPool, PoolError};
use super::schema::{api_keys, projects};

/// Resolves projects and API keys from the `projects` and `api_keys` tables.
#[derive(Clone)]
pub struct DieselTenantResolver {
    pool: DbPool,
}

impl DieselTenantResolver {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_pool_error(error: PoolError) -> TenantResolverError {
    map_basic_pool_error(error, TenantResolverError::connection)
}

fn map_diesel_error(error: diesel::result::Error) -> TenantResolverError {
    map_basic_diesel_error(
        error,
        TenantResolverError::query,
        TenantResolverError::connection,
    )
}

impl From<ProjectRow> for Project {
    fn from(row: ProjectRow) -> Self {
        Self {
            id: TenantId::from_uuid(row.id),
            reference_id: row.reference_id,
            owner_id: row.owner_id,
            name: row.name,
            active: row.is_active,
        }
    }
}

impl From<ApiKeyRow> for ApiKeyRecord {
    fn from(row: ApiKeyRow) -> Self {
        Self {
            id: row.id,
            project_id: TenantId::from_uuid(row.project_id),
            revoked: !row.is_active,
            usage_count: row.usage_count,
        }
    }
}

#[async_trait]
impl TenantResolver for DieselTenantResolver {
    async fn find_project(
        &self,
        reference: &TenantRef,
    ) -> Result<Option<Project>, TenantResolverError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let query = projects::table.select(ProjectRow::as_select()).into_boxed();
        let query = match reference {
            TenantRef::Id(id) => query.filter(projects::id.eq(*id.as_uuid())),
            TenantRef::Reference(reference) => {
                query.filter(projects::reference_id.eq(reference.clone()))
            }
        };
        let row = query
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        Ok(row.map(Project::from))
    }

    async fn find_api_key(&self, key: &str) -> Result<Option<ApiKeyRecord>, TenantResolverError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row = api_keys::table
            .filter(api_keys::key.eq(key))
            .select(ApiKeyRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        Ok(row.map(ApiKeyRecord::from))
    }

    async fn record_api_key_usage(&self, key_id: Uuid) -> Result<(), TenantResolverError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        diesel::update(api_keys::table.filter(api_keys::id.eq(key_id)))
            .set((
                api_keys::usage_count.eq(api_keys::usage_count + 1),
                api_keys::last_used_at.eq(Some(Utc::now())),
            ))
            .execute(&mut conn)
            .await
            .map(|_| ())
            .map_err(map_diesel_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn inactive_keys_are_revoked() {
        let record = ApiKeyRecord::from(ApiKeyRow {
            id: Uuid::new_v4(),
            project_id: Uuid::new_v4(),
            is_active: false,
            usage_count: 7,
        });
        assert!(record.revoked);
        assert_eq!(record.usage_count, 7);
    }

    #[rstest]
    fn project_rows_keep_their_reference() {
        let id = Uuid::new_v4();
        let project = Project::from(ProjectRow {
            id,
            reference_id: "acme-prod".to_owned(),
            owner_id: Uuid::new_v4(),
            name: "Acme".to_owned(),
            is_active: true,
        });
        assert_eq!(project.id, TenantId::from_uuid(id));
        assert_eq!(project.reference_id, "acme-prod");
    }

    #[rstest]
    fn closed_pools_surface_as_connection_errors() {
        assert_eq!(
            map_pool_error(PoolError::checkout("closed")),
            TenantResolverError::connection("closed")
        );
    }
}
