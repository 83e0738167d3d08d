//! In-process adapters for every driven port.
//!
//! [`InMemoryBackend`] keeps tenants, usage, documents, channels and events
//! behind one async `RwLock`. It backs the server when no database is
//! configured and gives integration tests a store whose filter semantics
//! match the PostgreSQL adapters (see [`crate::domain::Filter::matches`]).
//!
//! Cloning shares the underlying state.

mod documents;
mod realtime;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::ports::{
    AnalyticsSink, AnalyticsSinkError, TenantResolver, TenantResolverError, UsageLedger,
    UsageLedgerError,
};
use crate::domain::{
    AnalyticsType, ApiKeyRecord, Channel, Collection, Document, Project, RealtimeEvent, TenantId,
    TenantRef, UsageField, UsageRecord,
};

#[derive(Debug, Clone)]
struct StoredDocument {
    document: Document,
    deleted: bool,
}

#[derive(Default)]
struct MemoryState {
    projects: HashMap<TenantId, Project>,
    api_keys: HashMap<String, ApiKeyRecord>,
    usage: HashMap<TenantId, UsageRecord>,
    analytics: HashMap<(TenantId, AnalyticsType, String), i64>,
    collections: HashMap<Uuid, Collection>,
    documents: HashMap<Uuid, StoredDocument>,
    channels: HashMap<Uuid, Channel>,
    events: Vec<RealtimeEvent>,
}

/// Shared in-memory store implementing all driven ports.
#[derive(Clone, Default)]
pub struct InMemoryBackend {
    state: Arc<RwLock<MemoryState>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a project so the admission gateway can resolve it.
    pub async fn seed_project(&self, project: Project) {
        let mut state = self.state.write().await;
        state.projects.insert(project.id, project);
    }

    /// Register a raw API key string for a project.
    pub async fn seed_api_key(&self, key: impl Into<String>, record: ApiKeyRecord) {
        let mut state = self.state.write().await;
        state.api_keys.insert(key.into(), record);
    }

    /// Install or replace a tenant's usage row.
    pub async fn seed_usage(&self, record: UsageRecord) {
        let mut state = self.state.write().await;
        state.usage.insert(record.tenant_id, record);
    }

    /// Current usage row, if any.
    pub async fn usage(&self, tenant_id: &TenantId) -> Option<UsageRecord> {
        self.state.read().await.usage.get(tenant_id).cloned()
    }

    /// Running total of one analytics metric.
    pub async fn analytics_total(
        &self,
        tenant_id: &TenantId,
        metric_type: AnalyticsType,
        key: &str,
    ) -> i64 {
        let state = self.state.read().await;
        state
            .analytics
            .get(&(*tenant_id, metric_type, key.to_owned()))
            .copied()
            .unwrap_or(0)
    }

    /// Times an API key has admitted a request.
    pub async fn api_key_usage(&self, key: &str) -> Option<i64> {
        let state = self.state.read().await;
        state.api_keys.get(key).map(|record| record.usage_count)
    }
}

fn adjust(value: i64, delta: i32) -> i64 {
    (value + i64::from(delta)).max(0)
}

#[async_trait]
impl TenantResolver for InMemoryBackend {
    async fn find_project(
        &self,
        reference: &TenantRef,
    ) -> Result<Option<Project>, TenantResolverError> {
        let state = self.state.read().await;
        let project = match reference {
            TenantRef::Id(id) => state.projects.get(id).cloned(),
            TenantRef::Reference(reference) => state
                .projects
                .values()
                .find(|project| &project.reference_id == reference)
                .cloned(),
        };
        Ok(project)
    }

    async fn find_api_key(&self, key: &str) -> Result<Option<ApiKeyRecord>, TenantResolverError> {
        Ok(self.state.read().await.api_keys.get(key).cloned())
    }

    async fn record_api_key_usage(&self, key_id: Uuid) -> Result<(), TenantResolverError> {
        let mut state = self.state.write().await;
        if let Some(record) = state.api_keys.values_mut().find(|record| record.id == key_id) {
            record.usage_count += 1;
        }
        Ok(())
    }
}

#[async_trait]
impl UsageLedger for InMemoryBackend {
    async fn get_usage(&self, tenant_id: &TenantId) -> Result<Option<UsageRecord>, UsageLedgerError> {
        Ok(self.usage(tenant_id).await)
    }

    async fn increment_field(
        &self,
        tenant_id: &TenantId,
        field: UsageField,
        delta: i32,
    ) -> Result<(), UsageLedgerError> {
        let mut state = self.state.write().await;
        let Some(record) = state.usage.get_mut(tenant_id) else {
            return Ok(());
        };
        match field {
            UsageField::ApiCalls => record.api_calls.used = adjust(record.api_calls.used, delta),
            UsageField::AuthUsers => record.auth_users.used = adjust(record.auth_users.used, delta),
            UsageField::Documents => record.documents.used = adjust(record.documents.used, delta),
            UsageField::StorageMb => {
                record.storage.used_mb = (record.storage.used_mb + f64::from(delta)).max(0.0);
            }
            UsageField::Notifications => {
                record.notifications.used = adjust(record.notifications.used, delta);
            }
            UsageField::RealtimeChannels => {
                record.realtime_channels.used = adjust(record.realtime_channels.used, delta);
            }
            UsageField::RealtimeEvents => {
                record.realtime_events.used = adjust(record.realtime_events.used, delta);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl AnalyticsSink for InMemoryBackend {
    async fn track(
        &self,
        tenant_id: &TenantId,
        metric_type: AnalyticsType,
        key: &str,
        delta: i64,
    ) -> Result<(), AnalyticsSinkError> {
        let mut state = self.state.write().await;
        *state
            .analytics
            .entry((*tenant_id, metric_type, key.to_owned()))
            .or_insert(0) += delta;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Allowance;
    use rstest::rstest;

    fn project(reference: &str) -> Project {
        Project {
            id: TenantId::random(),
            reference_id: reference.to_owned(),
            owner_id: Uuid::new_v4(),
            name: reference.to_owned(),
            active: true,
        }
    }

    #[rstest]
    #[tokio::test]
    async fn projects_resolve_by_id_or_reference() {
        let backend = InMemoryBackend::new();
        let acme = project("acme");
        backend.seed_project(acme.clone()).await;

        let by_id = backend
            .find_project(&TenantRef::Id(acme.id))
            .await
            .expect("lookup");
        let by_reference = backend
            .find_project(&TenantRef::Reference("acme".to_owned()))
            .await
            .expect("lookup");
        assert_eq!(by_id, Some(acme.clone()));
        assert_eq!(by_reference, Some(acme));
    }

    #[rstest]
    #[tokio::test]
    async fn counters_are_floored_at_zero() {
        let backend = InMemoryBackend::new();
        let tenant = TenantId::random();
        backend.seed_usage(UsageRecord::unlimited(tenant)).await;

        backend
            .increment_field(&tenant, UsageField::Documents, 2)
            .await
            .expect("increment");
        backend
            .increment_field(&tenant, UsageField::Documents, -5)
            .await
            .expect("decrement");

        let usage = backend.usage(&tenant).await.expect("usage row");
        assert_eq!(usage.documents, Allowance::new(0, -1));
    }

    #[rstest]
    #[tokio::test]
    async fn analytics_accumulate_per_key() {
        let backend = InMemoryBackend::new();
        let tenant = TenantId::random();
        for _ in 0..3 {
            backend
                .track(&tenant, AnalyticsType::DatabaseUsage, "doc_reads", 1)
                .await
                .expect("track");
        }
        assert_eq!(
            backend
                .analytics_total(&tenant, AnalyticsType::DatabaseUsage, "doc_reads")
                .await,
            3
        );
    }

    #[rstest]
    #[tokio::test]
    async fn key_usage_is_counted() {
        let backend = InMemoryBackend::new();
        let acme = project("acme");
        let key_id = Uuid::new_v4();
        backend
            .seed_api_key(
                "pk_test",
                ApiKeyRecord {
                    id: key_id,
                    project_id: acme.id,
                    revoked: false,
                    usage_count: 0,
                },
            )
            .await;

        backend.record_api_key_usage(key_id).await.expect("record");
        assert_eq!(backend.api_key_usage("pk_test").await, Some(1));
    }
}
