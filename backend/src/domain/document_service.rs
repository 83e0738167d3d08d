//! Document store service implementing the [`DocumentStore`] driving port.
//!
//! The service resolves collections, maps repository outcomes onto domain
//! errors and dispatches analytics and usage side effects. Atomicity of each
//! write is delegated to the repository.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::domain::analytics::metric;
use crate::domain::ports::{
    AnalyticsSink, CountFilter, DocumentRepository, DocumentRepositoryError, DocumentStore,
    UsageLedger,
};
use crate::domain::{
    spawn_detached, AnalyticsType, Collection, CollectionName, Document, DocumentId,
    DocumentQuery, Error, FieldPath, Payload, TenantId, UsageField, WriteOutcome,
};

/// Document store over a repository, a usage ledger and an analytics sink.
#[derive(Clone)]
pub struct DocumentService<R, U, A> {
    repository: Arc<R>,
    usage: Arc<U>,
    analytics: Arc<A>,
}

impl<R, U, A> DocumentService<R, U, A> {
    pub fn new(repository: Arc<R>, usage: Arc<U>, analytics: Arc<A>) -> Self {
        Self {
            repository,
            usage,
            analytics,
        }
    }
}

fn map_repository_error(error: DocumentRepositoryError) -> Error {
    match error {
        DocumentRepositoryError::Connection { message } => {
            Error::service_unavailable(format!("document store unavailable: {message}"))
        }
        DocumentRepositoryError::Query { message } => {
            Error::internal(format!("document store error: {message}"))
        }
        DocumentRepositoryError::CollectionNameTaken { name } => {
            Error::conflict(format!("Collection '{name}' already exists"))
        }
        DocumentRepositoryError::IdTaken { id } => {
            Error::conflict(format!("Document id {id} is already in use"))
        }
    }
}

fn collection_not_found(name: &CollectionName) -> Error {
    Error::not_found(format!("Collection '{name}' not found"))
}

fn document_not_found(id: DocumentId) -> Error {
    Error::not_found(format!("Document {id} not found"))
}

/// Normalise a caller-supplied concurrency token.
///
/// Empty strings and the literal `null` mean "no precondition".
fn precondition(expected_etag: Option<String>) -> Option<String> {
    expected_etag
        .map(|token| token.trim().to_owned())
        .filter(|token| !token.is_empty() && token != "null")
}

impl<R, U, A> DocumentService<R, U, A>
where
    R: DocumentRepository,
    U: UsageLedger + 'static,
    A: AnalyticsSink + 'static,
{
    async fn existing_collection(
        &self,
        tenant_id: &TenantId,
        name: &CollectionName,
    ) -> Result<Option<Collection>, Error> {
        self.repository
            .find_collection(tenant_id, name)
            .await
            .map_err(map_repository_error)
    }

    async fn required_collection(
        &self,
        tenant_id: &TenantId,
        name: &CollectionName,
    ) -> Result<Collection, Error> {
        self.existing_collection(tenant_id, name)
            .await?
            .ok_or_else(|| collection_not_found(name))
    }

    async fn ensured_collection(
        &self,
        tenant_id: &TenantId,
        name: &CollectionName,
    ) -> Result<Collection, Error> {
        self.repository
            .ensure_collection(tenant_id, name)
            .await
            .map_err(map_repository_error)
    }

    fn track(&self, tenant_id: TenantId, key: &'static str) {
        let analytics = Arc::clone(&self.analytics);
        spawn_detached("document_analytics", async move {
            if let Err(error) = analytics
                .track(&tenant_id, AnalyticsType::DatabaseUsage, key, 1)
                .await
            {
                warn!(%tenant_id, key, %error, "failed to track document metric");
            }
        });
    }

    fn adjust_document_count(&self, tenant_id: TenantId, delta: i32) {
        let usage = Arc::clone(&self.usage);
        spawn_detached("document_usage", async move {
            if let Err(error) = usage
                .increment_field(&tenant_id, UsageField::Documents, delta)
                .await
            {
                warn!(%tenant_id, delta, %error, "failed to adjust document usage");
            }
        });
    }

    fn after_write(&self, tenant_id: TenantId, inserted: bool) {
        self.track(tenant_id, metric::DOC_WRITES);
        if inserted {
            self.adjust_document_count(tenant_id, 1);
        }
    }
}

#[async_trait]
impl<R, U, A> DocumentStore for DocumentService<R, U, A>
where
    R: DocumentRepository,
    U: UsageLedger + 'static,
    A: AnalyticsSink + 'static,
{
    async fn create(
        &self,
        tenant_id: TenantId,
        collection: CollectionName,
        id: Option<DocumentId>,
        data: Payload,
    ) -> Result<Document, Error> {
        let collection = self.ensured_collection(&tenant_id, &collection).await?;
        let id = id.unwrap_or_else(DocumentId::random);
        let document = self
            .repository
            .insert(&collection, id, &data)
            .await
            .map_err(map_repository_error)?
            .ok_or_else(|| Error::conflict(format!("Document {id} already exists")))?;
        debug!(%tenant_id, document_id = %id, collection = %collection.name, "document created");
        self.after_write(tenant_id, true);
        Ok(document)
    }

    async fn get(
        &self,
        tenant_id: TenantId,
        collection: CollectionName,
        id: DocumentId,
    ) -> Result<Document, Error> {
        let collection = self.required_collection(&tenant_id, &collection).await?;
        let document = self
            .repository
            .find(&collection, id)
            .await
            .map_err(map_repository_error)?
            .ok_or_else(|| document_not_found(id))?;
        self.track(tenant_id, metric::DOC_READS);
        Ok(document)
    }

    async fn set(
        &self,
        tenant_id: TenantId,
        collection: CollectionName,
        id: DocumentId,
        data: Payload,
        merge: bool,
    ) -> Result<WriteOutcome, Error> {
        let collection = self.ensured_collection(&tenant_id, &collection).await?;
        let outcome = self
            .repository
            .put(&collection, id, &data, merge)
            .await
            .map_err(map_repository_error)?;
        self.after_write(tenant_id, outcome.inserted);
        Ok(outcome)
    }

    async fn update(
        &self,
        tenant_id: TenantId,
        collection: CollectionName,
        id: DocumentId,
        patch: Payload,
        expected_etag: Option<String>,
    ) -> Result<Document, Error> {
        let collection = self.required_collection(&tenant_id, &collection).await?;
        let expected = precondition(expected_etag);
        let conditional = expected.is_some();
        let updated = self
            .repository
            .merge(&collection, id, &patch, expected)
            .await
            .map_err(map_repository_error)?;
        match updated {
            Some(document) => {
                self.after_write(tenant_id, false);
                Ok(document)
            }
            None if conditional => {
                let current = self
                    .repository
                    .find(&collection, id)
                    .await
                    .map_err(map_repository_error)?;
                match current {
                    Some(current) => Err(Error::conflict("Document was modified by another writer")
                        .with_details(serde_json::json!({ "currentEtag": current.etag }))),
                    None => Err(document_not_found(id)),
                }
            }
            None => Err(document_not_found(id)),
        }
    }

    async fn upsert(
        &self,
        tenant_id: TenantId,
        collection: CollectionName,
        id: DocumentId,
        data: Payload,
    ) -> Result<WriteOutcome, Error> {
        self.set(tenant_id, collection, id, data, false).await
    }

    async fn delete(
        &self,
        tenant_id: TenantId,
        collection: CollectionName,
        id: DocumentId,
    ) -> Result<(), Error> {
        let collection = self.required_collection(&tenant_id, &collection).await?;
        let deleted = self
            .repository
            .soft_delete(&collection, id)
            .await
            .map_err(map_repository_error)?;
        if !deleted {
            return Err(document_not_found(id));
        }
        self.track(tenant_id, metric::DOC_DELETES);
        self.adjust_document_count(tenant_id, -1);
        Ok(())
    }

    async fn exists(
        &self,
        tenant_id: TenantId,
        collection: CollectionName,
        id: DocumentId,
    ) -> Result<bool, Error> {
        let Some(collection) = self.existing_collection(&tenant_id, &collection).await? else {
            return Ok(false);
        };
        self.repository
            .exists(&collection, id)
            .await
            .map_err(map_repository_error)
    }

    async fn query(
        &self,
        tenant_id: TenantId,
        collection: CollectionName,
        query: DocumentQuery,
    ) -> Result<Vec<Document>, Error> {
        let Some(collection) = self.existing_collection(&tenant_id, &collection).await? else {
            return Ok(Vec::new());
        };
        let documents = self
            .repository
            .query(&collection, &query)
            .await
            .map_err(map_repository_error)?;
        self.track(tenant_id, metric::DOC_READS);
        Ok(documents
            .into_iter()
            .map(|document| document.project(&query.select))
            .collect())
    }

    async fn count(
        &self,
        tenant_id: TenantId,
        collection: CollectionName,
        filter: CountFilter,
    ) -> Result<i64, Error> {
        let Some(collection) = self.existing_collection(&tenant_id, &collection).await? else {
            return Ok(0);
        };
        self.repository
            .count(&collection, &filter)
            .await
            .map_err(map_repository_error)
    }

    async fn increment(
        &self,
        tenant_id: TenantId,
        collection: CollectionName,
        id: DocumentId,
        field: FieldPath,
        amount: f64,
    ) -> Result<Document, Error> {
        if !amount.is_finite() {
            return Err(Error::invalid_request("amount must be a finite number"));
        }
        let collection = self.required_collection(&tenant_id, &collection).await?;
        let document = self
            .repository
            .increment(&collection, id, &field, amount)
            .await
            .map_err(map_repository_error)?
            .ok_or_else(|| document_not_found(id))?;
        self.after_write(tenant_id, false);
        Ok(document)
    }

    async fn list_collections(&self, tenant_id: TenantId) -> Result<Vec<Collection>, Error> {
        self.repository
            .list_collections(&tenant_id)
            .await
            .map_err(map_repository_error)
    }

    async fn create_collection(
        &self,
        tenant_id: TenantId,
        name: CollectionName,
    ) -> Result<Collection, Error> {
        self.ensured_collection(&tenant_id, &name).await
    }

    async fn rename_collection(
        &self,
        tenant_id: TenantId,
        name: CollectionName,
        new_name: CollectionName,
    ) -> Result<Collection, Error> {
        self.repository
            .rename_collection(&tenant_id, &name, &new_name)
            .await
            .map_err(map_repository_error)?
            .ok_or_else(|| collection_not_found(&name))
    }

    async fn delete_collection(
        &self,
        tenant_id: TenantId,
        name: CollectionName,
    ) -> Result<(), Error> {
        let deleted = self
            .repository
            .delete_collection(&tenant_id, &name)
            .await
            .map_err(map_repository_error)?;
        if deleted {
            debug!(%tenant_id, collection = %name, "collection deleted");
            Ok(())
        } else {
            Err(collection_not_found(&name))
        }
    }
}

#[cfg(test)]
#[path = "document_service_tests.rs"]
mod tests;
