//! Driving port for the document store.
//!
//! Every call is scoped to a tenant that the admission gateway has already
//! resolved. Implementations map adapter failures onto [`Error`].

use async_trait::async_trait;

use crate::domain::{
    Collection, CollectionName, Document, DocumentId, DocumentQuery, Error, FieldPath, Payload,
    TenantId, WriteOutcome,
};

use super::CountFilter;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Store a new document, creating the collection if needed.
    async fn create(
        &self,
        tenant_id: TenantId,
        collection: CollectionName,
        id: Option<DocumentId>,
        data: Payload,
    ) -> Result<Document, Error>;

    async fn get(
        &self,
        tenant_id: TenantId,
        collection: CollectionName,
        id: DocumentId,
    ) -> Result<Document, Error>;

    /// Replace, or shallow-merge when `merge` is set.
    async fn set(
        &self,
        tenant_id: TenantId,
        collection: CollectionName,
        id: DocumentId,
        data: Payload,
        merge: bool,
    ) -> Result<WriteOutcome, Error>;

    /// Shallow-merge `patch`. A non-empty `expected_etag` makes the write
    /// conditional; an empty or absent one means last writer wins.
    async fn update(
        &self,
        tenant_id: TenantId,
        collection: CollectionName,
        id: DocumentId,
        patch: Payload,
        expected_etag: Option<String>,
    ) -> Result<Document, Error>;

    async fn upsert(
        &self,
        tenant_id: TenantId,
        collection: CollectionName,
        id: DocumentId,
        data: Payload,
    ) -> Result<WriteOutcome, Error>;

    async fn delete(
        &self,
        tenant_id: TenantId,
        collection: CollectionName,
        id: DocumentId,
    ) -> Result<(), Error>;

    async fn exists(
        &self,
        tenant_id: TenantId,
        collection: CollectionName,
        id: DocumentId,
    ) -> Result<bool, Error>;

    async fn query(
        &self,
        tenant_id: TenantId,
        collection: CollectionName,
        query: DocumentQuery,
    ) -> Result<Vec<Document>, Error>;

    async fn count(
        &self,
        tenant_id: TenantId,
        collection: CollectionName,
        filter: CountFilter,
    ) -> Result<i64, Error>;

    async fn increment(
        &self,
        tenant_id: TenantId,
        collection: CollectionName,
        id: DocumentId,
        field: FieldPath,
        amount: f64,
    ) -> Result<Document, Error>;

    async fn list_collections(&self, tenant_id: TenantId) -> Result<Vec<Collection>, Error>;

    /// Get-or-create a collection by name.
    async fn create_collection(
        &self,
        tenant_id: TenantId,
        name: CollectionName,
    ) -> Result<Collection, Error>;

    async fn rename_collection(
        &self,
        tenant_id: TenantId,
        name: CollectionName,
        new_name: CollectionName,
    ) -> Result<Collection, Error>;

    /// Cascading soft delete of member documents, then the collection.
    async fn delete_collection(
        &self,
        tenant_id: TenantId,
        name: CollectionName,
    ) -> Result<(), Error>;
}
