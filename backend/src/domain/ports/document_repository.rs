//! Port for collection and document persistence.
//!
//! Every mutating method is expected to execute as a single statement (or a
//! single transaction for collection deletion) so concurrent writers never
//! lose updates to one another. Each successful document write must produce a
//! fresh `etag` and bump `version` by one.

use async_trait::async_trait;

use crate::domain::{
    Collection, CollectionName, Document, DocumentId, DocumentQuery, FieldPath, Filter, Payload,
    TenantId, WriteOutcome,
};

use super::define_port_error;

define_port_error! {
    /// Errors raised by document repository adapters.
    pub enum DocumentRepositoryError {
        /// Backing store could not be reached.
        Connection { message: String } =>
            "document repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } =>
            "document repository query failed: {message}",
        /// A collection with the requested name already exists.
        CollectionNameTaken { name: String } =>
            "collection '{name}' already exists",
        /// The id is already used by a live document in another collection.
        IdTaken { id: String } =>
            "document id {id} is already in use",
    }
}

/// Predicate over a collection without paging or ordering.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CountFilter {
    pub filters: Vec<Filter>,
    pub search: Option<String>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DocumentRepository: Send + Sync {
    /// Look up a collection by name inside one tenant.
    async fn find_collection(
        &self,
        tenant_id: &TenantId,
        name: &CollectionName,
    ) -> Result<Option<Collection>, DocumentRepositoryError>;

    /// Return the named collection, creating it when absent.
    async fn ensure_collection(
        &self,
        tenant_id: &TenantId,
        name: &CollectionName,
    ) -> Result<Collection, DocumentRepositoryError>;

    async fn list_collections(
        &self,
        tenant_id: &TenantId,
    ) -> Result<Vec<Collection>, DocumentRepositoryError>;

    /// Change a collection's display name. `None` when it does not exist.
    async fn rename_collection(
        &self,
        tenant_id: &TenantId,
        name: &CollectionName,
        new_name: &CollectionName,
    ) -> Result<Option<Collection>, DocumentRepositoryError>;

    /// Soft-delete every member document, then remove the collection row,
    /// inside one transaction. Returns `false` when nothing matched.
    async fn delete_collection(
        &self,
        tenant_id: &TenantId,
        name: &CollectionName,
    ) -> Result<bool, DocumentRepositoryError>;

    /// Insert a new document at version 1. `None` when the id is taken.
    async fn insert(
        &self,
        collection: &Collection,
        id: DocumentId,
        data: &Payload,
    ) -> Result<Option<Document>, DocumentRepositoryError>;

    /// Fetch a live (not soft-deleted) document.
    async fn find(
        &self,
        collection: &Collection,
        id: DocumentId,
    ) -> Result<Option<Document>, DocumentRepositoryError>;

    /// Create or overwrite in one statement.
    ///
    /// With `merge` the payload is shallow-merged into a live document's
    /// existing data; otherwise it replaces it. A soft-deleted document is
    /// revived with exactly `data`.
    async fn put(
        &self,
        collection: &Collection,
        id: DocumentId,
        data: &Payload,
        merge: bool,
    ) -> Result<WriteOutcome, DocumentRepositoryError>;

    /// Shallow-merge `patch` into a live document.
    ///
    /// When `expected_etag` is `Some`, the write only applies if the current
    /// token matches. `None` means no row was updated.
    async fn merge(
        &self,
        collection: &Collection,
        id: DocumentId,
        patch: &Payload,
        expected_etag: Option<String>,
    ) -> Result<Option<Document>, DocumentRepositoryError>;

    /// Add `amount` to a numeric field, treating missing or non-numeric
    /// values as zero.
    async fn increment(
        &self,
        collection: &Collection,
        id: DocumentId,
        field: &FieldPath,
        amount: f64,
    ) -> Result<Option<Document>, DocumentRepositoryError>;

    /// Flag a live document as deleted. `false` when nothing matched.
    async fn soft_delete(
        &self,
        collection: &Collection,
        id: DocumentId,
    ) -> Result<bool, DocumentRepositoryError>;

    async fn exists(
        &self,
        collection: &Collection,
        id: DocumentId,
    ) -> Result<bool, DocumentRepositoryError>;

    async fn query(
        &self,
        collection: &Collection,
        query: &DocumentQuery,
    ) -> Result<Vec<Document>, DocumentRepositoryError>;

    async fn count(
        &self,
        collection: &Collection,
        filter: &CountFilter,
    ) -> Result<i64, DocumentRepositoryError>;
}

/// Repository with no collections. Writes fail as if the store were offline.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureDocumentRepository;

fn offline() -> DocumentRepositoryError {
    DocumentRepositoryError::connection("fixture repository has no backing store")
}

#[async_trait]
impl DocumentRepository for FixtureDocumentRepository {
    async fn find_collection(
        &self,
        _tenant_id: &TenantId,
        _name: &CollectionName,
    ) -> Result<Option<Collection>, DocumentRepositoryError> {
        Ok(None)
    }

    async fn ensure_collection(
        &self,
        _tenant_id: &TenantId,
        _name: &CollectionName,
    ) -> Result<Collection, DocumentRepositoryError> {
        Err(offline())
    }

    async fn list_collections(
        &self,
        _tenant_id: &TenantId,
    ) -> Result<Vec<Collection>, DocumentRepositoryError> {
        Ok(Vec::new())
    }

    async fn rename_collection(
        &self,
        _tenant_id: &TenantId,
        _name: &CollectionName,
        _new_name: &CollectionName,
    ) -> Result<Option<Collection>, DocumentRepositoryError> {
        Ok(None)
    }

    async fn delete_collection(
        &self,
        _tenant_id: &TenantId,
        _name: &CollectionName,
    ) -> Result<bool, DocumentRepositoryError> {
        Ok(false)
    }

    async fn insert(
        &self,
        _collection: &Collection,
        _id: DocumentId,
        _data: &Payload,
    ) -> Result<Option<Document>, DocumentRepositoryError> {
        Err(offline())
    }

    async fn find(
        &self,
        _collection: &Collection,
        _id: DocumentId,
    ) -> Result<Option<Document>, DocumentRepositoryError> {
        Ok(None)
    }

    async fn put(
        &self,
        _collection: &Collection,
        _id: DocumentId,
        _data: &Payload,
        _merge: bool,
    ) -> Result<WriteOutcome, DocumentRepositoryError> {
        Err(offline())
    }

    async fn merge(
        &self,
        _collection: &Collection,
        _id: DocumentId,
        _patch: &Payload,
        _expected_etag: Option<String>,
    ) -> Result<Option<Document>, DocumentRepositoryError> {
        Ok(None)
    }

    async fn increment(
        &self,
        _collection: &Collection,
        _id: DocumentId,
        _field: &FieldPath,
        _amount: f64,
    ) -> Result<Option<Document>, DocumentRepositoryError> {
        Ok(None)
    }

    async fn soft_delete(
        &self,
        _collection: &Collection,
        _id: DocumentId,
    ) -> Result<bool, DocumentRepositoryError> {
        Ok(false)
    }

    async fn exists(
        &self,
        _collection: &Collection,
        _id: DocumentId,
    ) -> Result<bool, DocumentRepositoryError> {
        Ok(false)
    }

    async fn query(
        &self,
        _collection: &Collection,
        _query: &DocumentQuery,
    ) -> Result<Vec<Document>, DocumentRepositoryError> {
        Ok(Vec::new())
    }

    async fn count(
        &self,
        _collection: &Collection,
        _filter: &CountFilter,
    ) -> Result<i64, DocumentRepositoryError> {
        Ok(0)
    }
}

