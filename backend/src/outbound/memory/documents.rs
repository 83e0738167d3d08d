//! Document and collection storage for [`InMemoryBackend`].

use std::cmp::Ordering;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Number, Value};
use uuid::Uuid;

use crate::domain::ports::{CountFilter, DocumentRepository, DocumentRepositoryError};
use crate::domain::{
    Collection, CollectionName, Document, DocumentId, DocumentQuery, FieldPath, Filter, Payload,
    SortColumn, SortDirection, TenantId, WriteOutcome, search_matches,
};

use super::{InMemoryBackend, MemoryState, StoredDocument};

impl MemoryState {
    fn collection_named(&self, tenant_id: &TenantId, name: &CollectionName) -> Option<&Collection> {
        self.collections
            .values()
            .find(|collection| collection.project_id == *tenant_id && collection.name == *name)
    }

    fn live_document(&self, collection: &Collection, id: DocumentId) -> Option<&StoredDocument> {
        self.documents
            .get(id.as_uuid())
            .filter(|stored| in_scope(stored, collection) && !stored.deleted)
    }

    fn live_document_mut(
        &mut self,
        collection: &Collection,
        id: DocumentId,
    ) -> Option<&mut StoredDocument> {
        self.documents
            .get_mut(id.as_uuid())
            .filter(|stored| in_scope(stored, collection) && !stored.deleted)
    }

    fn matching<'a>(
        &'a self,
        collection: &'a Collection,
        filters: &'a [Filter],
        search: Option<&'a str>,
    ) -> impl Iterator<Item = &'a Document> + 'a {
        self.documents
            .values()
            .filter(move |stored| in_scope(stored, collection) && !stored.deleted)
            .map(|stored| &stored.document)
            .filter(move |document| filters.iter().all(|filter| filter.matches(&document.data)))
            .filter(move |document| search.is_none_or(|needle| search_matches(&document.data, needle)))
    }
}

fn in_scope(stored: &StoredDocument, collection: &Collection) -> bool {
    stored.document.project_id == collection.project_id
        && stored.document.collection_id == collection.id
}

fn new_document(collection: &Collection, id: DocumentId, data: Payload) -> Document {
    let now = Utc::now();
    Document {
        id,
        collection_id: collection.id,
        project_id: collection.project_id,
        data,
        version: 1,
        etag: Document::fresh_etag(),
        created_at: now,
        updated_at: now,
    }
}

fn bump(document: &mut Document) {
    document.version += 1;
    document.etag = Document::fresh_etag();
    document.updated_at = Utc::now();
}

/// JSON number for an incremented value; whole results stay integral.
fn number_value(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() < 9.0e15 {
        return Value::Number(Number::from(value as i64));
    }
    Number::from_f64(value).map_or(Value::Null, Value::Number)
}

fn compare(left: &Document, right: &Document, column: SortColumn) -> Ordering {
    let primary = match column {
        SortColumn::CreatedAt => left.created_at.cmp(&right.created_at),
        SortColumn::UpdatedAt => left.updated_at.cmp(&right.updated_at),
        SortColumn::Version => left.version.cmp(&right.version),
    };
    primary.then_with(|| left.id.as_uuid().cmp(right.id.as_uuid()))
}

#[async_trait]
impl DocumentRepository for InMemoryBackend {
    async fn find_collection(
        &self,
        tenant_id: &TenantId,
        name: &CollectionName,
    ) -> Result<Option<Collection>, DocumentRepositoryError> {
        let state = self.state.read().await;
        Ok(state.collection_named(tenant_id, name).cloned())
    }

    async fn ensure_collection(
        &self,
        tenant_id: &TenantId,
        name: &CollectionName,
    ) -> Result<Collection, DocumentRepositoryError> {
        let mut state = self.state.write().await;
        if let Some(existing) = state.collection_named(tenant_id, name) {
            return Ok(existing.clone());
        }
        let now = Utc::now();
        let collection = Collection {
            id: Uuid::new_v4(),
            project_id: *tenant_id,
            name: name.clone(),
            created_at: now,
            updated_at: now,
        };
        state.collections.insert(collection.id, collection.clone());
        Ok(collection)
    }

    async fn list_collections(
        &self,
        tenant_id: &TenantId,
    ) -> Result<Vec<Collection>, DocumentRepositoryError> {
        let state = self.state.read().await;
        let mut collections: Vec<Collection> = state
            .collections
            .values()
            .filter(|collection| collection.project_id == *tenant_id)
            .cloned()
            .collect();
        collections.sort_by(|left, right| left.name.as_ref().cmp(right.name.as_ref()));
        Ok(collections)
    }

    async fn rename_collection(
        &self,
        tenant_id: &TenantId,
        name: &CollectionName,
        new_name: &CollectionName,
    ) -> Result<Option<Collection>, DocumentRepositoryError> {
        let mut state = self.state.write().await;
        let Some(id) = state.collection_named(tenant_id, name).map(|found| found.id) else {
            return Ok(None);
        };
        if state
            .collection_named(tenant_id, new_name)
            .is_some_and(|other| other.id != id)
        {
            return Err(DocumentRepositoryError::collection_name_taken(new_name.as_ref()));
        }
        let Some(collection) = state.collections.get_mut(&id) else {
            return Ok(None);
        };
        collection.name = new_name.clone();
        collection.updated_at = Utc::now();
        Ok(Some(collection.clone()))
    }

    async fn delete_collection(
        &self,
        tenant_id: &TenantId,
        name: &CollectionName,
    ) -> Result<bool, DocumentRepositoryError> {
        let mut state = self.state.write().await;
        let Some(collection) = state.collection_named(tenant_id, name).cloned() else {
            return Ok(false);
        };
        for stored in state.documents.values_mut() {
            if in_scope(stored, &collection) && !stored.deleted {
                stored.deleted = true;
                bump(&mut stored.document);
            }
        }
        state.collections.remove(&collection.id);
        Ok(true)
    }

    async fn insert(
        &self,
        collection: &Collection,
        id: DocumentId,
        data: &Payload,
    ) -> Result<Option<Document>, DocumentRepositoryError> {
        let mut state = self.state.write().await;
        if state.documents.contains_key(id.as_uuid()) {
            return Ok(None);
        }
        let document = new_document(collection, id, data.clone());
        state.documents.insert(
            *id.as_uuid(),
            StoredDocument {
                document: document.clone(),
                deleted: false,
            },
        );
        Ok(Some(document))
    }

    async fn find(
        &self,
        collection: &Collection,
        id: DocumentId,
    ) -> Result<Option<Document>, DocumentRepositoryError> {
        let state = self.state.read().await;
        Ok(state
            .live_document(collection, id)
            .map(|stored| stored.document.clone()))
    }

    async fn put(
        &self,
        collection: &Collection,
        id: DocumentId,
        data: &Payload,
        merge: bool,
    ) -> Result<WriteOutcome, DocumentRepositoryError> {
        let mut state = self.state.write().await;
        let Some(stored) = state.documents.get_mut(id.as_uuid()) else {
            let document = new_document(collection, id, data.clone());
            state.documents.insert(
                *id.as_uuid(),
                StoredDocument {
                    document: document.clone(),
                    deleted: false,
                },
            );
            return Ok(WriteOutcome {
                document,
                inserted: true,
            });
        };
        if !in_scope(stored, collection) {
            return Err(DocumentRepositoryError::id_taken(id.to_string()));
        }
        let inserted = stored.deleted;
        if merge && !stored.deleted {
            stored
                .document
                .data
                .extend(data.iter().map(|(key, value)| (key.clone(), value.clone())));
        } else {
            stored.document.data = data.clone();
        }
        stored.deleted = false;
        bump(&mut stored.document);
        Ok(WriteOutcome {
            document: stored.document.clone(),
            inserted,
        })
    }

    async fn merge(
        &self,
        collection: &Collection,
        id: DocumentId,
        patch: &Payload,
        expected_etag: Option<String>,
    ) -> Result<Option<Document>, DocumentRepositoryError> {
        let mut state = self.state.write().await;
        let Some(stored) = state.live_document_mut(collection, id) else {
            return Ok(None);
        };
        if expected_etag.is_some_and(|etag| etag != stored.document.etag) {
            return Ok(None);
        }
        stored
            .document
            .data
            .extend(patch.iter().map(|(key, value)| (key.clone(), value.clone())));
        bump(&mut stored.document);
        Ok(Some(stored.document.clone()))
    }

    async fn increment(
        &self,
        collection: &Collection,
        id: DocumentId,
        field: &FieldPath,
        amount: f64,
    ) -> Result<Option<Document>, DocumentRepositoryError> {
        let mut state = self.state.write().await;
        let Some(stored) = state.live_document_mut(collection, id) else {
            return Ok(None);
        };
        let current = stored
            .document
            .data
            .get(field.as_ref())
            .and_then(Value::as_f64)
            .unwrap_or(0.0);
        stored
            .document
            .data
            .insert(field.as_ref().to_owned(), number_value(current + amount));
        bump(&mut stored.document);
        Ok(Some(stored.document.clone()))
    }

    async fn soft_delete(
        &self,
        collection: &Collection,
        id: DocumentId,
    ) -> Result<bool, DocumentRepositoryError> {
        let mut state = self.state.write().await;
        let Some(stored) = state.live_document_mut(collection, id) else {
            return Ok(false);
        };
        stored.deleted = true;
        bump(&mut stored.document);
        Ok(true)
    }

    async fn exists(
        &self,
        collection: &Collection,
        id: DocumentId,
    ) -> Result<bool, DocumentRepositoryError> {
        let state = self.state.read().await;
        Ok(state.live_document(collection, id).is_some())
    }

    async fn query(
        &self,
        collection: &Collection,
        query: &DocumentQuery,
    ) -> Result<Vec<Document>, DocumentRepositoryError> {
        let state = self.state.read().await;
        let mut documents: Vec<Document> = state
            .matching(collection, &query.filters, query.search.as_deref())
            .cloned()
            .collect();
        documents.sort_by(|left, right| {
            let ordering = compare(left, right, query.order_by.column);
            match query.order_by.direction {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            }
        });
        let offset = usize::try_from(query.offset).unwrap_or(0);
        let limit = usize::try_from(query.limit).unwrap_or(0);
        Ok(documents.into_iter().skip(offset).take(limit).collect())
    }

    async fn count(
        &self,
        collection: &Collection,
        filter: &CountFilter,
    ) -> Result<i64, DocumentRepositoryError> {
        let state = self.state.read().await;
        let total = state
            .matching(collection, &filter.filters, filter.search.as_deref())
            .count();
        Ok(i64::try_from(total).unwrap_or(i64::MAX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FilterOp, OrderBy};
    use rstest::{fixture, rstest};
    use serde_json::json;

    fn payload(value: Value) -> Payload {
        value.as_object().cloned().expect("object payload")
    }

    fn name(raw: &str) -> CollectionName {
        CollectionName::new(raw).expect("valid collection name")
    }

    #[fixture]
    fn backend() -> InMemoryBackend {
        InMemoryBackend::new()
    }

    async fn notes(backend: &InMemoryBackend, tenant: &TenantId) -> Collection {
        backend
            .ensure_collection(tenant, &name("notes"))
            .await
            .expect("collection")
    }

    #[rstest]
    #[tokio::test]
    async fn ensure_collection_is_idempotent(backend: InMemoryBackend) {
        let tenant = TenantId::random();
        let first = notes(&backend, &tenant).await;
        let second = notes(&backend, &tenant).await;
        assert_eq!(first.id, second.id);

        let other = notes(&backend, &TenantId::random()).await;
        assert_ne!(first.id, other.id);
    }

    #[rstest]
    #[tokio::test]
    async fn put_reports_insert_then_update(backend: InMemoryBackend) {
        let tenant = TenantId::random();
        let collection = notes(&backend, &tenant).await;
        let id = DocumentId::random();

        let created = backend
            .put(&collection, id, &payload(json!({"a": 1})), false)
            .await
            .expect("put");
        let merged = backend
            .put(&collection, id, &payload(json!({"b": 2})), true)
            .await
            .expect("put");

        assert!(created.inserted);
        assert!(!merged.inserted);
        assert_eq!(merged.document.version, 2);
        assert_eq!(merged.document.data, payload(json!({"a": 1, "b": 2})));
        assert_ne!(created.document.etag, merged.document.etag);
    }

    #[rstest]
    #[tokio::test]
    async fn put_refuses_ids_owned_by_another_collection(backend: InMemoryBackend) {
        let tenant = TenantId::random();
        let collection = notes(&backend, &tenant).await;
        let other = backend
            .ensure_collection(&tenant, &name("tasks"))
            .await
            .expect("collection");
        let id = DocumentId::random();
        backend
            .insert(&collection, id, &payload(json!({})))
            .await
            .expect("insert");

        let err = backend
            .put(&other, id, &payload(json!({})), false)
            .await
            .expect_err("id is taken");
        assert!(matches!(err, DocumentRepositoryError::IdTaken { .. }));
    }

    #[rstest]
    #[tokio::test]
    async fn stale_etags_do_not_merge(backend: InMemoryBackend) {
        let tenant = TenantId::random();
        let collection = notes(&backend, &tenant).await;
        let id = DocumentId::random();
        let created = backend
            .insert(&collection, id, &payload(json!({"n": 1})))
            .await
            .expect("insert")
            .expect("new document");

        let stale = backend
            .merge(&collection, id, &payload(json!({"n": 2})), Some("old".to_owned()))
            .await
            .expect("merge");
        let fresh = backend
            .merge(&collection, id, &payload(json!({"n": 3})), Some(created.etag))
            .await
            .expect("merge");

        assert!(stale.is_none());
        assert_eq!(fresh.expect("merged").data, payload(json!({"n": 3})));
    }

    #[rstest]
    #[tokio::test]
    async fn increment_treats_non_numbers_as_zero(backend: InMemoryBackend) {
        let tenant = TenantId::random();
        let collection = notes(&backend, &tenant).await;
        let id = DocumentId::random();
        backend
            .insert(&collection, id, &payload(json!({"views": "many"})))
            .await
            .expect("insert");

        let field = FieldPath::new("views").expect("field");
        let updated = backend
            .increment(&collection, id, &field, 2.0)
            .await
            .expect("increment")
            .expect("document");
        assert_eq!(updated.data.get("views"), Some(&json!(2)));
    }

    #[rstest]
    #[tokio::test]
    async fn deleted_documents_vanish_from_reads(backend: InMemoryBackend) {
        let tenant = TenantId::random();
        let collection = notes(&backend, &tenant).await;
        let id = DocumentId::random();
        backend
            .insert(&collection, id, &payload(json!({"n": 1})))
            .await
            .expect("insert");

        assert!(backend.soft_delete(&collection, id).await.expect("delete"));
        assert!(!backend.exists(&collection, id).await.expect("exists"));
        assert!(!backend.soft_delete(&collection, id).await.expect("delete"));
        let count = backend
            .count(&collection, &CountFilter::default())
            .await
            .expect("count");
        assert_eq!(count, 0);
    }

    #[rstest]
    #[tokio::test]
    async fn queries_filter_order_and_page(backend: InMemoryBackend) {
        let tenant = TenantId::random();
        let collection = notes(&backend, &tenant).await;
        for views in [5, 20, 12, 40] {
            backend
                .insert(&collection, DocumentId::random(), &payload(json!({"views": views})))
                .await
                .expect("insert");
        }
        for _ in 0..2 {
            let id = DocumentId::random();
            backend
                .insert(&collection, id, &payload(json!({"views": 99})))
                .await
                .expect("insert");
            backend
                .increment(&collection, id, &FieldPath::new("views").expect("field"), 1.0)
                .await
                .expect("increment");
        }

        let filter = Filter::new(FieldPath::new("views").expect("field"), FilterOp::Gte, json!(12))
            .expect("filter");
        let query = DocumentQuery::new(vec![filter], Some(3), Some(0))
            .expect("query")
            .with_order_by("version DESC".parse::<OrderBy>().expect("order"));
        let page = backend.query(&collection, &query).await.expect("query");

        assert_eq!(page.len(), 3);
        assert!(page[..2].iter().all(|doc| doc.version == 2));
        assert_eq!(page[2].version, 1);
    }
}
