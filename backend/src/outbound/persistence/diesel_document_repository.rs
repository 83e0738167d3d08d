//! PostgreSQL-backed `DocumentRepository` implementation.
//!
//! Documents live in one JSONB table shared by every tenant; each statement is
//! scoped by `(project_id, collection_id)`. Writes that must be atomic on the
//! server (merge, increment, create-or-replace) are single SQL statements
//! with bound parameters; reads go through Diesel's query builder with the
//! predicates from [`super::jsonb_filter`].

use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use diesel::sql_query;
use diesel::sql_types::{Bool, Double, Jsonb, Nullable, Text, Uuid as SqlUuid};
use diesel_async::RunQueryDsl;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::domain::ports::{CountFilter, DocumentRepository, DocumentRepositoryError};
use crate::domain::{
    Collection, CollectionName, Document, DocumentId, DocumentQuery, FieldPath, Filter, Payload,
    SortColumn, SortDirection, TenantId, WriteOutcome,
};

use super::diesel_basic_error_mapping::{
    is_unique_violation, map_basic_diesel_error, map_basic_pool_error,
};
use super::jsonb_filter::{DocumentPredicate, filter_predicate, search_predicate};
use super::models::{CollectionRow, DocumentRow, NewCollectionRow, NewDocumentRow, PutDocumentRow};
use super::pool::{DbPool, PoolError};
use super::schema::{collections, documents};

/// Diesel-backed document and collection storage.
#[derive(Clone)]
pub struct DieselDocumentRepository {
    pool: DbPool,
}

impl DieselDocumentRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const PUT_SQL: &str = r#"
WITH prior AS (
    SELECT is_deleted FROM documents WHERE id = $1
)
INSERT INTO documents AS d (id, project_id, collection_id, data, version, etag)
VALUES ($1, $2, $3, $4, 1, $5)
ON CONFLICT (id) DO UPDATE SET
    data = CASE
        WHEN $6 AND NOT d.is_deleted THEN d.data || EXCLUDED.data
        ELSE EXCLUDED.data
    END,
    etag = EXCLUDED.etag,
    version = d.version + 1,
    is_deleted = FALSE,
    updated_at = NOW()
WHERE d.project_id = EXCLUDED.project_id AND d.collection_id = EXCLUDED.collection_id
RETURNING d.id, d.project_id, d.collection_id, d.data, d.version, d.etag,
    d.created_at, d.updated_at,
    NOT EXISTS (SELECT 1 FROM prior WHERE NOT prior.is_deleted) AS inserted
"#;

const MERGE_SQL: &str = r#"
UPDATE documents
SET data = data || $1, etag = $2, version = version + 1, updated_at = NOW()
WHERE id = $3 AND project_id = $4 AND collection_id = $5 AND NOT is_deleted
    AND ($6::text IS NULL OR etag = $6)
RETURNING id, project_id, collection_id, data, version, etag, created_at, updated_at
"#;

const INCREMENT_SQL: &str = r#"
UPDATE documents
SET data = jsonb_set(
        data,
        ARRAY[$1]::text[],
        to_jsonb(
            (CASE WHEN jsonb_typeof(data -> $1) = 'number'
                THEN (data ->> $1)::numeric ELSE 0 END) + ($2::float8)::numeric
        ),
        true
    ),
    etag = $3,
    version = version + 1,
    updated_at = NOW()
WHERE id = $4 AND project_id = $5 AND collection_id = $6 AND NOT is_deleted
RETURNING id, project_id, collection_id, data, version, etag, created_at, updated_at
"#;

fn map_pool_error(error: PoolError) -> DocumentRepositoryError {
    map_basic_pool_error(error, DocumentRepositoryError::connection)
}

fn map_diesel_error(error: diesel::result::Error) -> DocumentRepositoryError {
    map_basic_diesel_error(
        error,
        DocumentRepositoryError::query,
        DocumentRepositoryError::connection,
    )
}

fn row_to_collection(row: CollectionRow) -> Result<Collection, DocumentRepositoryError> {
    let name = CollectionName::new(row.name).map_err(|err| {
        DocumentRepositoryError::query(format!("invalid collection name in database: {err}"))
    })?;
    Ok(Collection {
        id: row.id,
        project_id: TenantId::from_uuid(row.project_id),
        name,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

fn row_to_document(row: DocumentRow) -> Result<Document, DocumentRepositoryError> {
    let Value::Object(data) = row.data else {
        return Err(DocumentRepositoryError::query(format!(
            "document {} payload is not an object",
            row.id
        )));
    };
    Ok(Document {
        id: DocumentId::from_uuid(row.id),
        collection_id: row.collection_id,
        project_id: TenantId::from_uuid(row.project_id),
        data,
        version: row.version,
        etag: row.etag,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

fn rows_to_documents(rows: Vec<DocumentRow>) -> Result<Vec<Document>, DocumentRepositoryError> {
    rows.into_iter().map(row_to_document).collect()
}

/// Tenant, collection and liveness scope plus caller filters.
fn predicates(
    collection: &Collection,
    filters: &[Filter],
    search: Option<&str>,
) -> Vec<DocumentPredicate> {
    let mut predicates: Vec<DocumentPredicate> = vec![
        Box::new(documents::project_id.eq(*collection.project_id.as_uuid())),
        Box::new(documents::collection_id.eq(collection.id)),
        Box::new(documents::is_deleted.eq(false)),
    ];
    predicates.extend(filters.iter().map(filter_predicate));
    predicates.extend(search.map(search_predicate));
    predicates
}

fn payload_value(data: &Payload) -> Value {
    Value::Object(data.clone())
}

#[async_trait]
impl DocumentRepository for DieselDocumentRepository {
    async fn find_collection(
        &self,
        tenant_id: &TenantId,
        name: &CollectionName,
    ) -> Result<Option<Collection>, DocumentRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row = collections::table
            .filter(collections::project_id.eq(tenant_id.as_uuid()))
            .filter(collections::name.eq(name.as_ref()))
            .select(CollectionRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        row.map(row_to_collection).transpose()
    }

    async fn ensure_collection(
        &self,
        tenant_id: &TenantId,
        name: &CollectionName,
    ) -> Result<Collection, DocumentRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let new_row = NewCollectionRow {
            project_id: *tenant_id.as_uuid(),
            name: name.as_ref(),
        };
        let created = diesel::insert_into(collections::table)
            .values(&new_row)
            .on_conflict((collections::project_id, collections::name))
            .do_nothing()
            .returning(CollectionRow::as_returning())
            .get_result(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        if let Some(row) = created {
            debug!(%tenant_id, collection = %name, "collection created");
            return row_to_collection(row);
        }

        // Lost the race or it already existed; the row is committed either way.
        let row = collections::table
            .filter(collections::project_id.eq(tenant_id.as_uuid()))
            .filter(collections::name.eq(name.as_ref()))
            .select(CollectionRow::as_select())
            .first(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        row_to_collection(row)
    }

    async fn list_collections(
        &self,
        tenant_id: &TenantId,
    ) -> Result<Vec<Collection>, DocumentRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let rows: Vec<CollectionRow> = collections::table
            .filter(collections::project_id.eq(tenant_id.as_uuid()))
            .select(CollectionRow::as_select())
            .order_by(collections::name)
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        rows.into_iter().map(row_to_collection).collect()
    }

    async fn rename_collection(
        &self,
        tenant_id: &TenantId,
        name: &CollectionName,
        new_name: &CollectionName,
    ) -> Result<Option<Collection>, DocumentRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let renamed = diesel::update(
            collections::table
                .filter(collections::project_id.eq(tenant_id.as_uuid()))
                .filter(collections::name.eq(name.as_ref())),
        )
        .set((
            collections::name.eq(new_name.as_ref()),
            collections::updated_at.eq(Utc::now()),
        ))
        .returning(CollectionRow::as_returning())
        .get_result(&mut conn)
        .await
        .optional();

        match renamed {
            Ok(row) => row.map(row_to_collection).transpose(),
            Err(err) if is_unique_violation(&err) => Err(
                DocumentRepositoryError::collection_name_taken(new_name.as_ref()),
            ),
            Err(err) => Err(map_diesel_error(err)),
        }
    }

    async fn delete_collection(
        &self,
        tenant_id: &TenantId,
        name: &CollectionName,
    ) -> Result<bool, DocumentRepositoryError> {
        use diesel_async::AsyncConnection as _;
        use diesel_async::scoped_futures::ScopedFutureExt as _;

        let tenant = *tenant_id.as_uuid();
        let name = name.as_ref().to_owned();
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        // Member documents are soft-deleted in the same transaction that
        // removes the collection row, so no live orphan is ever visible.
        let outcome = conn
            .transaction::<_, diesel::result::Error, _>(|conn| {
                async move {
                    let collection_id: Option<Uuid> = collections::table
                        .filter(collections::project_id.eq(tenant))
                        .filter(collections::name.eq(&name))
                        .select(collections::id)
                        .for_update()
                        .first(conn)
                        .await
                        .optional()?;
                    let Some(collection_id) = collection_id else {
                        return Ok(None);
                    };

                    let soft_deleted = diesel::update(
                        documents::table
                            .filter(documents::project_id.eq(tenant))
                            .filter(documents::collection_id.eq(collection_id))
                            .filter(documents::is_deleted.eq(false)),
                    )
                    .set((
                        documents::is_deleted.eq(true),
                        documents::updated_at.eq(Utc::now()),
                    ))
                    .execute(conn)
                    .await?;

                    diesel::delete(collections::table.filter(collections::id.eq(collection_id)))
                        .execute(conn)
                        .await?;
                    Ok(Some(soft_deleted))
                }
                .scope_boxed()
            })
            .await
            .map_err(map_diesel_error)?;

        match outcome {
            Some(soft_deleted) => {
                debug!(%tenant_id, soft_deleted, "collection deleted");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn insert(
        &self,
        collection: &Collection,
        id: DocumentId,
        data: &Payload,
    ) -> Result<Option<Document>, DocumentRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let data = payload_value(data);
        let etag = Document::fresh_etag();
        let new_row = NewDocumentRow {
            id: *id.as_uuid(),
            project_id: *collection.project_id.as_uuid(),
            collection_id: collection.id,
            data: &data,
            version: 1,
            etag: &etag,
        };
        let row = diesel::insert_into(documents::table)
            .values(&new_row)
            .on_conflict(documents::id)
            .do_nothing()
            .returning(DocumentRow::as_returning())
            .get_result(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        row.map(row_to_document).transpose()
    }

    async fn find(
        &self,
        collection: &Collection,
        id: DocumentId,
    ) -> Result<Option<Document>, DocumentRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row = documents::table
            .filter(documents::id.eq(id.as_uuid()))
            .filter(documents::project_id.eq(collection.project_id.as_uuid()))
            .filter(documents::collection_id.eq(collection.id))
            .filter(documents::is_deleted.eq(false))
            .select(DocumentRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        row.map(row_to_document).transpose()
    }

    async fn put(
        &self,
        collection: &Collection,
        id: DocumentId,
        data: &Payload,
        merge: bool,
    ) -> Result<WriteOutcome, DocumentRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: Option<PutDocumentRow> = sql_query(PUT_SQL)
            .bind::<SqlUuid, _>(*id.as_uuid())
            .bind::<SqlUuid, _>(*collection.project_id.as_uuid())
            .bind::<SqlUuid, _>(collection.id)
            .bind::<Jsonb, _>(payload_value(data))
            .bind::<Text, _>(Document::fresh_etag())
            .bind::<Bool, _>(merge)
            .get_result(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;

        let Some(row) = row else {
            return Err(DocumentRepositoryError::id_taken(id.to_string()));
        };
        Ok(WriteOutcome {
            document: row_to_document(row.document)?,
            inserted: row.inserted,
        })
    }

    async fn merge(
        &self,
        collection: &Collection,
        id: DocumentId,
        patch: &Payload,
        expected_etag: Option<String>,
    ) -> Result<Option<Document>, DocumentRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: Option<DocumentRow> = sql_query(MERGE_SQL)
            .bind::<Jsonb, _>(payload_value(patch))
            .bind::<Text, _>(Document::fresh_etag())
            .bind::<SqlUuid, _>(*id.as_uuid())
            .bind::<SqlUuid, _>(*collection.project_id.as_uuid())
            .bind::<SqlUuid, _>(collection.id)
            .bind::<Nullable<Text>, _>(expected_etag)
            .get_result(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        row.map(row_to_document).transpose()
    }

    async fn increment(
        &self,
        collection: &Collection,
        id: DocumentId,
        field: &FieldPath,
        amount: f64,
    ) -> Result<Option<Document>, DocumentRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: Option<DocumentRow> = sql_query(INCREMENT_SQL)
            .bind::<Text, _>(field.as_ref())
            .bind::<Double, _>(amount)
            .bind::<Text, _>(Document::fresh_etag())
            .bind::<SqlUuid, _>(*id.as_uuid())
            .bind::<SqlUuid, _>(*collection.project_id.as_uuid())
            .bind::<SqlUuid, _>(collection.id)
            .get_result(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        row.map(row_to_document).transpose()
    }

    async fn soft_delete(
        &self,
        collection: &Collection,
        id: DocumentId,
    ) -> Result<bool, DocumentRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let updated = diesel::update(
            documents::table
                .filter(documents::id.eq(id.as_uuid()))
                .filter(documents::project_id.eq(collection.project_id.as_uuid()))
                .filter(documents::collection_id.eq(collection.id))
                .filter(documents::is_deleted.eq(false)),
        )
        .set((
            documents::is_deleted.eq(true),
            documents::etag.eq(Document::fresh_etag()),
            documents::version.eq(documents::version + 1),
            documents::updated_at.eq(Utc::now()),
        ))
        .execute(&mut conn)
        .await
        .map_err(map_diesel_error)?;
        Ok(updated > 0)
    }

    async fn exists(
        &self,
        collection: &Collection,
        id: DocumentId,
    ) -> Result<bool, DocumentRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        diesel::select(diesel::dsl::exists(
            documents::table
                .filter(documents::id.eq(id.as_uuid()))
                .filter(documents::project_id.eq(collection.project_id.as_uuid()))
                .filter(documents::collection_id.eq(collection.id))
                .filter(documents::is_deleted.eq(false)),
        ))
        .get_result(&mut conn)
        .await
        .map_err(map_diesel_error)
    }

    async fn query(
        &self,
        collection: &Collection,
        query: &DocumentQuery,
    ) -> Result<Vec<Document>, DocumentRepositoryError> {
        let mut statement = documents::table
            .select(DocumentRow::as_select())
            .into_boxed();
        for predicate in predicates(collection, &query.filters, query.search.as_deref()) {
            statement = statement.filter(predicate);
        }
        statement = match (query.order_by.column, query.order_by.direction) {
            (SortColumn::CreatedAt, SortDirection::Asc) => {
                statement.order_by((documents::created_at.asc(), documents::id.asc()))
            }
            (SortColumn::CreatedAt, SortDirection::Desc) => {
                statement.order_by((documents::created_at.desc(), documents::id.desc()))
            }
            (SortColumn::UpdatedAt, SortDirection::Asc) => {
                statement.order_by((documents::updated_at.asc(), documents::id.asc()))
            }
            (SortColumn::UpdatedAt, SortDirection::Desc) => {
                statement.order_by((documents::updated_at.desc(), documents::id.desc()))
            }
            (SortColumn::Version, SortDirection::Asc) => {
                statement.order_by((documents::version.asc(), documents::id.asc()))
            }
            (SortColumn::Version, SortDirection::Desc) => {
                statement.order_by((documents::version.desc(), documents::id.desc()))
            }
        };

        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let rows: Vec<DocumentRow> = statement
            .limit(query.limit)
            .offset(query.offset)
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        rows_to_documents(rows)
    }

    async fn count(
        &self,
        collection: &Collection,
        filter: &CountFilter,
    ) -> Result<i64, DocumentRepositoryError> {
        let mut statement = documents::table.count().into_boxed();
        for predicate in predicates(collection, &filter.filters, filter.search.as_deref()) {
            statement = statement.filter(predicate);
        }
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        statement
            .get_result(&mut conn)
            .await
            .map_err(map_diesel_error)
    }
}
