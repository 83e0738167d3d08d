//! Document store HTTP handlers.
//!
//! ```text
//! POST   /api/v1/projects/{project_id}/db/{collection}
//! GET    /api/v1/projects/{project_id}/db/{collection}
//! POST   /api/v1/projects/{project_id}/db/{collection}/query
//! GET    /api/v1/projects/{project_id}/db/{collection}/count
//! GET    /api/v1/projects/{project_id}/db/{collection}/{id}
//! PATCH  /api/v1/projects/{project_id}/db/{collection}/{id}   (If-Match)
//! PUT    /api/v1/projects/{project_id}/db/{collection}/{id}?merge=true
//! DELETE /api/v1/projects/{project_id}/db/{collection}/{id}
//! ```
//!
//! Register the fixed sub-paths (`query`, `count`, `config`) before the
//! `{id}` routes so they are not captured as document ids;
//! [`super::configure_project_routes`] does this.

use actix_web::http::StatusCode;
use actix_web::{HttpRequest, HttpResponse, delete, get, patch, post, put, web};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::ports::CountFilter;
use crate::domain::{
    Document, DocumentId, DocumentQuery, Error, Filter, Payload, QueryValidationError,
    TenantContext,
};
use crate::inbound::http::ApiResult;
use crate::inbound::http::envelope::{Envelope, ok, with_etag};
use crate::inbound::http::state::HttpState;
use crate::inbound::http::validation::{
    FieldName, if_match, missing_field_error, parse_collection_name, parse_document_id,
    parse_field_path, parse_order_by, parse_select,
};

const COLLECTION: FieldName = FieldName::new("collection");

#[derive(Debug, Deserialize)]
pub struct CollectionPath {
    collection: String,
}

#[derive(Debug, Deserialize)]
pub struct DocumentPath {
    collection: String,
    id: String,
}

/// Optional client-chosen id for `POST /db/{collection}`.
#[derive(Debug, Default, Deserialize)]
pub struct CreateParams {
    id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SetParams {
    #[serde(default)]
    merge: bool,
}

/// Paging and ordering for `GET /db/{collection}`.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    limit: Option<i64>,
    offset: Option<i64>,
    order_by: Option<String>,
    search: Option<String>,
}

/// Body of `POST /db/{collection}/query`. Every member is optional.
#[derive(Debug, Default, Deserialize, Serialize, ToSchema)]
pub struct QueryRequest {
    #[serde(default)]
    pub filters: Vec<Filter>,
    #[serde(default)]
    pub select: Vec<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    /// `created_at`, `updated_at` or `version`, optionally followed by
    /// `ASC` or `DESC`.
    #[schema(example = "created_at DESC")]
    pub order_by: Option<String>,
    pub search: Option<String>,
}

impl QueryRequest {
    fn into_query(self) -> Result<DocumentQuery, Error> {
        let order_by = parse_order_by(self.order_by.as_deref())?;
        let select = parse_select(&self.select)?;
        Ok(DocumentQuery::new(self.filters, self.limit, self.offset)
            .map_err(query_error)?
            .with_select(select)
            .with_order_by(order_by)
            .with_search(self.search))
    }
}

/// Body of `POST /db/{collection}/count`: a bare filter list or an object
/// carrying filters and a search string.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum CountRequest {
    Filters(Vec<Filter>),
    Query {
        #[serde(default)]
        filters: Vec<Filter>,
        search: Option<String>,
    },
}

impl From<CountRequest> for CountFilter {
    fn from(value: CountRequest) -> Self {
        match value {
            CountRequest::Filters(filters) => Self {
                filters,
                search: None,
            },
            CountRequest::Query { filters, search } => Self {
                filters,
                search: search.filter(|text| !text.trim().is_empty()),
            },
        }
    }
}

/// Body of `POST /db/{collection}/{id}/increment`.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct IncrementRequest {
    #[schema(example = "views")]
    pub field: Option<String>,
    #[serde(default = "default_amount")]
    #[schema(example = 1)]
    pub amount: f64,
}

fn default_amount() -> f64 {
    1.0
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CountResponse {
    pub count: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ExistsResponse {
    pub exists: bool,
}

fn query_error(err: QueryValidationError) -> Error {
    Error::invalid_request(err.to_string())
}

/// Decode an optional JSON body; an empty body yields the default.
fn optional_body<T>(body: &[u8]) -> Result<Option<T>, Error>
where
    T: for<'de> Deserialize<'de>,
{
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    serde_json::from_slice(body)
        .map(Some)
        .map_err(|err| Error::invalid_request(format!("Invalid query body: {err}")))
}

fn document_response(status: StatusCode, message: &str, document: Document) -> HttpResponse {
    let etag = document.etag.clone();
    with_etag(Envelope::new(message, document).respond(status), &etag)
}

fn ids(path: &DocumentPath) -> ApiResult<(crate::domain::CollectionName, DocumentId)> {
    Ok((
        parse_collection_name(&path.collection, COLLECTION)?,
        parse_document_id(&path.id)?,
    ))
}

/// Create a document, creating the collection on first use.
#[utoipa::path(
    post,
    path = "/api/v1/projects/{project_id}/db/{collection}",
    params(
        ("project_id" = String, Path, description = "Project UUID or reference id"),
        ("collection" = String, Path, description = "Collection name"),
        ("id" = Option<String>, Query, description = "Client-chosen document UUID")
    ),
    request_body(content = serde_json::Value, description = "JSON object payload"),
    responses(
        (status = 201, description = "Document created", body = Document,
            headers(("ETag" = String, description = "Concurrency token"))),
        (status = 400, description = "Invalid request", body = Error),
        (status = 401, description = "Missing or invalid API key", body = Error),
        (status = 403, description = "Quota exhausted or key mismatch", body = Error),
        (status = 409, description = "Document id already taken", body = Error)
    ),
    tags = ["documents"],
    operation_id = "createDocument"
)]
#[post("/db/{collection}")]
pub async fn create_document(
    state: web::Data<HttpState>,
    tenant: TenantContext,
    path: web::Path<CollectionPath>,
    params: web::Query<CreateParams>,
    payload: web::Json<Payload>,
) -> ApiResult<HttpResponse> {
    let collection = parse_collection_name(&path.collection, COLLECTION)?;
    let id = params.id.as_deref().map(parse_document_id).transpose()?;
    let document = state
        .documents
        .create(tenant.tenant_id(), collection, id, payload.into_inner())
        .await?;
    Ok(document_response(StatusCode::CREATED, "Created", document))
}

/// List documents with query-string paging.
#[utoipa::path(
    get,
    path = "/api/v1/projects/{project_id}/db/{collection}",
    params(
        ("project_id" = String, Path, description = "Project UUID or reference id"),
        ("collection" = String, Path, description = "Collection name"),
        ("limit" = Option<i64>, Query, description = "Page size, 1 to 1000"),
        ("offset" = Option<i64>, Query, description = "Rows to skip"),
        ("order_by" = Option<String>, Query, description = "Sort clause"),
        ("search" = Option<String>, Query, description = "Case-insensitive text search")
    ),
    responses(
        (status = 200, description = "Matching documents", body = [Document]),
        (status = 400, description = "Invalid request", body = Error),
        (status = 404, description = "Collection not found", body = Error)
    ),
    tags = ["documents"],
    operation_id = "listDocuments"
)]
#[get("/db/{collection}")]
pub async fn list_documents(
    state: web::Data<HttpState>,
    tenant: TenantContext,
    path: web::Path<CollectionPath>,
    params: web::Query<ListParams>,
) -> ApiResult<HttpResponse> {
    let collection = parse_collection_name(&path.collection, COLLECTION)?;
    let ListParams {
        limit,
        offset,
        order_by,
        search,
    } = params.into_inner();
    let query = QueryRequest {
        limit,
        offset,
        order_by,
        search,
        ..QueryRequest::default()
    }
    .into_query()?;
    let documents = state
        .documents
        .query(tenant.tenant_id(), collection, query)
        .await?;
    Ok(ok("Success", documents))
}

/// Filtered, projected and ordered query.
#[utoipa::path(
    post,
    path = "/api/v1/projects/{project_id}/db/{collection}/query",
    params(
        ("project_id" = String, Path, description = "Project UUID or reference id"),
        ("collection" = String, Path, description = "Collection name")
    ),
    request_body(content = Option<QueryRequest>, description = "Omit for defaults"),
    responses(
        (status = 200, description = "Matching documents", body = [Document]),
        (status = 400, description = "Invalid filter or order clause", body = Error),
        (status = 404, description = "Collection not found", body = Error)
    ),
    tags = ["documents"],
    operation_id = "queryDocuments"
)]
#[post("/db/{collection}/query")]
pub async fn query_documents(
    state: web::Data<HttpState>,
    tenant: TenantContext,
    path: web::Path<CollectionPath>,
    body: web::Bytes,
) -> ApiResult<HttpResponse> {
    let collection = parse_collection_name(&path.collection, COLLECTION)?;
    let query = optional_body::<QueryRequest>(&body)?
        .unwrap_or_default()
        .into_query()?;
    let documents = state
        .documents
        .query(tenant.tenant_id(), collection, query)
        .await?;
    Ok(ok("Success", documents))
}

async fn count(
    state: web::Data<HttpState>,
    tenant: TenantContext,
    path: web::Path<CollectionPath>,
    filter: CountFilter,
) -> ApiResult<HttpResponse> {
    let collection = parse_collection_name(&path.collection, COLLECTION)?;
    let count = state
        .documents
        .count(tenant.tenant_id(), collection, filter)
        .await?;
    Ok(ok("Success", CountResponse { count }))
}

/// Count live documents, optionally filtered.
#[utoipa::path(
    post,
    path = "/api/v1/projects/{project_id}/db/{collection}/count",
    params(
        ("project_id" = String, Path, description = "Project UUID or reference id"),
        ("collection" = String, Path, description = "Collection name")
    ),
    request_body(content = Option<CountRequest>, description = "Optional filters"),
    responses(
        (status = 200, description = "Document count", body = CountResponse),
        (status = 400, description = "Invalid filter", body = Error)
    ),
    tags = ["documents"],
    operation_id = "countDocuments"
)]
#[post("/db/{collection}/count")]
pub async fn count_documents(
    state: web::Data<HttpState>,
    tenant: TenantContext,
    path: web::Path<CollectionPath>,
    body: web::Bytes,
) -> ApiResult<HttpResponse> {
    let filter = optional_body::<CountRequest>(&body)?
        .map(CountFilter::from)
        .unwrap_or_default();
    count(state, tenant, path, filter).await
}

/// Count every live document in a collection.
#[utoipa::path(
    get,
    path = "/api/v1/projects/{project_id}/db/{collection}/count",
    params(
        ("project_id" = String, Path, description = "Project UUID or reference id"),
        ("collection" = String, Path, description = "Collection name")
    ),
    responses(
        (status = 200, description = "Document count", body = CountResponse)
    ),
    tags = ["documents"],
    operation_id = "countAllDocuments"
)]
#[get("/db/{collection}/count")]
pub async fn count_all_documents(
    state: web::Data<HttpState>,
    tenant: TenantContext,
    path: web::Path<CollectionPath>,
) -> ApiResult<HttpResponse> {
    count(state, tenant, path, CountFilter::default()).await
}

/// Fetch one live document.
#[utoipa::path(
    get,
    path = "/api/v1/projects/{project_id}/db/{collection}/{id}",
    params(
        ("project_id" = String, Path, description = "Project UUID or reference id"),
        ("collection" = String, Path, description = "Collection name"),
        ("id" = String, Path, description = "Document UUID")
    ),
    responses(
        (status = 200, description = "Document", body = Document,
            headers(("ETag" = String, description = "Concurrency token"))),
        (status = 400, description = "Malformed id", body = Error),
        (status = 404, description = "Document not found", body = Error)
    ),
    tags = ["documents"],
    operation_id = "getDocument"
)]
#[get("/db/{collection}/{id}")]
pub async fn get_document(
    state: web::Data<HttpState>,
    tenant: TenantContext,
    path: web::Path<DocumentPath>,
) -> ApiResult<HttpResponse> {
    let (collection, id) = ids(&path)?;
    let document = state
        .documents
        .get(tenant.tenant_id(), collection, id)
        .await?;
    Ok(document_response(StatusCode::OK, "Success", document))
}

/// Shallow-merge a patch. `If-Match` makes the write conditional.
#[utoipa::path(
    patch,
    path = "/api/v1/projects/{project_id}/db/{collection}/{id}",
    params(
        ("project_id" = String, Path, description = "Project UUID or reference id"),
        ("collection" = String, Path, description = "Collection name"),
        ("id" = String, Path, description = "Document UUID"),
        ("If-Match" = Option<String>, Header, description = "Expected concurrency token")
    ),
    request_body(content = serde_json::Value, description = "JSON object payload"),
    responses(
        (status = 200, description = "Updated document", body = Document,
            headers(("ETag" = String, description = "New concurrency token"))),
        (status = 404, description = "Document not found", body = Error),
        (status = 409, description = "Concurrency token mismatch", body = Error)
    ),
    tags = ["documents"],
    operation_id = "updateDocument"
)]
#[patch("/db/{collection}/{id}")]
pub async fn update_document(
    state: web::Data<HttpState>,
    tenant: TenantContext,
    req: HttpRequest,
    path: web::Path<DocumentPath>,
    payload: web::Json<Payload>,
) -> ApiResult<HttpResponse> {
    let (collection, id) = ids(&path)?;
    let document = state
        .documents
        .update(
            tenant.tenant_id(),
            collection,
            id,
            payload.into_inner(),
            if_match(&req),
        )
        .await?;
    Ok(document_response(StatusCode::OK, "Updated", document))
}

/// Overwrite a document, or merge into it with `?merge=true`.
#[utoipa::path(
    put,
    path = "/api/v1/projects/{project_id}/db/{collection}/{id}",
    params(
        ("project_id" = String, Path, description = "Project UUID or reference id"),
        ("collection" = String, Path, description = "Collection name"),
        ("id" = String, Path, description = "Document UUID"),
        ("merge" = Option<bool>, Query, description = "Shallow-merge instead of replace")
    ),
    request_body(content = serde_json::Value, description = "JSON object payload"),
    responses(
        (status = 200, description = "Document replaced", body = Document),
        (status = 201, description = "Document created", body = Document)
    ),
    tags = ["documents"],
    operation_id = "setDocument"
)]
#[put("/db/{collection}/{id}")]
pub async fn set_document(
    state: web::Data<HttpState>,
    tenant: TenantContext,
    path: web::Path<DocumentPath>,
    params: web::Query<SetParams>,
    payload: web::Json<Payload>,
) -> ApiResult<HttpResponse> {
    let (collection, id) = ids(&path)?;
    let outcome = state
        .documents
        .set(
            tenant.tenant_id(),
            collection,
            id,
            payload.into_inner(),
            params.merge,
        )
        .await?;
    let status = if outcome.inserted {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok(document_response(status, "Document Set Successfully", outcome.document))
}

/// Soft-delete a document.
#[utoipa::path(
    delete,
    path = "/api/v1/projects/{project_id}/db/{collection}/{id}",
    params(
        ("project_id" = String, Path, description = "Project UUID or reference id"),
        ("collection" = String, Path, description = "Collection name"),
        ("id" = String, Path, description = "Document UUID")
    ),
    responses(
        (status = 200, description = "Document deleted"),
        (status = 404, description = "Document not found", body = Error)
    ),
    tags = ["documents"],
    operation_id = "deleteDocument"
)]
#[delete("/db/{collection}/{id}")]
pub async fn delete_document(
    state: web::Data<HttpState>,
    tenant: TenantContext,
    path: web::Path<DocumentPath>,
) -> ApiResult<HttpResponse> {
    let (collection, id) = ids(&path)?;
    state
        .documents
        .delete(tenant.tenant_id(), collection, id)
        .await?;
    Ok(ok("Deleted", ()))
}

/// Replace the document if it exists, otherwise create it under `id`.
#[utoipa::path(
    post,
    path = "/api/v1/projects/{project_id}/db/{collection}/{id}/upsert",
    params(
        ("project_id" = String, Path, description = "Project UUID or reference id"),
        ("collection" = String, Path, description = "Collection name"),
        ("id" = String, Path, description = "Document UUID")
    ),
    request_body(content = serde_json::Value, description = "JSON object payload"),
    responses(
        (status = 200, description = "Document replaced", body = Document),
        (status = 201, description = "Document created", body = Document),
        (status = 403, description = "Document quota exhausted", body = Error)
    ),
    tags = ["documents"],
    operation_id = "upsertDocument"
)]
#[post("/db/{collection}/{id}/upsert")]
pub async fn upsert_document(
    state: web::Data<HttpState>,
    tenant: TenantContext,
    path: web::Path<DocumentPath>,
    payload: web::Json<Payload>,
) -> ApiResult<HttpResponse> {
    let (collection, id) = ids(&path)?;
    let outcome = state
        .documents
        .upsert(tenant.tenant_id(), collection, id, payload.into_inner())
        .await?;
    let status = if outcome.inserted {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok(document_response(status, "Upsert Successful", outcome.document))
}

/// Whether a live document exists.
#[utoipa::path(
    get,
    path = "/api/v1/projects/{project_id}/db/{collection}/{id}/exists",
    params(
        ("project_id" = String, Path, description = "Project UUID or reference id"),
        ("collection" = String, Path, description = "Collection name"),
        ("id" = String, Path, description = "Document UUID")
    ),
    responses(
        (status = 200, description = "Existence flag", body = ExistsResponse)
    ),
    tags = ["documents"],
    operation_id = "documentExists"
)]
#[get("/db/{collection}/{id}/exists")]
pub async fn document_exists(
    state: web::Data<HttpState>,
    tenant: TenantContext,
    path: web::Path<DocumentPath>,
) -> ApiResult<HttpResponse> {
    let (collection, id) = ids(&path)?;
    let exists = state
        .documents
        .exists(tenant.tenant_id(), collection, id)
        .await?;
    Ok(ok("Success", ExistsResponse { exists }))
}

/// Atomically add `amount` to a numeric field.
#[utoipa::path(
    post,
    path = "/api/v1/projects/{project_id}/db/{collection}/{id}/increment",
    params(
        ("project_id" = String, Path, description = "Project UUID or reference id"),
        ("collection" = String, Path, description = "Collection name"),
        ("id" = String, Path, description = "Document UUID")
    ),
    request_body = IncrementRequest,
    responses(
        (status = 200, description = "Incremented document", body = Document),
        (status = 400, description = "Missing field", body = Error),
        (status = 404, description = "Document not found", body = Error)
    ),
    tags = ["documents"],
    operation_id = "incrementDocumentField"
)]
#[post("/db/{collection}/{id}/increment")]
pub async fn increment_field(
    state: web::Data<HttpState>,
    tenant: TenantContext,
    path: web::Path<DocumentPath>,
    payload: web::Json<IncrementRequest>,
) -> ApiResult<HttpResponse> {
    let (collection, id) = ids(&path)?;
    let IncrementRequest { field, amount } = payload.into_inner();
    let field = field
        .as_deref()
        .ok_or_else(|| missing_field_error(FieldName::new("field")))
        .and_then(|raw| parse_field_path(raw, FieldName::new("field")))?;
    if !amount.is_finite() {
        return Err(Error::invalid_request("amount must be a finite number"));
    }
    let document = state
        .documents
        .increment(tenant.tenant_id(), collection, id, field, amount)
        .await?;
    Ok(document_response(StatusCode::OK, "Incremented", document))
}

#[cfg(test)]
#[path = "documents_tests.rs"]
mod tests;
