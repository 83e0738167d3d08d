//! Collection management handlers.
//!
//! ```text
//! GET    /api/v1/projects/{project_id}/collections
//! POST   /api/v1/projects/{project_id}/collections          {"name":"notes"}
//! PUT    /api/v1/projects/{project_id}/collections/{name}   {"new_name":"memos"}
//! DELETE /api/v1/projects/{project_id}/collections/{name}
//! PATCH  /api/v1/projects/{project_id}/db/{name}/config     {"new_name":"memos"}
//! DELETE /api/v1/projects/{project_id}/db/{name}/config
//! ```
//!
//! The `/db/{name}/config` pair lets SDK clients manage a collection from
//! the same path tree they use for documents.

use actix_web::{HttpResponse, delete, get, patch, post, put, web};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{Collection, Error, TenantContext};
use crate::inbound::http::ApiResult;
use crate::inbound::http::envelope::{created, ok};
use crate::inbound::http::state::HttpState;
use crate::inbound::http::validation::{FieldName, missing_field_error, parse_collection_name};

const COLLECTION: FieldName = FieldName::new("collection");

#[derive(Debug, Deserialize)]
pub struct CollectionPath {
    collection: String,
}

/// Body of `POST /collections`.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct CreateCollectionRequest {
    #[schema(example = "notes")]
    pub name: Option<String>,
}

/// Body of the rename endpoints.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct RenameCollectionRequest {
    #[schema(example = "memos")]
    pub new_name: Option<String>,
}

async fn rename(
    state: &HttpState,
    tenant: &TenantContext,
    path: &CollectionPath,
    body: RenameCollectionRequest,
) -> ApiResult<HttpResponse> {
    let name = parse_collection_name(&path.collection, COLLECTION)?;
    let field = FieldName::new("new_name");
    let new_name = body
        .new_name
        .as_deref()
        .ok_or_else(|| missing_field_error(field))
        .and_then(|raw| parse_collection_name(raw, field))?;
    let collection = state
        .documents
        .rename_collection(tenant.tenant_id(), name, new_name)
        .await?;
    Ok(ok("Renamed", collection))
}

async fn remove(
    state: &HttpState,
    tenant: &TenantContext,
    path: &CollectionPath,
) -> ApiResult<HttpResponse> {
    let name = parse_collection_name(&path.collection, COLLECTION)?;
    state
        .documents
        .delete_collection(tenant.tenant_id(), name)
        .await?;
    Ok(ok("Collection Deleted", ()))
}

/// List the project's collections.
#[utoipa::path(
    get,
    path = "/api/v1/projects/{project_id}/collections",
    params(("project_id" = String, Path, description = "Project UUID or reference id")),
    responses(
        (status = 200, description = "Collections", body = [Collection]),
        (status = 401, description = "Missing or invalid API key", body = Error)
    ),
    tags = ["collections"],
    operation_id = "listCollections"
)]
#[get("/collections")]
pub async fn list_collections(
    state: web::Data<HttpState>,
    tenant: TenantContext,
) -> ApiResult<HttpResponse> {
    let collections = state.documents.list_collections(tenant.tenant_id()).await?;
    Ok(ok("Success", collections))
}

/// Create a collection, or return the existing one with that name.
#[utoipa::path(
    post,
    path = "/api/v1/projects/{project_id}/collections",
    params(("project_id" = String, Path, description = "Project UUID or reference id")),
    request_body = CreateCollectionRequest,
    responses(
        (status = 201, description = "Collection", body = Collection),
        (status = 400, description = "Invalid name", body = Error)
    ),
    tags = ["collections"],
    operation_id = "createCollection"
)]
#[post("/collections")]
pub async fn create_collection(
    state: web::Data<HttpState>,
    tenant: TenantContext,
    payload: web::Json<CreateCollectionRequest>,
) -> ApiResult<HttpResponse> {
    let field = FieldName::new("name");
    let name = payload
        .name
        .as_deref()
        .ok_or_else(|| missing_field_error(field))
        .and_then(|raw| parse_collection_name(raw, field))?;
    let collection = state
        .documents
        .create_collection(tenant.tenant_id(), name)
        .await?;
    Ok(created("Collection Created", collection))
}

/// Rename a collection.
#[utoipa::path(
    put,
    path = "/api/v1/projects/{project_id}/collections/{collection}",
    params(
        ("project_id" = String, Path, description = "Project UUID or reference id"),
        ("collection" = String, Path, description = "Current collection name")
    ),
    request_body = RenameCollectionRequest,
    responses(
        (status = 200, description = "Renamed collection", body = Collection),
        (status = 404, description = "Collection not found", body = Error),
        (status = 409, description = "Name already in use", body = Error)
    ),
    tags = ["collections"],
    operation_id = "renameCollection"
)]
#[put("/collections/{collection}")]
pub async fn rename_collection(
    state: web::Data<HttpState>,
    tenant: TenantContext,
    path: web::Path<CollectionPath>,
    payload: web::Json<RenameCollectionRequest>,
) -> ApiResult<HttpResponse> {
    rename(&state, &tenant, &path, payload.into_inner()).await
}

/// Method alias of [`rename_collection`]; the OpenAPI document lists only the
/// canonical verb.
#[patch("/collections/{collection}")]
pub async fn patch_collection(
    state: web::Data<HttpState>,
    tenant: TenantContext,
    path: web::Path<CollectionPath>,
    payload: web::Json<RenameCollectionRequest>,
) -> ApiResult<HttpResponse> {
    rename(&state, &tenant, &path, payload.into_inner()).await
}

/// Delete a collection and soft-delete its documents.
#[utoipa::path(
    delete,
    path = "/api/v1/projects/{project_id}/collections/{collection}",
    params(
        ("project_id" = String, Path, description = "Project UUID or reference id"),
        ("collection" = String, Path, description = "Collection name")
    ),
    responses(
        (status = 200, description = "Collection deleted"),
        (status = 404, description = "Collection not found", body = Error)
    ),
    tags = ["collections"],
    operation_id = "deleteCollection"
)]
#[delete("/collections/{collection}")]
pub async fn delete_collection(
    state: web::Data<HttpState>,
    tenant: TenantContext,
    path: web::Path<CollectionPath>,
) -> ApiResult<HttpResponse> {
    remove(&state, &tenant, &path).await
}

/// Rename a collection through the SDK path tree.
#[utoipa::path(
    patch,
    path = "/api/v1/projects/{project_id}/db/{collection}/config",
    params(
        ("project_id" = String, Path, description = "Project UUID or reference id"),
        ("collection" = String, Path, description = "Current collection name")
    ),
    request_body = RenameCollectionRequest,
    responses(
        (status = 200, description = "Renamed collection", body = Collection),
        (status = 404, description = "Collection not found", body = Error)
    ),
    tags = ["collections"],
    operation_id = "renameCollectionConfig"
)]
#[patch("/db/{collection}/config")]
pub async fn rename_collection_config(
    state: web::Data<HttpState>,
    tenant: TenantContext,
    path: web::Path<CollectionPath>,
    payload: web::Json<RenameCollectionRequest>,
) -> ApiResult<HttpResponse> {
    rename(&state, &tenant, &path, payload.into_inner()).await
}

/// Delete a collection through the SDK path tree.
#[utoipa::path(
    delete,
    path = "/api/v1/projects/{project_id}/db/{collection}/config",
    params(
        ("project_id" = String, Path, description = "Project UUID or reference id"),
        ("collection" = String, Path, description = "Collection name")
    ),
    responses(
        (status = 200, description = "Collection deleted"),
        (status = 404, description = "Collection not found", body = Error)
    ),
    tags = ["collections"],
    operation_id = "deleteCollectionConfig"
)]
#[delete("/db/{collection}/config")]
pub async fn delete_collection_config(
    state: web::Data<HttpState>,
    tenant: TenantContext,
    path: web::Path<CollectionPath>,
) -> ApiResult<HttpResponse> {
    remove(&state, &tenant, &path).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::{MockChannelManagement, MockDocumentStore};
    use crate::domain::{CollectionName, ErrorCode, TenantId};
    use crate::inbound::http::test_utils::tenant_app;
    use actix_web::http::StatusCode;
    use actix_web::test::{self};
    use chrono::Utc;
    use rstest::rstest;
    use serde_json::{Value, json};
    use uuid::Uuid;

    fn collection(tenant_id: TenantId, name: &str) -> Collection {
        Collection {
            id: Uuid::new_v4(),
            project_id: tenant_id,
            name: CollectionName::new(name).expect("valid name"),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[rstest]
    #[actix_web::test]
    async fn create_returns_201_with_the_collection() {
        let tenant_id = TenantId::random();
        let mut documents = MockDocumentStore::new();
        documents
            .expect_create_collection()
            .withf(|_, name| name.as_ref() == "notes")
            .times(1)
            .returning(move |tenant_id, name| Ok(collection(tenant_id, name.as_ref())));
        let app = test::init_service(tenant_app(
            tenant_id,
            documents,
            MockChannelManagement::new(),
        ))
        .await;

        let req = test::TestRequest::post()
            .uri("/api/v1/projects/acme/collections")
            .set_json(json!({"name": "notes"}))
            .to_request();
        let res = test::call_service(&app, req).await;

        assert_eq!(res.status(), StatusCode::CREATED);
        let body: Value = test::read_body_json(res).await;
        assert_eq!(body["message"], "Collection Created");
        assert_eq!(body["data"]["name"], "notes");
    }

    #[rstest]
    #[actix_web::test]
    async fn missing_name_is_rejected_before_the_store() {
        let mut documents = MockDocumentStore::new();
        documents.expect_create_collection().never();
        let app = test::init_service(tenant_app(
            TenantId::random(),
            documents,
            MockChannelManagement::new(),
        ))
        .await;

        let req = test::TestRequest::post()
            .uri("/api/v1/projects/acme/collections")
            .set_json(json!({}))
            .to_request();
        let res = test::call_service(&app, req).await;

        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(res).await;
        assert_eq!(body["error"]["details"]["field"], "name");
    }

    #[rstest]
    #[case("/api/v1/projects/acme/collections/notes", "PUT")]
    #[case("/api/v1/projects/acme/collections/notes", "PATCH")]
    #[case("/api/v1/projects/acme/db/notes/config", "PATCH")]
    #[actix_web::test]
    async fn rename_routes_share_semantics(#[case] uri: &str, #[case] method: &str) {
        let tenant_id = TenantId::random();
        let mut documents = MockDocumentStore::new();
        documents
            .expect_rename_collection()
            .withf(|_, from, to| from.as_ref() == "notes" && to.as_ref() == "memos")
            .times(1)
            .returning(|tenant_id, _, to| Ok(collection(tenant_id, to.as_ref())));
        let app = test::init_service(tenant_app(
            tenant_id,
            documents,
            MockChannelManagement::new(),
        ))
        .await;

        let req = test::TestRequest::default()
            .method(method.parse().expect("method"))
            .uri(uri)
            .set_json(json!({"new_name": "memos"}))
            .to_request();
        let res = test::call_service(&app, req).await;

        assert_eq!(res.status(), StatusCode::OK);
        let body: Value = test::read_body_json(res).await;
        assert_eq!(body["data"]["name"], "memos");
    }

    #[rstest]
    #[case("/api/v1/projects/acme/collections/notes")]
    #[case("/api/v1/projects/acme/db/notes/config")]
    #[actix_web::test]
    async fn delete_routes_cascade_through_the_store(#[case] uri: &str) {
        let mut documents = MockDocumentStore::new();
        documents
            .expect_delete_collection()
            .times(1)
            .returning(|_, _| Ok(()));
        let app = test::init_service(tenant_app(
            TenantId::random(),
            documents,
            MockChannelManagement::new(),
        ))
        .await;

        let res = test::call_service(&app, test::TestRequest::delete().uri(uri).to_request()).await;

        assert_eq!(res.status(), StatusCode::OK);
        let body: Value = test::read_body_json(res).await;
        assert_eq!(body["data"], Value::Null);
    }

    #[rstest]
    #[actix_web::test]
    async fn unknown_collection_maps_to_404() {
        let mut documents = MockDocumentStore::new();
        documents
            .expect_delete_collection()
            .returning(|_, _| Err(Error::not_found("Collection not found")));
        let app = test::init_service(tenant_app(
            TenantId::random(),
            documents,
            MockChannelManagement::new(),
        ))
        .await;

        let req = test::TestRequest::delete()
            .uri("/api/v1/projects/acme/collections/ghost")
            .to_request();
        let res = test::call_service(&app, req).await;

        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        let body: Value = test::read_body_json(res).await;
        assert_eq!(body["error"]["code"], ErrorCode::NotFound.as_str());
    }
}
