//! Tests for the document handlers.

use super::*;
use crate::domain::ports::{MockChannelManagement, MockDocumentStore};
use crate::domain::{
    DEFAULT_QUERY_LIMIT, ErrorCode, FilterOp, SortColumn, SortDirection, TenantId, WriteOutcome,
};
use crate::inbound::http::test_utils::tenant_app;
use actix_web::http::header::{ETAG, IF_MATCH};
use actix_web::test::{self};
use chrono::Utc;
use rstest::{fixture, rstest};
use serde_json::{Value, json};
use uuid::Uuid;

const DOC_ID: &str = "6f1f3c1e-8f47-4f55-9d1c-1b8f0f3f2a10";

#[fixture]
fn tenant_id() -> TenantId {
    TenantId::random()
}

fn document(tenant_id: TenantId, id: DocumentId, data: Value, etag: &str) -> Document {
    Document {
        id,
        collection_id: Uuid::new_v4(),
        project_id: tenant_id,
        data: data.as_object().cloned().unwrap_or_default(),
        version: 1,
        etag: etag.to_owned(),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

fn doc_id() -> DocumentId {
    DOC_ID.parse().expect("valid id")
}

macro_rules! app {
    ($tenant:expr, $documents:expr) => {
        test::init_service(tenant_app($tenant, $documents, MockChannelManagement::new())).await
    };
}

#[rstest]
#[actix_web::test]
async fn create_returns_201_with_an_etag(tenant_id: TenantId) {
    let mut documents = MockDocumentStore::new();
    documents
        .expect_create()
        .withf(move |tenant, collection, id, data| {
            *tenant == tenant_id
                && collection.as_ref() == "notes"
                && id.is_none()
                && data.get("title") == Some(&json!("hi"))
        })
        .times(1)
        .returning(|tenant, _, _, data| {
            Ok(document(tenant, DocumentId::random(), Value::Object(data), "t1"))
        });
    let app = app!(tenant_id, documents);

    let req = test::TestRequest::post()
        .uri("/api/v1/projects/acme/db/notes")
        .set_json(json!({"title": "hi"}))
        .to_request();
    let res = test::call_service(&app, req).await;

    assert_eq!(res.status(), StatusCode::CREATED);
    assert_eq!(
        res.headers().get(ETAG).and_then(|v| v.to_str().ok()),
        Some("\"t1\"")
    );
    let body: Value = test::read_body_json(res).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Created");
    assert_eq!(body["data"]["data"]["title"], "hi");
    assert_eq!(body["data"]["etag"], "t1");
}

#[rstest]
#[actix_web::test]
async fn create_accepts_a_client_chosen_id(tenant_id: TenantId) {
    let mut documents = MockDocumentStore::new();
    documents
        .expect_create()
        .withf(|_, _, id, _| *id == Some(doc_id()))
        .times(1)
        .returning(|tenant, _, id, data| {
            Ok(document(tenant, id.unwrap_or_else(DocumentId::random), Value::Object(data), "t"))
        });
    let app = app!(tenant_id, documents);

    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/projects/acme/db/notes?id={DOC_ID}"))
        .set_json(json!({}))
        .to_request();
    let res = test::call_service(&app, req).await;

    assert_eq!(res.status(), StatusCode::CREATED);
}

#[rstest]
#[case("/api/v1/projects/acme/db/notes/not-a-uuid")]
#[case("/api/v1/projects/acme/db/notes/123/exists")]
#[actix_web::test]
async fn malformed_ids_never_reach_the_store(tenant_id: TenantId, #[case] uri: &str) {
    let mut documents = MockDocumentStore::new();
    documents.expect_get().never();
    documents.expect_exists().never();
    let app = app!(tenant_id, documents);

    let res = test::call_service(&app, test::TestRequest::get().uri(uri).to_request()).await;

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(res).await;
    assert_eq!(body["error"]["code"], "invalid_request");
    assert_eq!(body["error"]["details"]["field"], "id");
}

#[rstest]
#[actix_web::test]
async fn non_object_bodies_use_the_failure_envelope(tenant_id: TenantId) {
    let mut documents = MockDocumentStore::new();
    documents.expect_create().never();
    let app = app!(tenant_id, documents);

    let req = test::TestRequest::post()
        .uri("/api/v1/projects/acme/db/notes")
        .insert_header(("content-type", "application/json"))
        .set_payload("[1, 2, 3]")
        .to_request();
    let res = test::call_service(&app, req).await;

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(res).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "invalid_request");
}

#[rstest]
#[case(Some("\"t1\""), Some("t1"))]
#[case(Some("W/\"t1\""), Some("t1"))]
#[case(None, None)]
#[case(Some("null"), None)]
#[actix_web::test]
async fn update_forwards_the_if_match_token(
    tenant_id: TenantId,
    #[case] header: Option<&'static str>,
    #[case] expected: Option<&'static str>,
) {
    let mut documents = MockDocumentStore::new();
    documents
        .expect_update()
        .withf(move |_, _, id, patch, etag| {
            *id == doc_id()
                && patch.get("title") == Some(&json!("bye"))
                && etag.as_deref() == expected
        })
        .times(1)
        .returning(|tenant, _, id, patch, _| Ok(document(tenant, id, Value::Object(patch), "t2")));
    let app = app!(tenant_id, documents);

    let mut req = test::TestRequest::patch()
        .uri(&format!("/api/v1/projects/acme/db/notes/{DOC_ID}"))
        .set_json(json!({"title": "bye"}));
    if let Some(value) = header {
        req = req.insert_header((IF_MATCH, value));
    }
    let res = test::call_service(&app, req.to_request()).await;

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(
        res.headers().get(ETAG).and_then(|v| v.to_str().ok()),
        Some("\"t2\"")
    );
}

#[rstest]
#[actix_web::test]
async fn stale_tokens_surface_as_conflicts(tenant_id: TenantId) {
    let mut documents = MockDocumentStore::new();
    documents
        .expect_update()
        .returning(|_, _, _, _, _| Err(Error::conflict("Document was modified concurrently")));
    let app = app!(tenant_id, documents);

    let req = test::TestRequest::patch()
        .uri(&format!("/api/v1/projects/acme/db/notes/{DOC_ID}"))
        .insert_header((IF_MATCH, "\"stale\""))
        .set_json(json!({"title": "bye"}))
        .to_request();
    let res = test::call_service(&app, req).await;

    assert_eq!(res.status(), StatusCode::CONFLICT);
    let body: Value = test::read_body_json(res).await;
    assert_eq!(body["error"]["code"], ErrorCode::Conflict.as_str());
}

#[rstest]
#[case("?merge=true", true, true, StatusCode::CREATED)]
#[case("", false, false, StatusCode::OK)]
#[actix_web::test]
async fn set_honours_merge_and_reports_inserts(
    tenant_id: TenantId,
    #[case] query: &str,
    #[case] merge: bool,
    #[case] inserted: bool,
    #[case] status: StatusCode,
) {
    let mut documents = MockDocumentStore::new();
    documents
        .expect_set()
        .withf(move |_, _, _, _, flag| *flag == merge)
        .times(1)
        .returning(move |tenant, _, id, data, _| {
            Ok(WriteOutcome {
                document: document(tenant, id, Value::Object(data), "t"),
                inserted,
            })
        });
    let app = app!(tenant_id, documents);

    let req = test::TestRequest::put()
        .uri(&format!("/api/v1/projects/acme/db/notes/{DOC_ID}{query}"))
        .set_json(json!({"a": 1}))
        .to_request();
    let res = test::call_service(&app, req).await;

    assert_eq!(res.status(), status);
}

#[rstest]
#[actix_web::test]
async fn upsert_reports_inserts_with_201(tenant_id: TenantId) {
    let mut documents = MockDocumentStore::new();
    documents.expect_upsert().times(1).returning(|tenant, _, id, data| {
        Ok(WriteOutcome {
            document: document(tenant, id, Value::Object(data), "t"),
            inserted: true,
        })
    });
    let app = app!(tenant_id, documents);

    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/projects/acme/db/notes/{DOC_ID}/upsert"))
        .set_json(json!({"a": 1}))
        .to_request();
    let res = test::call_service(&app, req).await;

    assert_eq!(res.status(), StatusCode::CREATED);
    let body: Value = test::read_body_json(res).await;
    assert_eq!(body["message"], "Upsert Successful");
}

#[rstest]
#[actix_web::test]
async fn query_bodies_become_typed_queries(tenant_id: TenantId) {
    let mut documents = MockDocumentStore::new();
    documents
        .expect_query()
        .withf(|_, collection, query| {
            collection.as_ref() == "notes"
                && query.filters.len() == 1
                && query.filters[0].op() == FilterOp::Eq
                && query.select.len() == 1
                && query.limit == 5
                && query.offset == 10
                && query.order_by.column == SortColumn::Version
                && query.order_by.direction == SortDirection::Desc
                && query.search.as_deref() == Some("bye")
        })
        .times(1)
        .returning(|_, _, _| Ok(Vec::new()));
    let app = app!(tenant_id, documents);

    let req = test::TestRequest::post()
        .uri("/api/v1/projects/acme/db/notes/query")
        .set_json(json!({
            "filters": [{"field": "title", "op": "==", "value": "bye"}],
            "select": ["title"],
            "limit": 5,
            "offset": 10,
            "order_by": "version DESC",
            "search": "bye"
        }))
        .to_request();
    let res = test::call_service(&app, req).await;

    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = test::read_body_json(res).await;
    assert_eq!(body["data"], json!([]));
}

#[rstest]
#[actix_web::test]
async fn empty_query_bodies_use_defaults(tenant_id: TenantId) {
    let mut documents = MockDocumentStore::new();
    documents
        .expect_query()
        .withf(|_, _, query| {
            query.filters.is_empty()
                && query.limit == DEFAULT_QUERY_LIMIT
                && query.order_by.column == SortColumn::CreatedAt
                && query.order_by.direction == SortDirection::Desc
        })
        .times(1)
        .returning(|_, _, _| Ok(Vec::new()));
    let app = app!(tenant_id, documents);

    let req = test::TestRequest::post()
        .uri("/api/v1/projects/acme/db/notes/query")
        .to_request();
    let res = test::call_service(&app, req).await;

    assert_eq!(res.status(), StatusCode::OK);
}

#[rstest]
#[case(json!({"order_by": "data->>'title'"}))]
#[case(json!({"offset": -1}))]
#[case(json!({"filters": [{"field": "views", "op": ">", "value": "many"}]}))]
#[case(json!({"select": [""]}))]
#[actix_web::test]
async fn invalid_queries_are_rejected(tenant_id: TenantId, #[case] body: Value) {
    let mut documents = MockDocumentStore::new();
    documents.expect_query().never();
    let app = app!(tenant_id, documents);

    let req = test::TestRequest::post()
        .uri("/api/v1/projects/acme/db/notes/query")
        .set_json(body)
        .to_request();
    let res = test::call_service(&app, req).await;

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[rstest]
#[actix_web::test]
async fn list_reads_paging_from_the_query_string(tenant_id: TenantId) {
    let mut documents = MockDocumentStore::new();
    documents
        .expect_query()
        .withf(|_, _, query| query.limit == 2 && query.offset == 4)
        .times(1)
        .returning(|_, _, _| Ok(Vec::new()));
    let app = app!(tenant_id, documents);

    let req = test::TestRequest::get()
        .uri("/api/v1/projects/acme/db/notes?limit=2&offset=4")
        .to_request();
    let res = test::call_service(&app, req).await;

    assert_eq!(res.status(), StatusCode::OK);
}

#[rstest]
#[actix_web::test]
async fn count_is_not_captured_as_a_document_id(tenant_id: TenantId) {
    let mut documents = MockDocumentStore::new();
    documents.expect_get().never();
    documents
        .expect_count()
        .withf(|_, _, filter| filter.filters.is_empty() && filter.search.is_none())
        .times(1)
        .returning(|_, _, _| Ok(7));
    let app = app!(tenant_id, documents);

    let req = test::TestRequest::get()
        .uri("/api/v1/projects/acme/db/notes/count")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body["data"]["count"], 7);
}

#[rstest]
#[case(json!([{"field": "title", "op": "==", "value": "hi"}]), None)]
#[case(json!({"filters": [{"field": "title", "op": "==", "value": "hi"}], "search": "h"}), Some("h"))]
#[actix_web::test]
async fn count_accepts_both_body_shapes(
    tenant_id: TenantId,
    #[case] body: Value,
    #[case] search: Option<&'static str>,
) {
    let mut documents = MockDocumentStore::new();
    documents
        .expect_count()
        .withf(move |_, _, filter| filter.filters.len() == 1 && filter.search.as_deref() == search)
        .times(1)
        .returning(|_, _, _| Ok(1));
    let app = app!(tenant_id, documents);

    let req = test::TestRequest::post()
        .uri("/api/v1/projects/acme/db/notes/count")
        .set_json(body)
        .to_request();
    let res = test::call_service(&app, req).await;

    assert_eq!(res.status(), StatusCode::OK);
}

#[rstest]
#[actix_web::test]
async fn exists_wraps_the_flag(tenant_id: TenantId) {
    let mut documents = MockDocumentStore::new();
    documents.expect_exists().returning(|_, _, _| Ok(false));
    let app = app!(tenant_id, documents);

    let req = test::TestRequest::get()
        .uri(&format!("/api/v1/projects/acme/db/notes/{DOC_ID}/exists"))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body["data"], json!({"exists": false}));
}

#[rstest]
#[actix_web::test]
async fn increment_defaults_amount_to_one(tenant_id: TenantId) {
    let mut documents = MockDocumentStore::new();
    documents
        .expect_increment()
        .withf(|_, _, _, field, amount| field.as_ref() == "views" && (*amount - 1.0).abs() < f64::EPSILON)
        .times(1)
        .returning(|tenant, _, id, _, _| Ok(document(tenant, id, json!({"views": 1}), "t")));
    let app = app!(tenant_id, documents);

    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/projects/acme/db/notes/{DOC_ID}/increment"))
        .set_json(json!({"field": "views"}))
        .to_request();
    let res = test::call_service(&app, req).await;

    assert_eq!(res.status(), StatusCode::OK);
}

#[rstest]
#[actix_web::test]
async fn increment_requires_a_field(tenant_id: TenantId) {
    let mut documents = MockDocumentStore::new();
    documents.expect_increment().never();
    let app = app!(tenant_id, documents);

    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/projects/acme/db/notes/{DOC_ID}/increment"))
        .set_json(json!({"amount": 5}))
        .to_request();
    let res = test::call_service(&app, req).await;

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(res).await;
    assert_eq!(body["error"]["details"]["code"], "missing_field");
}

#[rstest]
#[actix_web::test]
async fn delete_returns_an_empty_envelope(tenant_id: TenantId) {
    let mut documents = MockDocumentStore::new();
    documents
        .expect_delete()
        .withf(|_, _, id| *id == doc_id())
        .times(1)
        .returning(|_, _, _| Ok(()));
    let app = app!(tenant_id, documents);

    let req = test::TestRequest::delete()
        .uri(&format!("/api/v1/projects/acme/db/notes/{DOC_ID}"))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body, json!({"success": true, "message": "Deleted", "data": null}));
}
