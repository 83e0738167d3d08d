//! Admission gateway behaviour observed from outside the process.

mod support;

use actix_web::http::StatusCode;
use actix_web::test::{self, TestRequest};
use rstest::rstest;
use serde_json::{Value, json};

use backend::domain::{Allowance, UsageRecord};
use support::{API_KEY, Harness, api, eventually, seed_tenant};

const KEY_HEADER: &str = "x-api-key";
const TRACE_HEADER: &str = "trace-id";

#[rstest]
#[case::missing_key(None, StatusCode::UNAUTHORIZED, "unauthorized")]
#[case::unknown_key(Some("pk_nobody"), StatusCode::UNAUTHORIZED, "unauthorized")]
#[actix_web::test]
async fn requests_without_a_valid_key_are_rejected(
    #[case] key: Option<&str>,
    #[case] status: StatusCode,
    #[case] code: &str,
) {
    let harness = Harness::new().await;
    let app = test::init_service(harness.clone().into_app()).await;
    let mut req = TestRequest::get().uri(&api("/collections"));
    if let Some(key) = key {
        req = req.insert_header((KEY_HEADER, key));
    }

    let res = test::call_service(&app, req.to_request()).await;

    assert_eq!(res.status(), status);
    let body: Value = test::read_body_json(res).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], code);
}

#[rstest]
#[actix_web::test]
async fn keys_are_bound_to_their_own_project() {
    let harness = Harness::new().await;
    seed_tenant(&harness.backend, "globex", "pk_test_globex").await;
    let app = test::init_service(harness.clone().into_app()).await;

    let res = test::call_service(
        &app,
        TestRequest::get()
            .uri(&api("/collections"))
            .insert_header((KEY_HEADER, "pk_test_globex"))
            .to_request(),
    )
    .await;

    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let body: Value = test::read_body_json(res).await;
    assert_eq!(body["message"], "Security Violation");
    assert_eq!(body["error"]["code"], "forbidden");
}

#[rstest]
#[actix_web::test]
async fn query_string_key_is_accepted() {
    let harness = Harness::new().await;
    let app = test::init_service(harness.clone().into_app()).await;

    let res = test::call_service(
        &app,
        TestRequest::get()
            .uri(&format!("{}?api_key={API_KEY}", api("/collections")))
            .to_request(),
    )
    .await;

    assert_eq!(res.status(), StatusCode::OK);
}

#[rstest]
#[actix_web::test]
async fn exhausted_document_quota_blocks_database_routes() {
    let harness = Harness::new().await;
    let mut usage = UsageRecord::unlimited(harness.tenant_id);
    usage.documents = Allowance::new(5, 5);
    harness.backend.seed_usage(usage).await;
    let app = test::init_service(harness.clone().into_app()).await;

    let res = test::call_service(
        &app,
        TestRequest::post()
            .uri(&api("/db/notes"))
            .insert_header((KEY_HEADER, API_KEY))
            .set_json(json!({"title": "one too many"}))
            .to_request(),
    )
    .await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let body: Value = test::read_body_json(res).await;
    assert_eq!(body["error"]["code"], "limit_reached_db");

    let res = test::call_service(
        &app,
        TestRequest::get()
            .uri(&api("/realtime/channels"))
            .insert_header((KEY_HEADER, API_KEY))
            .to_request(),
    )
    .await;
    assert_eq!(res.status(), StatusCode::OK);
}

#[rstest]
#[case::auth_prefixed("authors", "pk_test_authors")]
#[case::storage_prefixed("storage-co", "pk_test_storage")]
#[actix_web::test]
async fn project_identifiers_do_not_change_quota_selection(
    #[case] reference: &str,
    #[case] key: &str,
) {
    let harness = Harness::new().await;
    let (tenant_id, _) = seed_tenant(&harness.backend, reference, key).await;
    let mut usage = UsageRecord::unlimited(tenant_id);
    usage.documents = Allowance::new(5, 5);
    harness.backend.seed_usage(usage).await;
    let app = test::init_service(harness.clone().into_app()).await;

    let res = test::call_service(
        &app,
        TestRequest::post()
            .uri(&format!("/api/v1/projects/{reference}/db/notes"))
            .insert_header((KEY_HEADER, key))
            .set_json(json!({"title": "over quota"}))
            .to_request(),
    )
    .await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let body: Value = test::read_body_json(res).await;
    assert_eq!(body["error"]["code"], "limit_reached_db");
}

#[rstest]
#[actix_web::test]
async fn exhausted_api_quota_blocks_everything() {
    let harness = Harness::new().await;
    let mut usage = UsageRecord::unlimited(harness.tenant_id);
    usage.api_calls = Allowance::new(100, 100);
    harness.backend.seed_usage(usage).await;
    let app = test::init_service(harness.clone().into_app()).await;

    let res = test::call_service(
        &app,
        TestRequest::get()
            .uri(&api("/realtime/channels"))
            .insert_header((KEY_HEADER, API_KEY))
            .to_request(),
    )
    .await;

    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let body: Value = test::read_body_json(res).await;
    assert_eq!(body["error"]["code"], "limit_reached_api");
}

#[rstest]
#[actix_web::test]
async fn admitted_calls_are_counted() {
    let harness = Harness::new().await;
    let app = test::init_service(harness.clone().into_app()).await;
    for _ in 0..3 {
        let res = test::call_service(
            &app,
            TestRequest::get()
                .uri(&api("/collections"))
                .insert_header((KEY_HEADER, API_KEY))
                .to_request(),
        )
        .await;
        assert_eq!(res.status(), StatusCode::OK);
    }

    let backend = harness.backend.clone();
    let tenant_id = harness.tenant_id;
    assert!(
        eventually(|| {
            let backend = backend.clone();
            async move {
                let calls = backend
                    .usage(&tenant_id)
                    .await
                    .is_some_and(|usage| usage.api_calls.used == 3);
                let key_uses = backend.api_key_usage(API_KEY).await == Some(3);
                calls && key_uses
            }
        })
        .await,
        "three admitted calls should be recorded"
    );
}

#[rstest]
#[actix_web::test]
async fn rejected_calls_still_carry_a_trace_id() {
    let harness = Harness::new().await;
    let app = test::init_service(harness.clone().into_app()).await;

    let res = test::call_service(
        &app,
        TestRequest::get().uri(&api("/collections")).to_request(),
    )
    .await;

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let header = res
        .headers()
        .get(TRACE_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned)
        .expect("trace-id header");
    let body: Value = test::read_body_json(res).await;
    assert_eq!(body["error"]["traceId"], header.as_str());
}

#[rstest]
#[actix_web::test]
async fn caller_trace_ids_are_echoed() {
    let harness = Harness::new().await;
    let app = test::init_service(harness.clone().into_app()).await;
    let trace_id = "00000000-0000-4000-8000-000000000abc";

    let res = test::call_service(
        &app,
        TestRequest::get()
            .uri(&api("/collections"))
            .insert_header((KEY_HEADER, API_KEY))
            .insert_header((TRACE_HEADER, trace_id))
            .to_request(),
    )
    .await;

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(
        res.headers()
            .get(TRACE_HEADER)
            .and_then(|value| value.to_str().ok()),
        Some(trace_id)
    );
}
