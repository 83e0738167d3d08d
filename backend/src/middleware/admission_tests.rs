//! Tests for the admission middleware.

use super::*;
use crate::domain::ports::MockTenantAdmission;
use crate::domain::{Error as DomainError, TenantContext, TenantId};
use actix_web::test::{self};
use actix_web::{App, HttpResponse, web};
use rstest::rstest;
use serde_json::Value;

fn admitted(tenant_id: TenantId) -> MockTenantAdmission {
    let mut admission = MockTenantAdmission::new();
    admission
        .expect_admit()
        .returning(move |_| Ok(TenantContext::new(tenant_id, "acme")));
    admission
}

async fn echo_tenant(req: actix_web::HttpRequest) -> HttpResponse {
    match req.extensions().get::<TenantContext>() {
        Some(context) => HttpResponse::Ok().body(context.tenant_id().to_string()),
        None => HttpResponse::Ok().body("none"),
    }
}

macro_rules! app_with {
    ($admission:expr) => {
        test::init_service(
            App::new().service(
                web::scope("/api/v1/projects/{project_id}")
                    .wrap(Admission::new(Arc::new($admission)))
                    .route("/db/{collection}", web::get().to(echo_tenant)),
            ),
        )
        .await
    };
}

#[rstest]
#[actix_web::test]
async fn admitted_requests_carry_the_tenant() {
    let tenant = TenantId::random();
    let app = app_with!(admitted(tenant));

    let req = test::TestRequest::get()
        .uri("/api/v1/projects/acme/db/notes")
        .insert_header((API_KEY_HEADER, "pk_live"))
        .to_request();
    let body = test::call_and_read_body(&app, req).await;

    assert_eq!(std::str::from_utf8(&body).expect("utf8"), tenant.to_string());
}

#[rstest]
#[actix_web::test]
async fn credentials_come_from_path_and_header_first() {
    let mut admission = MockTenantAdmission::new();
    admission
        .expect_admit()
        .withf(|request| {
            request.tenant_ref.as_deref() == Some("acme")
                && request.api_key.as_deref() == Some("header-key")
                && request.path == "/api/v1/projects/acme/db/notes"
        })
        .times(1)
        .returning(|_| Ok(TenantContext::new(TenantId::random(), "acme")));
    let app = app_with!(admission);

    let req = test::TestRequest::get()
        .uri("/api/v1/projects/acme/db/notes?project_id=other&api_key=query-key")
        .insert_header((API_KEY_HEADER, "header-key"))
        .to_request();
    let res = test::call_service(&app, req).await;

    assert!(res.status().is_success());
}

#[rstest]
#[actix_web::test]
async fn api_key_falls_back_to_the_query_string() {
    let mut admission = MockTenantAdmission::new();
    admission
        .expect_admit()
        .withf(|request| request.api_key.as_deref() == Some("query key"))
        .times(1)
        .returning(|_| Ok(TenantContext::new(TenantId::random(), "acme")));
    let app = app_with!(admission);

    let req = test::TestRequest::get()
        .uri("/api/v1/projects/acme/db/notes?api_key=query%20key")
        .to_request();
    let res = test::call_service(&app, req).await;

    assert!(res.status().is_success());
}

#[rstest]
#[actix_web::test]
async fn rejections_short_circuit_with_the_error_envelope() {
    let mut admission = MockTenantAdmission::new();
    admission
        .expect_admit()
        .returning(|_| Err(DomainError::unauthorized("Invalid API Key")));
    let app = app_with!(admission);

    let req = test::TestRequest::get()
        .uri("/api/v1/projects/acme/db/notes")
        .insert_header((API_KEY_HEADER, "nope"))
        .to_request();
    let res = test::call_service(&app, req).await;

    assert_eq!(res.status(), actix_web::http::StatusCode::UNAUTHORIZED);
    let body: Value = test::read_body_json(res).await;
    assert_eq!(body["success"], Value::Bool(false));
    assert_eq!(body["message"], Value::from("Invalid API Key"));
    assert_eq!(body["error"]["code"], Value::from("unauthorized"));
}

#[rstest]
#[actix_web::test]
async fn websocket_upgrades_bypass_admission() {
    let mut admission = MockTenantAdmission::new();
    admission.expect_admit().never();
    let app = app_with!(admission);

    let req = test::TestRequest::get()
        .uri("/api/v1/projects/acme/db/notes")
        .insert_header((UPGRADE, "websocket"))
        .to_request();
    let body = test::call_and_read_body(&app, req).await;

    assert_eq!(body.as_ref(), b"none");
}

#[rstest]
#[case("project_id=acme&api_key=k", PROJECT_ID_PARAM, Some("acme"))]
#[case("api_key=a%2Bb", API_KEY_PARAM, Some("a+b"))]
#[case("other=1", API_KEY_PARAM, None)]
#[case("", PROJECT_ID_PARAM, None)]
fn query_params_are_decoded(
    #[case] query: &str,
    #[case] name: &str,
    #[case] expected: Option<&str>,
) {
    assert_eq!(query_param(query, name).as_deref(), expected);
}
