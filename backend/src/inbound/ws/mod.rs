//! WebSocket inbound adapter for the realtime hub.
//!
//! Responsibilities:
//! - resolve the tenant from the upgrade request (path segment, then the
//!   `project_id` query parameter)
//! - upgrade the connection and hand it to a per-connection session task
//! - keep WebSocket-specific concerns at the edge of the system
//!
//! The admission gateway does not run on upgrades; the tenant is resolved
//! here without a key because browser socket clients cannot set headers.

use actix_web::web::{self, Payload};
use actix_web::{HttpRequest, HttpResponse, get};
use serde::Deserialize;
use tracing::error;

use crate::domain::{ClientId, Error};
use crate::inbound::http::ApiResult;

mod session;

pub mod messages;
pub mod state;

use state::WsState;

/// Query parameters accepted on the upgrade request.
#[derive(Debug, Default, Deserialize)]
pub struct WsQuery {
    pub project_id: Option<String>,
    pub user_id: Option<String>,
}

/// Upgrade `/ws/{project_id}` to a realtime session.
#[get("/ws/{project_id}")]
pub async fn ws_project_entry(
    state: web::Data<WsState>,
    path: web::Path<String>,
    query: web::Query<WsQuery>,
    req: HttpRequest,
    stream: Payload,
) -> ApiResult<HttpResponse> {
    let WsQuery {
        project_id,
        user_id,
    } = query.into_inner();
    let tenant_ref = tenant_ref(Some(path.into_inner()), project_id);
    upgrade(&state, tenant_ref.as_deref(), user_id.as_deref(), &req, stream).await
}

/// Upgrade `/ws?project_id=...` to a realtime session.
#[get("/ws")]
pub async fn ws_entry(
    state: web::Data<WsState>,
    query: web::Query<WsQuery>,
    req: HttpRequest,
    stream: Payload,
) -> ApiResult<HttpResponse> {
    let WsQuery {
        project_id,
        user_id,
    } = query.into_inner();
    upgrade(&state, project_id.as_deref(), user_id.as_deref(), &req, stream).await
}

/// Prefer the path segment; fall back to the query when it is blank or `null`.
fn tenant_ref(path: Option<String>, query: Option<String>) -> Option<String> {
    let usable = |value: &String| {
        let trimmed = value.trim();
        !trimmed.is_empty() && !trimmed.eq_ignore_ascii_case("null")
    };
    path.filter(usable).or_else(|| query.filter(usable))
}

async fn upgrade(
    state: &WsState,
    tenant_ref: Option<&str>,
    user_id: Option<&str>,
    req: &HttpRequest,
    stream: Payload,
) -> ApiResult<HttpResponse> {
    let tenant = state
        .admission
        .resolve_tenant(tenant_ref.unwrap_or_default())
        .await?;
    let client_id = ClientId::from_user(user_id);

    let (response, session, messages) = actix_ws::handle(req, stream).map_err(|error| {
        error!(error = %error, "WebSocket upgrade failed");
        Error::invalid_request("WebSocket upgrade required")
    })?;

    actix_web::rt::spawn(session::handle_ws_session(
        state.live.clone(),
        tenant.tenant_id(),
        client_id,
        session,
        messages,
    ));
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use actix_web::http::StatusCode;
    use actix_web::App;
    use actix_web::test::{self};
    use rstest::rstest;
    use serde_json::Value;

    use crate::domain::ports::{MockLiveChannels, MockTenantAdmission};
    use crate::domain::{TenantContext, TenantId};

    #[rstest]
    #[case(Some("acme"), Some("other"), Some("acme"))]
    #[case(Some("null"), Some("other"), Some("other"))]
    #[case(Some(" "), None, None)]
    #[case(None, Some("acme"), Some("acme"))]
    #[case(None, Some("NULL"), None)]
    fn path_tenant_wins_over_query(
        #[case] path: Option<&str>,
        #[case] query: Option<&str>,
        #[case] expected: Option<&str>,
    ) {
        let resolved = tenant_ref(path.map(str::to_owned), query.map(str::to_owned));
        assert_eq!(resolved.as_deref(), expected);
    }

    #[rstest]
    #[actix_web::test]
    async fn unknown_tenants_are_rejected_before_upgrade() {
        let mut admission = MockTenantAdmission::new();
        admission
            .expect_resolve_tenant()
            .withf(|tenant_ref| tenant_ref == "ghost")
            .times(1)
            .returning(|_| Err(Error::not_found("Project not found")));
        let mut live = MockLiveChannels::new();
        live.expect_connect().never();
        let state = WsState::new(Arc::new(admission), Arc::new(live));
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .service(ws_project_entry)
                .service(ws_entry),
        )
        .await;

        let req = test::TestRequest::get().uri("/ws/ghost").to_request();
        let res = test::call_service(&app, req).await;

        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        let body: Value = test::read_body_json(res).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["code"], "not_found");
    }

    #[rstest]
    #[actix_web::test]
    async fn plain_requests_are_not_upgraded() {
        let mut admission = MockTenantAdmission::new();
        admission
            .expect_resolve_tenant()
            .returning(|_| Ok(TenantContext::new(TenantId::random(), "acme")));
        let mut live = MockLiveChannels::new();
        live.expect_connect().never();
        let state = WsState::new(Arc::new(admission), Arc::new(live));
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .service(ws_entry),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/ws?project_id=acme&user_id=u1")
            .to_request();
        let res = test::call_service(&app, req).await;

        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }
}
