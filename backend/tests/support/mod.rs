//! Shared helper utilities for backend integration tests.
//!
//! Integration tests compile as separate crates under `backend/tests/`, so
//! the tenant fixture and application wiring live here instead of being
//! copied into every file. Everything runs on the in-memory backend.

#![allow(
    dead_code,
    reason = "each integration crate uses a different subset of helpers"
)]

pub mod ws;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use actix_web::dev::{ServiceFactory, ServiceRequest, ServiceResponse};
use actix_web::{App, web};
use backend::Trace;
use backend::domain::{
    AdmissionService, ApiKeyRecord, DocumentService, Project, RealtimeHub, RealtimeService,
    TenantId, UsageRecord,
};
use backend::inbound::http::state::HttpState;
use backend::inbound::http::{configure_project_routes, extractor_config};
use backend::inbound::ws::state::WsState;
use backend::middleware::Admission;
use backend::outbound::memory::InMemoryBackend;
use uuid::Uuid;

/// API key seeded for the primary tenant.
pub const API_KEY: &str = "pk_test_acme";
/// Public reference of the primary tenant.
pub const TENANT_REF: &str = "acme";

/// A seeded tenant and the backend holding it.
#[derive(Clone)]
pub struct Harness {
    pub backend: Arc<InMemoryBackend>,
    pub tenant_id: TenantId,
    pub key_id: Uuid,
    pub http_state: web::Data<HttpState>,
    pub ws_state: web::Data<WsState>,
}

/// Register a project and one API key for it.
pub async fn seed_tenant(backend: &InMemoryBackend, reference: &str, key: &str) -> (TenantId, Uuid) {
    let project = Project {
        id: TenantId::random(),
        reference_id: reference.to_owned(),
        owner_id: Uuid::new_v4(),
        name: reference.to_owned(),
        active: true,
    };
    let key_id = Uuid::new_v4();
    backend
        .seed_api_key(
            key,
            ApiKeyRecord {
                id: key_id,
                project_id: project.id,
                revoked: false,
                usage_count: 0,
            },
        )
        .await;
    let tenant_id = project.id;
    backend.seed_project(project).await;
    (tenant_id, key_id)
}

impl Harness {
    /// Seed the `acme` tenant with unlimited quotas.
    pub async fn new() -> Self {
        let backend = Arc::new(InMemoryBackend::new());
        let (tenant_id, key_id) = seed_tenant(&backend, TENANT_REF, API_KEY).await;
        backend.seed_usage(UsageRecord::unlimited(tenant_id)).await;

        let admission = Arc::new(AdmissionService::new(
            Arc::clone(&backend),
            Arc::clone(&backend),
        ));
        let documents = Arc::new(DocumentService::new(
            Arc::clone(&backend),
            Arc::clone(&backend),
            Arc::clone(&backend),
        ));
        let realtime = Arc::new(RealtimeService::new(
            Arc::new(RealtimeHub::new()),
            Arc::clone(&backend),
            Arc::clone(&backend),
            Arc::clone(&backend),
            Arc::clone(&backend),
        ));

        Self {
            backend,
            tenant_id,
            key_id,
            http_state: web::Data::new(HttpState::new(documents, realtime.clone())),
            ws_state: web::Data::new(WsState::new(admission, realtime)),
        }
    }

    /// Full application: trace middleware, admission-gated API and sockets.
    ///
    /// Takes the harness by value so the returned app owns its state and
    /// can be handed to `init_service` or an `HttpServer` factory.
    pub fn into_app(
        self,
    ) -> App<
        impl ServiceFactory<
            ServiceRequest,
            Config = (),
            Response = ServiceResponse<impl actix_web::body::MessageBody>,
            Error = actix_web::Error,
            InitError = (),
        >,
    > {
        App::new()
            .app_data(self.http_state.clone())
            .app_data(self.ws_state.clone())
            .configure(extractor_config)
            .wrap(Trace)
            .service(
                web::scope("/api/v1/projects/{project_id}")
                    .wrap(Admission::new(self.ws_state.admission.clone()))
                    .configure(configure_project_routes),
            )
            .service(backend::inbound::ws::ws_project_entry)
            .service(backend::inbound::ws::ws_entry)
    }
}

/// Path under the primary tenant's API scope.
pub fn api(path: &str) -> String {
    format!("/api/v1/projects/{TENANT_REF}{path}")
}

/// Poll `check` until it yields `true` or a second elapses.
///
/// Usage counters and analytics are written by detached tasks, so tests
/// observe them eventually rather than immediately.
pub async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..100 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
