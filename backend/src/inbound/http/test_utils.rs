//! Test helpers for inbound HTTP components.

use std::sync::Arc;

use actix_web::dev::{ServiceFactory, ServiceRequest, ServiceResponse};
use actix_web::{App, web};

use crate::domain::ports::{MockChannelManagement, MockDocumentStore, MockTenantAdmission};
use crate::domain::{TenantContext, TenantId};
use crate::inbound::http::state::HttpState;
use crate::inbound::http::{configure_project_routes, extractor_config};
use crate::middleware::Admission;

/// Build the project-scoped route tree around mocked ports.
///
/// Every request is admitted as `tenant_id` with reference `acme`, so
/// handler tests exercise the real admission middleware and extractor.
pub fn tenant_app(
    tenant_id: TenantId,
    documents: MockDocumentStore,
    channels: MockChannelManagement,
) -> App<
    impl ServiceFactory<
        ServiceRequest,
        Config = (),
        Response = ServiceResponse<impl actix_web::body::MessageBody>,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    let mut admission = MockTenantAdmission::new();
    admission
        .expect_admit()
        .returning(move |_| Ok(TenantContext::new(tenant_id, "acme")));
    let state = HttpState::new(Arc::new(documents), Arc::new(channels));

    App::new()
        .app_data(web::Data::new(state))
        .configure(extractor_config)
        .service(
            web::scope("/api/v1/projects/{project_id}")
                .wrap(Admission::new(Arc::new(admission)))
                .configure(configure_project_routes),
        )
}
