//! Builders wiring outbound adapters into the driving ports.
//!
//! A configured pool selects the Diesel adapters; otherwise one shared
//! [`InMemoryBackend`] stands in for every driven port. Either way a single
//! [`RealtimeHub`] backs both the REST publish endpoint and the socket
//! sessions so management broadcasts reach live clients.

use std::sync::Arc;

use actix_web::web;
use tracing::info;
use uuid::Uuid;

use backend::domain::ports::{
    AnalyticsSink, ChannelRepository, DocumentRepository, EventRepository, TenantAdmission,
    TenantResolver, UsageLedger,
};
use backend::domain::{
    AdmissionService, ApiKeyRecord, DocumentService, Project, RealtimeHub, RealtimeService,
    TenantId, UsageRecord,
};
use backend::inbound::http::state::HttpState;
use backend::inbound::ws::state::WsState;
use backend::outbound::memory::InMemoryBackend;
use backend::outbound::persistence::{
    DieselAnalyticsSink, DieselChannelRepository, DieselDocumentRepository,
    DieselEventRepository, DieselTenantResolver, DieselUsageLedger,
};

use super::{DemoTenant, ServerConfig};

/// Ports handed to every worker's `App`.
#[derive(Clone)]
pub(super) struct AppPorts {
    pub(super) admission: Arc<dyn TenantAdmission>,
    pub(super) http_state: web::Data<HttpState>,
    pub(super) ws_state: web::Data<WsState>,
}

/// Driven adapters for one backend flavour.
struct Adapters<R, U, D, C, E, A> {
    resolver: Arc<R>,
    usage: Arc<U>,
    documents: Arc<D>,
    channels: Arc<C>,
    events: Arc<E>,
    analytics: Arc<A>,
}

impl<T> Adapters<T, T, T, T, T, T> {
    /// Serve every port from one shared adapter.
    fn shared(backend: Arc<T>) -> Self {
        Self {
            resolver: Arc::clone(&backend),
            usage: Arc::clone(&backend),
            documents: Arc::clone(&backend),
            channels: Arc::clone(&backend),
            events: Arc::clone(&backend),
            analytics: backend,
        }
    }
}

fn wire<R, U, D, C, E, A>(adapters: Adapters<R, U, D, C, E, A>, hub: Arc<RealtimeHub>) -> AppPorts
where
    R: TenantResolver + 'static,
    U: UsageLedger + 'static,
    D: DocumentRepository + 'static,
    C: ChannelRepository + 'static,
    E: EventRepository + 'static,
    A: AnalyticsSink + 'static,
{
    let Adapters {
        resolver,
        usage,
        documents,
        channels,
        events,
        analytics,
    } = adapters;

    let admission: Arc<dyn TenantAdmission> =
        Arc::new(AdmissionService::new(resolver, Arc::clone(&usage)));
    let document_service = Arc::new(DocumentService::new(
        documents,
        Arc::clone(&usage),
        Arc::clone(&analytics),
    ));
    let realtime = Arc::new(RealtimeService::new(hub, channels, events, usage, analytics));

    AppPorts {
        admission: Arc::clone(&admission),
        http_state: web::Data::new(HttpState::new(document_service, realtime.clone())),
        ws_state: web::Data::new(WsState::new(admission, realtime)),
    }
}

/// Register the configured demo tenant with unlimited quotas.
async fn seed_demo_tenant(backend: &InMemoryBackend, demo: &DemoTenant) {
    let project = Project {
        id: TenantId::random(),
        reference_id: demo.reference_id.clone(),
        owner_id: Uuid::new_v4(),
        name: demo.reference_id.clone(),
        active: true,
    };
    backend
        .seed_api_key(
            demo.api_key.clone(),
            ApiKeyRecord {
                id: Uuid::new_v4(),
                project_id: project.id,
                revoked: false,
                usage_count: 0,
            },
        )
        .await;
    backend.seed_usage(UsageRecord::unlimited(project.id)).await;
    info!(tenant_id = %project.id, reference_id = %project.reference_id, "seeded demo tenant");
    backend.seed_project(project).await;
}

/// Build the driving ports from configuration.
pub(super) async fn build_app_ports(config: &ServerConfig) -> AppPorts {
    let hub = Arc::new(RealtimeHub::new());
    match &config.db_pool {
        Some(pool) => wire(
            Adapters {
                resolver: Arc::new(DieselTenantResolver::new(pool.clone())),
                usage: Arc::new(DieselUsageLedger::new(pool.clone())),
                documents: Arc::new(DieselDocumentRepository::new(pool.clone())),
                channels: Arc::new(DieselChannelRepository::new(pool.clone())),
                events: Arc::new(DieselEventRepository::new(pool.clone())),
                analytics: Arc::new(DieselAnalyticsSink::new(pool.clone())),
            },
            hub,
        ),
        None => {
            let backend = Arc::new(InMemoryBackend::new());
            if let Some(demo) = &config.demo_tenant {
                seed_demo_tenant(&backend, demo).await;
            }
            wire(Adapters::shared(backend), hub)
        }
    }
}
