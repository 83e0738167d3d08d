//! Backend entry-point: loads settings, prepares persistence and serves the
//! REST, WebSocket and OpenAPI surfaces.

mod server;

use std::io;

use actix_web::web;
use ortho_config::OrthoConfig;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use backend::inbound::http::health::HealthState;
use backend::outbound::persistence::{DbPool, PoolConfig, run_migrations};
use backend::settings::AppSettings;
use server::{DemoTenant, ServerConfig, create_server};

/// Application bootstrap.
#[actix_web::main]
async fn main() -> io::Result<()> {
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }

    let settings = AppSettings::load()
        .map_err(|error| io::Error::other(format!("failed to load settings: {error}")))?;
    let bind_addr = settings
        .bind_addr()
        .map_err(|error| io::Error::other(format!("invalid bind address: {error}")))?;
    let mut config = ServerConfig::new(bind_addr);

    match settings.database_url() {
        Some(url) => {
            if settings.run_migrations {
                run_migrations(url).await.map_err(io::Error::other)?;
            }
            let pool = DbPool::new(
                PoolConfig::new(url).with_max_size(settings.db_max_connections()),
            )
            .await
            .map_err(io::Error::other)?;
            config = config.with_db_pool(pool);
        }
        None => {
            warn!("BAAS_DATABASE_URL not set; serving from the in-memory backend");
            if let Some((reference_id, api_key)) = settings.demo_credentials() {
                config = config.with_demo_tenant(DemoTenant {
                    reference_id: reference_id.to_owned(),
                    api_key: api_key.to_owned(),
                });
            }
        }
    }

    let health_state = web::Data::new(HealthState::new());
    let server = create_server(health_state, config).await?;
    info!(%bind_addr, "backend listening");
    server.await
}
