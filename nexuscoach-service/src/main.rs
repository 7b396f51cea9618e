use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::net::TcpListener;
use tracing::{info, warn};

mod api;
mod config;
mod db;
mod error;
mod i18n;
mod knowledge;
mod llm;
mod nlu;
mod service;
mod session;
mod strategy;
mod stt;

use crate::config::AppConfig;
use crate::service::CoachService;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    info!("Starting NexusCoach service v{}", env!("CARGO_PKG_VERSION"));

    let config = AppConfig::load()?;
    info!(
        host = %config.server.host,
        port = config.server.port,
        session_backend = ?config.session.backend,
        llm = ?config.llm.provider,
        stt = ?config.stt.provider,
        "Configuration loaded"
    );

    let metrics = match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!(error = %e, "Prometheus recorder unavailable, /metrics will be empty");
            None
        }
    };

    let service = Arc::new(CoachService::new(&config).await?);
    let app = api::router(service, metrics);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

fn init_logging() {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let format = fmt::format()
        .with_target(true)
        .with_thread_ids(true)
        .compact();

    // Use RUST_LOG if set, otherwise default to info level for our crate
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("nexuscoach_service=info"));

    tracing_subscriber::registry()
        .with(fmt::layer().event_format(format))
        .with(filter)
        .init();
}
