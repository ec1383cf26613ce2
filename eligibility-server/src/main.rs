use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};

use eligibility_server::{create_app, AppState, ServerConfig};
use error_common::{log_error, EngineError, Result};
use events_bus::BroadcastHub;
use insurance_service::{
    EngineConfig, InMemoryVerificationStore, InsuranceService, PgVerificationStore, VerificationStore,
};
use logger_redacted::init_tracing;

#[tokio::main]
async fn main() -> Result<()> {
    // .env must be loaded before clap reads env-backed flags
    dotenvy::dotenv().ok();
    let args = ServerConfig::parse();

    init_tracing(&args.logger_config()).map_err(|e| EngineError::ConfigError(e.to_string()))?;

    info!("Starting eligibility server v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(args).await {
        log_error("eligibility-server", &e);
        return Err(e);
    }
    Ok(())
}

async fn run(args: ServerConfig) -> Result<()> {
    let engine_config = EngineConfig::load(args.config.as_deref())?;
    info!(
        providers = engine_config.provider_names.len(),
        sweep_interval_hours = engine_config.sweep_interval_hours,
        lookahead_days = engine_config.lookahead_days,
        "Engine configuration loaded"
    );

    let store = connect_store(&args).await?;
    let service = Arc::new(InsuranceService::new(store, BroadcastHub::new(), engine_config));
    service.scheduler().start().await;

    let app = create_app(AppState::new(Arc::clone(&service), args.observer_buffer));

    let addr: SocketAddr = args
        .bind_address()
        .parse()
        .map_err(|e| EngineError::ConfigError(format!("Invalid bind address {}: {}", args.bind_address(), e)))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| EngineError::NetworkError(format!("Failed to bind to {}: {}", addr, e)))?;

    info!("Eligibility server running on http://{}", addr);
    info!("Health check available at: http://{}/health", addr);
    info!("Alert stream available at: ws://{}/ws/alerts", addr);

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| EngineError::ServerError(format!("HTTP server error: {}", e)));

    service.scheduler().shutdown().await;
    info!("Eligibility server stopped");
    served
}

async fn connect_store(args: &ServerConfig) -> Result<Arc<dyn VerificationStore>> {
    match &args.database_url {
        Some(url) => {
            let store = PgVerificationStore::connect(url).await?;
            store.migrate().await?;
            info!("Connected to PostgreSQL verification store");
            Ok(Arc::new(store))
        }
        None => {
            warn!("DATABASE_URL not set, using the in-memory store; data is lost on exit");
            Ok(Arc::new(InMemoryVerificationStore::new()))
        }
    }
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => {
            // without a signal handler only the process manager can stop us
            log_error("shutdown signal", &EngineError::InternalError(e.to_string()));
            std::future::pending::<()>().await;
        }
    }
}
