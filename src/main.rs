use anyhow::{Context, Result};
use axum::Router;
use fleetwatch::api::{
    create_admin_router, create_query_router, create_router, create_ws_router, AdminAppState,
    AppState, IngestSink, QueryAppState, WsAppState,
};
use fleetwatch::config::{load_config, IngestMode};
use fleetwatch::nats::{NatsClient, TelemetryPublisher};
use fleetwatch::session::SessionManager;
use fleetwatch::state::{run_liveness_sweeper, StateEngine};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fleetwatch=info".into()),
        )
        .init();

    info!("Fleetwatch starting...");

    let config_path =
        std::env::var("FLEETWATCH_CONFIG").unwrap_or_else(|_| "fleetwatch.toml".to_string());
    let mut config = load_config(&config_path)?;
    config.apply_env_overrides();
    info!(path = %config_path, mode = ?config.ingest.mode, "Configuration loaded");

    let state_engine = Arc::new(StateEngine::with_config(config.engine.clone()));
    let sessions = Arc::new(SessionManager::new(
        Arc::clone(&state_engine),
        config.session.clone(),
    ));

    let sink = match config.ingest.mode {
        IngestMode::Direct => IngestSink::Direct,
        IngestMode::Nats => {
            let nats = NatsClient::connect(config.nats.clone()).await?;
            let jetstream = nats.jetstream().clone();

            let engine = Arc::clone(&state_engine);
            let nats_config = nats.config().clone();
            let subscriber_js = jetstream.clone();
            tokio::spawn(async move {
                if let Err(e) = engine.run_subscriber(subscriber_js, nats_config).await {
                    error!(error = %e, "Telemetry subscriber failed");
                }
            });

            IngestSink::Nats(TelemetryPublisher::new(
                jetstream,
                config.nats.subject_prefix.clone(),
            ))
        }
    };

    tokio::spawn(run_liveness_sweeper(Arc::clone(&state_engine)));

    let app = Router::new()
        .merge(create_router(AppState {
            sink,
            state_engine: Arc::clone(&state_engine),
            body_size_limit_single_bytes: config.ingest.body_size_limit_single_bytes,
            body_size_limit_batch_bytes: config.ingest.body_size_limit_batch_bytes,
        }))
        .merge(create_query_router(Arc::new(QueryAppState {
            state_engine: Arc::clone(&state_engine),
            reporter_window_seconds: config.api.reporter_window_seconds,
        })))
        .merge(create_admin_router(AdminAppState {
            state_engine: Arc::clone(&state_engine),
            admin_token: std::env::var("FLEETWATCH_ADMIN_TOKEN").ok(),
        }))
        .merge(create_ws_router(Arc::new(WsAppState { sessions })))
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(&config.api.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.api.bind_addr))?;
    info!(addr = %config.api.bind_addr, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    info!("Fleetwatch stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
    }
    info!("Shutdown signal received");
}
