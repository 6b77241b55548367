//! HTTP server implementation using Axum.

use axum::{
    Router,
    routing::{get, post},
};
use serde::Serialize;
use std::sync::{Arc, Mutex};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use herald_core::config::HeraldConfig;
use herald_engine::PollEngine;

/// Runtime schedule state, adjustable via POST /config without a restart.
#[derive(Debug, Clone, Serialize)]
pub struct ScheduleState {
    /// Master switch — a disabled gateway acknowledges triggers but runs
    /// nothing.
    pub enabled: bool,
    /// Dry run: cycles run but nothing is sent and nothing is committed.
    pub dry_run: bool,
    pub last_run: Option<String>,
}

/// Shared state for the gateway server.
pub struct AppState {
    pub config: HeraldConfig,
    pub engine: Arc<PollEngine>,
    pub schedule: Mutex<ScheduleState>,
    pub start_time: std::time::Instant,
}

impl AppState {
    pub fn new(config: HeraldConfig, engine: Arc<PollEngine>) -> Self {
        let schedule = ScheduleState {
            enabled: true,
            dry_run: !config.sending.enabled,
            last_run: None,
        };
        Self {
            config,
            engine,
            schedule: Mutex::new(schedule),
            start_time: std::time::Instant::now(),
        }
    }
}

/// Build the Axum router with all routes.
pub fn build_router(shared: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(super::routes::service_info))
        .route("/health", get(super::routes::health_check))
        .route(
            "/scheduler/run",
            get(super::routes::run_scheduler).post(super::routes::run_scheduler),
        )
        .route("/manual/trigger", post(super::routes::manual_trigger))
        .route(
            "/config",
            get(super::routes::get_config).post(super::routes::update_config),
        )
        .layer(
            CorsLayer::new()
                .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
                .allow_headers(Any)
                .allow_origin(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(shared)
}

/// Start the HTTP server, plus the built-in poller when configured.
pub async fn start(config: HeraldConfig, engine: Arc<PollEngine>) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);
    let poll_interval = config.schedule.poll_interval_secs;

    let state = Arc::new(AppState::new(config, engine));

    if poll_interval > 0 {
        tokio::spawn(spawn_poller(state.clone(), poll_interval));
    }

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("🌐 Gateway listening on http://{addr}");
    axum::serve(listener, app).await?;
    Ok(())
}

/// Built-in poller — fires one full cycle per interval tick, same path as
/// an external trigger.
pub async fn spawn_poller(state: Arc<AppState>, interval_secs: u64) {
    tracing::info!("⏰ Built-in poller started (every {interval_secs}s)");
    let mut interval = tokio::time::interval(std::time::Duration::from_secs(interval_secs));

    loop {
        interval.tick().await;

        let (enabled, dry_run) = {
            let schedule = state.schedule.lock().unwrap();
            (schedule.enabled, schedule.dry_run)
        };
        if !enabled {
            continue;
        }

        let now = chrono::Utc::now();
        match state.engine.run_cycle(now, !dry_run).await {
            Ok(summary) => {
                if summary.due > 0 {
                    tracing::info!(
                        "📣 Poller cycle: {} due, {} updated",
                        summary.due,
                        summary.updated
                    );
                }
            }
            Err(e) => tracing::error!("❌ Poller cycle failed: {e}"),
        }
        state.schedule.lock().unwrap().last_run = Some(now.to_rfc3339());
    }
}
