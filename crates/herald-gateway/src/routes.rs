//! Route handlers for the gateway.

use axum::{Json, extract::State, http::StatusCode};
use std::sync::Arc;

use super::server::AppState;

/// Health check endpoint.
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "herald",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

/// Root endpoint with service info.
pub async fn service_info(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let schedule = state.schedule.lock().unwrap().clone();
    Json(serde_json::json!({
        "service": "Herald Onboarding Email Scheduler",
        "version": env!("CARGO_PKG_VERSION"),
        "status": if schedule.enabled { "Running" } else { "Disabled" },
        "last_run": schedule.last_run,
        "dry_run": schedule.dry_run,
        "uptime_secs": state.start_time.elapsed().as_secs(),
        "endpoints": {
            "scheduler": "/scheduler/run (POST/GET) - timer trigger endpoint",
            "manual": "/manual/trigger (POST) - manual trigger for testing",
            "health": "/health (GET) - health check",
            "config": "/config (GET/POST) - view/update runtime configuration",
        },
        "environment": {
            "sheet_id": state.config.tracker.sheet_id,
            "identity_range": state.config.tracker.identity_range,
            "state_range": state.config.tracker.state_range,
        },
    }))
}

/// Run one poll cycle and echo its summary. This is the endpoint the
/// external timer hits.
pub async fn run_scheduler(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<serde_json::Value>) {
    tracing::info!("📧 Scheduler trigger received");
    execute_cycle(&state, None).await
}

/// Manual trigger for testing and debugging.
pub async fn manual_trigger(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<serde_json::Value>) {
    tracing::info!("📞 Manual trigger called");
    execute_cycle(&state, Some("Manual trigger executed successfully")).await
}

async fn execute_cycle(
    state: &Arc<AppState>,
    message: Option<&str>,
) -> (StatusCode, Json<serde_json::Value>) {
    let (enabled, dry_run) = {
        let schedule = state.schedule.lock().unwrap();
        (schedule.enabled, schedule.dry_run)
    };
    if !enabled {
        tracing::info!("📴 Email processing is disabled");
        return (
            StatusCode::OK,
            Json(serde_json::json!({
                "success": false,
                "message": "Email processing is currently disabled",
                "enabled": false,
            })),
        );
    }

    let now = chrono::Utc::now();
    state.schedule.lock().unwrap().last_run = Some(now.to_rfc3339());

    match state.engine.run_cycle(now, !dry_run).await {
        Ok(summary) => {
            tracing::info!(
                "✅ Scheduler completed: checked={} due={} updated={}",
                summary.checked,
                summary.due,
                summary.updated
            );
            let mut body = serde_json::json!({
                "success": true,
                "result": summary,
                "timestamp": chrono::Utc::now().to_rfc3339(),
            });
            if let Some(message) = message {
                body["message"] = serde_json::Value::String(message.to_string());
            }
            (StatusCode::OK, Json(body))
        }
        Err(e) => {
            tracing::error!("❌ Scheduler execution failed: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({
                    "success": false,
                    "error": format!("Scheduler execution failed: {e}"),
                })),
            )
        }
    }
}

/// Get current runtime schedule configuration.
pub async fn get_config(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let schedule = state.schedule.lock().unwrap().clone();
    Json(serde_json::json!({
        "schedule_config": schedule,
        "environment": {
            "sheet_id": state.config.tracker.sheet_id,
            "identity_range": state.config.tracker.identity_range,
            "state_range": state.config.tracker.state_range,
            "sending_enabled": state.config.sending.enabled,
            "poll_interval_secs": state.config.schedule.poll_interval_secs,
        },
    }))
}

/// Update runtime schedule configuration (enable/disable, dry run).
pub async fn update_config(
    State(state): State<Arc<AppState>>,
    Json(body): Json<serde_json::Value>,
) -> (StatusCode, Json<serde_json::Value>) {
    let mut schedule = state.schedule.lock().unwrap();
    if let Some(enabled) = body.get("enabled").and_then(|v| v.as_bool()) {
        schedule.enabled = enabled;
        tracing::info!("Schedule enabled status updated to: {enabled}");
    }
    if let Some(dry_run) = body.get("dry_run").and_then(|v| v.as_bool()) {
        schedule.dry_run = dry_run;
        tracing::info!("Dry run status updated to: {dry_run}");
    }
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "message": "Configuration updated successfully",
            "new_config": schedule.clone(),
        })),
    )
}
