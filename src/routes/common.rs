//! Liveness and readiness probes for a tenancy-enabled service.

use crate::state::TenancyState;
use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Serialize;
use std::time::Duration;

const READY_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Serialize)]
struct ReadyBody {
    status: &'static str,
    main_schema: String,
    database: &'static str,
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Ready once the pool can reach PostgreSQL within `READY_TIMEOUT`.
async fn ready(State(state): State<TenancyState>) -> (StatusCode, Json<ReadyBody>) {
    let check = sqlx::query("SELECT 1").execute(state.db.pool());
    let database = match tokio::time::timeout(READY_TIMEOUT, check).await {
        Ok(Ok(_)) => "ok",
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "readiness: database unreachable");
            "unreachable"
        }
        Err(_) => {
            tracing::warn!(timeout = ?READY_TIMEOUT, "readiness: database check timed out");
            "timeout"
        }
    };
    let status = if database == "ok" {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    let body = ReadyBody {
        status: if status.is_success() { "ok" } else { "unavailable" },
        main_schema: state.db.main_schema().to_string(),
        database,
    };
    (status, Json(body))
}

/// `GET /health` and `GET /ready`. Mount outside `with_tenancy` so probes need no tenant.
pub fn health_routes(state: TenancyState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready))
        .with_state(state)
}
