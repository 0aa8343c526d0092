use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::Serialize;
use std::time::Instant;

use crate::{db::check_connection, handlers::AppState};

/// Component health status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Up,
    Down,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: ComponentStatus,
    pub version: &'static str,
    pub timestamp: String,
    pub database: ComponentStatus,
    pub response_time_ms: u128,
}

/// Liveness plus a database ping; 503 when the database is unreachable
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let start = Instant::now();

    let database = match check_connection(&state.db).await {
        Ok(()) => ComponentStatus::Up,
        Err(_) => ComponentStatus::Down,
    };
    let code = if database == ComponentStatus::Up {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let body = HealthResponse {
        status: database,
        version: env!("CARGO_PKG_VERSION"),
        timestamp: chrono::Utc::now().to_rfc3339(),
        database,
        response_time_ms: start.elapsed().as_millis(),
    };

    (code, Json(body))
}

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
