//! Liveness and database readiness

use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tokio::task;
use tracing::error;
use userhub_domain::{AccountError, Result};

use super::respond;
use crate::context::AppContext;
use crate::utils::health::{ComponentHealth, HealthReport};

/// Reported for any store failure; the cause only goes to the log.
const DATABASE_UNAVAILABLE: &str = "database unavailable";

/// `GET /health`: `SELECT 1` through the pool
pub async fn health(State(ctx): State<Arc<AppContext>>) -> Response {
    let started = Instant::now();

    let db = Arc::clone(&ctx.db);
    let outcome = task::spawn_blocking(move || db.health_check())
        .await
        .unwrap_or_else(|err| Err(AccountError::Internal(format!("health task failed: {err}"))));
    let database = database_component(outcome);

    let report = HealthReport::from_components(vec![database]);
    let status =
        if report.is_healthy() { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    respond("GET /health", started, Ok((status, Json(report)).into_response()))
}

fn database_component(outcome: Result<()>) -> ComponentHealth {
    match outcome {
        Ok(()) => ComponentHealth::healthy("database"),
        Err(err) => {
            error!(error = %err, "database health check failed");
            ComponentHealth::unhealthy("database", DATABASE_UNAVAILABLE)
        }
    }
}
