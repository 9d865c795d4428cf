//! HTTP routes

pub mod health;
pub mod upload;
pub mod user;

use std::sync::Arc;
use std::time::Instant;

use axum::extract::DefaultBodyLimit;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use userhub_domain::constants::UPLOAD_BODY_LIMIT_BYTES;

use crate::context::AppContext;
use crate::error::ApiError;
use crate::utils::logging::log_request_outcome;

/// Build the service router.
pub fn router(ctx: Arc<AppContext>) -> Router {
    Router::new()
        .route("/user", get(user::get_user).post(user::sync_user).put(user::update_user))
        .route(
            "/upload",
            post(upload::upload_avatar).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT_BYTES)),
        )
        .route("/uploads/{name}", get(upload::serve_upload))
        .route("/health", get(health::health))
        .with_state(ctx)
}

/// Render a handler result and log its outcome.
fn respond<T: IntoResponse>(
    route: &'static str,
    started: Instant,
    result: Result<T, ApiError>,
) -> Response {
    let response = match result {
        Ok(body) => body.into_response(),
        Err(err) => err.into_response(),
    };
    log_request_outcome(route, response.status(), started.elapsed());
    response
}
