//! HTTP error mapping
//!
//! Client errors echo the domain message back. Server errors are logged with
//! their detail and answered with a generic message.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;
use userhub_domain::AccountError;

const GENERIC_SERVER_ERROR: &str = "internal server error";
const GENERIC_CONFLICT: &str = "profile conflicts with an existing account";

/// Handler error carrying the domain error and an optional public message
#[derive(Debug)]
pub struct ApiError {
    error: AccountError,
    public_message: Option<&'static str>,
}

impl ApiError {
    /// Replace the generic server-error message with a route-specific one.
    pub fn with_message(mut self, message: &'static str) -> Self {
        self.public_message = Some(message);
        self
    }

    pub fn status(&self) -> StatusCode {
        status_for(&self.error)
    }

    pub fn error(&self) -> &AccountError {
        &self.error
    }
}

impl From<AccountError> for ApiError {
    fn from(error: AccountError) -> Self {
        Self { error, public_message: None }
    }
}

/// Map a domain error onto its HTTP status.
pub fn status_for(error: &AccountError) -> StatusCode {
    match error {
        AccountError::Validation(_) | AccountError::Conflict(_) => StatusCode::BAD_REQUEST,
        AccountError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        AccountError::Forbidden(_) => StatusCode::FORBIDDEN,
        AccountError::NotFound(_) => StatusCode::NOT_FOUND,
        AccountError::Database(_)
        | AccountError::Storage(_)
        | AccountError::Timeout(_)
        | AccountError::Network(_)
        | AccountError::Config(_)
        | AccountError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() {
            error!(error = %self.error, status = status.as_u16(), "request failed");
            self.public_message.unwrap_or(GENERIC_SERVER_ERROR).to_string()
        } else if matches!(self.error, AccountError::Conflict(_)) {
            // Constraint text names tables and columns.
            self.public_message.unwrap_or(GENERIC_CONFLICT).to_string()
        } else {
            self.error.message().to_string()
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
