//! Profile endpoints: lookup, find-or-create and session-authenticated update

use std::sync::Arc;
use std::time::Instant;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Response;
use axum::Json;
use serde::Serialize;
use tracing::{debug, warn};
use userhub_domain::{AccountError, ProfileAttributes, ProfileIdentity, SyncRequest, UserProfile};

use super::respond;
use crate::context::AppContext;
use crate::error::ApiError;
use crate::utils::auth::access_token;

/// Body of the create, update and sync responses
#[derive(Debug, Serialize)]
pub struct UserEnvelope {
    pub message: &'static str,
    pub user: UserProfile,
}

/// `GET /user?email=&supabaseId=`
pub async fn get_user(
    State(ctx): State<Arc<AppContext>>,
    query: Result<Query<ProfileIdentity>, QueryRejection>,
) -> Response {
    let started = Instant::now();
    let result = find_user(&ctx, query).await.map_err(|e| e.with_message("failed to load user"));
    respond("GET /user", started, result)
}

async fn find_user(
    ctx: &AppContext,
    query: Result<Query<ProfileIdentity>, QueryRejection>,
) -> Result<Json<UserProfile>, ApiError> {
    let Query(identity) = query.map_err(|r| AccountError::Validation(r.body_text()))?;
    Ok(Json(ctx.profiles.find(identity).await?))
}

/// `POST /user`: find-or-create with merge
pub async fn sync_user(
    State(ctx): State<Arc<AppContext>>,
    body: Result<Json<SyncRequest>, JsonRejection>,
) -> Response {
    let started = Instant::now();
    let result = sync(&ctx, body).await.map_err(|e| e.with_message("failed to save user"));
    respond("POST /user", started, result)
}

async fn sync(
    ctx: &AppContext,
    body: Result<Json<SyncRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<UserEnvelope>), ApiError> {
    let Json(request) = body.map_err(|r| AccountError::Validation(r.body_text()))?;
    let outcome = ctx.profiles.sync(request).await?;

    let (status, message) = if outcome.created {
        (StatusCode::CREATED, "user created")
    } else {
        (StatusCode::OK, "user updated")
    };
    Ok((status, Json(UserEnvelope { message, user: outcome.profile })))
}

/// `PUT /user`: update the caller's own profile
///
/// The identity comes from the verified session token; identity fields in the
/// body are ignored.
pub async fn update_user(
    State(ctx): State<Arc<AppContext>>,
    headers: HeaderMap,
    body: Result<Json<ProfileAttributes>, JsonRejection>,
) -> Response {
    let started = Instant::now();
    let result =
        update(&ctx, &headers, body).await.map_err(|e| e.with_message("failed to update user"));
    respond("PUT /user", started, result)
}

async fn update(
    ctx: &AppContext,
    headers: &HeaderMap,
    body: Result<Json<ProfileAttributes>, JsonRejection>,
) -> Result<Json<UserEnvelope>, ApiError> {
    let token = access_token(headers)
        .ok_or_else(|| AccountError::Unauthorized("unauthorized".into()))?;
    let user = ctx.identity.verify(&token).await?;
    debug!(user_id = %user.id, "session verified for profile update");

    let Json(attributes) = body.map_err(|r| AccountError::Validation(r.body_text()))?;
    let identity = ProfileIdentity::new(user.email, Some(user.id));

    let profile =
        ctx.profiles.update_for_identity(identity, attributes).await.map_err(store_rejection)?;
    Ok(Json(UserEnvelope { message: "user updated", user: profile }))
}

/// Store-side failures of an update are reported to the caller as a bad request.
fn store_rejection(err: AccountError) -> AccountError {
    match err {
        AccountError::Database(_) | AccountError::NotFound(_) | AccountError::Conflict(_) => {
            warn!(error = %err, "profile update rejected by store");
            AccountError::Validation("failed to update user".into())
        }
        other => other,
    }
}
