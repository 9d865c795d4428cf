//! Avatar upload and retrieval

use std::sync::Arc;
use std::time::Instant;

use axum::extract::multipart::MultipartError;
use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, Path, State};
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE, X_CONTENT_TYPE_OPTIONS};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use userhub_domain::constants::{MAX_IMAGE_BYTES, UPLOAD_BODY_LIMIT_BYTES};
use userhub_domain::{AccountError, ImageUpload, UploadRejection};

use super::respond;
use crate::context::AppContext;
use crate::error::ApiError;

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub message: &'static str,
    pub url: String,
}

/// `POST /upload`: multipart `file` plus owner `email`
pub async fn upload_avatar(
    State(ctx): State<Arc<AppContext>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    let started = Instant::now();
    let result = upload(&ctx, multipart).await.map_err(|e| e.with_message("failed to upload file"));
    respond("POST /upload", started, result)
}

async fn upload(
    ctx: &AppContext,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut multipart = multipart.map_err(|r| AccountError::Validation(r.body_text()))?;
    let upload = read_form(&mut multipart).await?;

    let receipt = ctx.uploads.upload(upload).await?;
    Ok(Json(UploadResponse { message: "upload completed", url: receipt.url }))
}

async fn read_form(multipart: &mut Multipart) -> Result<ImageUpload, AccountError> {
    let mut upload = ImageUpload::default();

    while let Some(field) = multipart.next_field().await.map_err(form_error)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                upload.file_name = field.file_name().map(str::to_string);
                upload.content_type = field.content_type().map(str::to_string);
                upload.bytes = field.bytes().await.map_err(form_error)?.to_vec();
            }
            Some("email") => {
                upload.owner_email = Some(field.text().await.map_err(form_error)?);
            }
            _ => {}
        }
    }

    Ok(upload)
}

fn form_error(err: MultipartError) -> AccountError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return UploadRejection::TooLarge { size: UPLOAD_BODY_LIMIT_BYTES, max: MAX_IMAGE_BYTES }
            .into();
    }
    AccountError::Validation(err.body_text())
}

/// `GET /uploads/{name}`
pub async fn serve_upload(
    State(ctx): State<Arc<AppContext>>,
    Path(name): Path<String>,
) -> Response {
    let started = Instant::now();
    let result = ctx.uploads.fetch(&name).await.map_err(ApiError::from).map(|object| {
        (
            [
                (CONTENT_TYPE, object.content_type),
                (X_CONTENT_TYPE_OPTIONS, "nosniff".to_string()),
                (CACHE_CONTROL, "public, max-age=86400".to_string()),
            ],
            object.bytes,
        )
            .into_response()
    });
    respond("GET /uploads/{name}", started, result)
}
