//! Upload route gate
//!
//! Runs the quota check for upload and processing routes before their
//! handlers. The declared `Content-Length` is the size checked, so a denied
//! request never has its body read.

use axum::{
    extract::{Request, State},
    http::{header::CONTENT_LENGTH, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use tracing::{debug, info};

use crate::auth::user_id_from_headers;
use crate::error::ApiError;
use crate::state::AppState;

pub const GATED_PREFIXES: [&str; 2] = ["/api/upload", "/api/process-pdf"];

pub fn is_gated(path: &str) -> bool {
    GATED_PREFIXES.iter().any(|prefix| path.starts_with(prefix))
}

fn content_length(headers: &HeaderMap) -> Option<i64> {
    headers
        .get(CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

pub async fn upload_gate(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let path = request.uri().path();
    if !is_gated(path) {
        return Ok(next.run(request).await);
    }

    let user_id = user_id_from_headers(request.headers()).ok_or(ApiError::Unauthorized)?;
    let file_size = content_length(request.headers()).ok_or(ApiError::LengthRequired)?;

    let validation = state.quota.validate_file_upload(&user_id, file_size).await;
    if !validation.can_upload {
        info!(
            "Blocked {} for user {}: {}",
            path,
            user_id,
            validation.reason.as_deref().unwrap_or_default()
        );
        return Ok((StatusCode::FORBIDDEN, Json(validation)).into_response());
    }

    debug!("Admitted {} bytes to {} for user {}", file_size, path, user_id);
    Ok(next.run(request).await)
}
