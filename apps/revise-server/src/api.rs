//! API handlers for the RevisePDF server
//!
//! Provides REST endpoints for:
//! - PDF upload and processing (quota-gated)
//! - Metadata extraction and validation
//! - Subscription limits and tier catalog

use std::time::Duration;

use axum::{
    body::Bytes,
    extract::{Query, State},
    Json,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use quota_engine::{
    format_bytes, get_storage_usage_percentage, get_subscription_tier_info, SubscriptionLimits,
    TierInfo, TIERS,
};
use revise_core::{
    get_pdf_metadata, merge_pdfs, parse_page_list, process_pdf, processing_type_display_name,
    validate_pdf, OperationType, PdfMetadata, PdfValidation, ProcessingOptions, ProcessingResult,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::auth::{AdminCredential, AuthenticatedUser};
use crate::error::ApiError;
use crate::state::AppState;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

/// Handler: GET /health
pub async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "revise-server",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Run CPU-bound PDF work on the blocking pool, bounded by the configured timeout
async fn run_blocking<T, F>(state: &AppState, work: F) -> Result<T, ApiError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let task = tokio::task::spawn_blocking(work);
    match tokio::time::timeout(Duration::from_millis(state.timeout_ms), task).await {
        Ok(joined) => Ok(joined?),
        Err(_) => Err(ApiError::Timeout(state.timeout_ms)),
    }
}

/// Record accepted bytes against the user's storage; failures are logged only
async fn record_usage(state: &AppState, user_id: &str, bytes: usize) -> bool {
    let recorded = state
        .quota
        .update_storage_usage(user_id, i64::try_from(bytes).unwrap_or(i64::MAX))
        .await;
    if !recorded {
        warn!("Usage of {} bytes not recorded for user {}", bytes, user_id);
    }
    recorded
}

/// Upload response
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub success: bool,
    pub metadata: PdfMetadata,
    pub usage_recorded: bool,
}

/// Handler: POST /api/upload
pub async fn handle_upload(
    State(state): State<AppState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    body: Bytes,
) -> Result<Json<UploadResponse>, ApiError> {
    let size = body.len();
    let metadata = run_blocking(&state, move || get_pdf_metadata(&body))
        .await?
        .map_err(|e| ApiError::InvalidPdf(e.to_string()))?;

    let usage_recorded = record_usage(&state, &user_id, size).await;
    info!(
        "User {} uploaded {} ({} pages)",
        user_id,
        format_bytes(size as i64),
        metadata.page_count
    );

    Ok(Json(UploadResponse {
        success: true,
        metadata,
        usage_recorded,
    }))
}

/// Query string of a processing request
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessQuery {
    #[serde(rename = "type")]
    pub operation: Option<String>,
    /// Comma-separated 1-based page numbers
    pub pages: Option<String>,
    pub watermark_text: Option<String>,
    pub rotation_angle: Option<f64>,
    pub compression_level: Option<f64>,
}

impl ProcessQuery {
    pub fn into_options(self) -> Result<ProcessingOptions, ApiError> {
        let tag = self
            .operation
            .ok_or_else(|| ApiError::InvalidRequest("Missing processing type".to_string()))?;

        let pages = self
            .pages
            .map(|list| parse_page_list(&list))
            .transpose()
            .map_err(|e| ApiError::InvalidRequest(e.to_string()))?;

        Ok(ProcessingOptions {
            operation: OperationType::from_tag(&tag),
            pages,
            watermark_text: self.watermark_text,
            rotation_angle: self.rotation_angle,
            compression_level: self.compression_level,
        })
    }
}

/// Processing response; the document travels as base64
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessResponse {
    pub success: bool,
    pub operation: String,
    pub data: String,
    pub original_size: usize,
    pub processed_size: usize,
}

impl ProcessResponse {
    fn from_result(tag: &str, result: ProcessingResult) -> Result<Self, ApiError> {
        if !result.success {
            let error = result
                .error
                .unwrap_or_else(|| "Unknown processing error".to_string());
            return Err(ApiError::ProcessingFailed(error));
        }

        let data = result
            .data
            .ok_or_else(|| ApiError::Internal("Processing produced no document".to_string()))?;

        Ok(Self {
            success: true,
            operation: processing_type_display_name(tag),
            original_size: result.original_size.unwrap_or_default(),
            processed_size: data.len(),
            data: BASE64.encode(&data),
        })
    }
}

/// Handler: POST /api/process-pdf
pub async fn handle_process_pdf(
    State(state): State<AppState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Query(query): Query<ProcessQuery>,
    body: Bytes,
) -> Result<Json<ProcessResponse>, ApiError> {
    let options = query.into_options()?;
    let tag = options.operation.as_str();
    let size = body.len();

    debug!("Processing {} bytes with {} for user {}", size, tag, user_id);
    let result = run_blocking(&state, move || process_pdf(&body, &options)).await?;
    let response = ProcessResponse::from_result(tag, result)?;

    record_usage(&state, &user_id, size).await;
    info!(
        "{} for user {}: {} -> {} bytes",
        response.operation, user_id, response.original_size, response.processed_size
    );

    Ok(Json(response))
}

/// Merge request body
#[derive(Debug, Deserialize)]
pub struct MergeRequest {
    /// Base64-encoded PDF files, merged in order
    pub files: Vec<String>,
}

/// Handler: POST /api/process-pdf/merge
pub async fn handle_merge(
    State(state): State<AppState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Json(req): Json<MergeRequest>,
) -> Result<Json<ProcessResponse>, ApiError> {
    let buffers = req
        .files
        .iter()
        .enumerate()
        .map(|(i, file)| {
            BASE64
                .decode(file)
                .map_err(|e| ApiError::InvalidRequest(format!("Invalid base64 in file {}: {}", i, e)))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let count = buffers.len();
    let result = run_blocking(&state, move || merge_pdfs(buffers.as_slice())).await?;
    let response = ProcessResponse::from_result(OperationType::Merge.as_str(), result)?;

    record_usage(&state, &user_id, response.original_size).await;
    info!(
        "Merged {} files for user {}: {} bytes",
        count, user_id, response.processed_size
    );

    Ok(Json(response))
}

/// Handler: POST /api/metadata
pub async fn handle_metadata(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<PdfMetadata>, ApiError> {
    let metadata = run_blocking(&state, move || get_pdf_metadata(&body))
        .await?
        .map_err(|e| ApiError::InvalidPdf(e.to_string()))?;
    Ok(Json(metadata))
}

/// Handler: POST /api/validate
pub async fn handle_validate(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<PdfValidation>, ApiError> {
    let validation = run_blocking(&state, move || validate_pdf(&body)).await?;
    Ok(Json(validation))
}

/// Subscription overview for the current user
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionResponse {
    pub limits: SubscriptionLimits,
    pub usage_percentage: i64,
    pub storage_used: String,
    pub storage_limit: String,
    pub tier: &'static TierInfo,
}

impl SubscriptionResponse {
    fn new(limits: SubscriptionLimits) -> Self {
        Self {
            usage_percentage: get_storage_usage_percentage(
                limits.current_storage_used,
                limits.total_storage_limit,
            ),
            storage_used: format_bytes(limits.current_storage_used),
            storage_limit: format_bytes(limits.total_storage_limit),
            tier: get_subscription_tier_info(&limits.tier_name),
            limits,
        }
    }
}

/// Handler: GET /api/subscription
pub async fn handle_subscription(
    State(state): State<AppState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
) -> Json<SubscriptionResponse> {
    let limits = state.quota.get_user_subscription_limits(&user_id).await;
    Json(SubscriptionResponse::new(limits))
}

/// Handler: GET /api/subscription/tiers
pub async fn handle_list_tiers() -> Json<&'static [TierInfo]> {
    Json(&TIERS[..])
}

/// Tier change request body, sent by billing integrations
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateLimitsRequest {
    pub user_id: String,
    pub product_name: String,
}

/// Handler: PUT /api/subscription/limits (admin token required)
pub async fn handle_update_limits(
    State(state): State<AppState>,
    _admin: AdminCredential,
    Json(req): Json<UpdateLimitsRequest>,
) -> Result<Json<SubscriptionResponse>, ApiError> {
    let user_id = req.user_id.trim();
    if user_id.is_empty() {
        return Err(ApiError::InvalidRequest("userId is required".to_string()));
    }

    if !state
        .quota
        .update_user_storage_limits(user_id, &req.product_name)
        .await
    {
        return Err(ApiError::Internal(format!(
            "Failed to update storage limits for user {}",
            user_id
        )));
    }

    info!("User {} limits set from product {}", user_id, req.product_name);
    let limits = state.quota.get_user_subscription_limits(user_id).await;
    Ok(Json(SubscriptionResponse::new(limits)))
}
