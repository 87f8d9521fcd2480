//! Quota decisions and usage accounting
//!
//! Limits are computed fresh from the backend on every call. Backend
//! failures never surface as errors: reads fall back to the Basic tier and
//! decisions fall back to a denial, so callers always get an answer.
//!
//! The check in [`QuotaEngine::validate_file_upload`] and the write in
//! [`QuotaEngine::update_storage_usage`] are separate calls, so concurrent
//! uploads by one user can together exceed the storage limit.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::backend::StorageBackend;
use crate::format::format_bytes;
use crate::tiers::BASIC;

/// A user's caps and current usage
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionLimits {
    pub max_file_size: i64,
    pub total_storage_limit: i64,
    pub current_storage_used: i64,
    pub can_upload: bool,
    pub tier_name: String,
}

impl SubscriptionLimits {
    /// Limits applied to users without a storage record
    pub fn basic_default() -> Self {
        Self {
            max_file_size: BASIC.max_file_size,
            total_storage_limit: BASIC.total_storage,
            current_storage_used: 0,
            can_upload: true,
            tier_name: BASIC.name.to_string(),
        }
    }

    /// Remaining storage; negative when usage exceeds the limit
    pub fn available_storage(&self) -> i64 {
        self.total_storage_limit.saturating_sub(self.current_storage_used)
    }
}

/// Decision for a prospective upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileUploadValidation {
    pub can_upload: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub max_file_size: i64,
    pub available_storage: i64,
}

pub const UPLOAD_CHECK_FAILED: &str = "Error checking upload permissions";
pub const UPLOAD_NOT_ALLOWED: &str = "Upload not allowed";

#[derive(Clone)]
pub struct QuotaEngine {
    backend: Arc<dyn StorageBackend>,
}

impl QuotaEngine {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self { backend }
    }

    /// Current caps, usage and tier name for a user
    pub async fn get_user_subscription_limits(&self, user_id: &str) -> SubscriptionLimits {
        let record = match self.backend.storage_record(user_id).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                debug!("No storage record for user {}, using Basic limits", user_id);
                return SubscriptionLimits::basic_default();
            }
            Err(e) => {
                warn!("Failed to load storage record for user {}: {}", user_id, e);
                return SubscriptionLimits::basic_default();
            }
        };

        let tier_name = match self.backend.active_product_name(user_id).await {
            Ok(Some(name)) if !name.is_empty() => name,
            Ok(_) => BASIC.name.to_string(),
            Err(e) => {
                warn!("Failed to load subscription for user {}: {}", user_id, e);
                BASIC.name.to_string()
            }
        };

        SubscriptionLimits {
            max_file_size: record.max_file_size_limit,
            total_storage_limit: record.total_storage_limit,
            current_storage_used: record.total_storage_used,
            can_upload: record.total_storage_used < record.total_storage_limit,
            tier_name,
        }
    }

    /// Decide whether `user_id` may upload `file_size` more bytes.
    ///
    /// A denial carries the most specific reason available: the per-file cap
    /// is reported before the aggregate storage cap.
    pub async fn validate_file_upload(&self, user_id: &str, file_size: i64) -> FileUploadValidation {
        let allowed = match self.backend.can_user_upload_file(user_id, file_size).await {
            Ok(allowed) => allowed,
            Err(e) => {
                warn!("Upload check failed for user {}: {}", user_id, e);
                return FileUploadValidation {
                    can_upload: false,
                    reason: Some(UPLOAD_CHECK_FAILED.to_string()),
                    max_file_size: 0,
                    available_storage: 0,
                };
            }
        };

        let limits = self.get_user_subscription_limits(user_id).await;

        if !allowed {
            let reason = denial_reason(&limits, file_size);
            debug!("Upload of {} bytes denied for user {}: {}", file_size, user_id, reason);
            return FileUploadValidation {
                can_upload: false,
                reason: Some(reason),
                max_file_size: limits.max_file_size,
                available_storage: limits.available_storage(),
            };
        }

        FileUploadValidation {
            can_upload: true,
            reason: None,
            max_file_size: limits.max_file_size,
            available_storage: limits.available_storage(),
        }
    }

    /// Record `file_size` bytes of new usage; false if the backend call failed
    pub async fn update_storage_usage(&self, user_id: &str, file_size: i64) -> bool {
        match self.backend.update_storage_usage(user_id, file_size).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to record usage for user {}: {}", user_id, e);
                false
            }
        }
    }

    /// Reset a user's caps to the named product tier; false if the backend call failed
    pub async fn update_user_storage_limits(&self, user_id: &str, product_name: &str) -> bool {
        match self
            .backend
            .update_storage_limits_for_subscription(user_id, product_name)
            .await
        {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to update limits for user {}: {}", user_id, e);
                false
            }
        }
    }
}

fn denial_reason(limits: &SubscriptionLimits, file_size: i64) -> String {
    if file_size > limits.max_file_size {
        format!(
            "File size ({}) exceeds your plan limit of {}",
            format_bytes(file_size),
            format_bytes(limits.max_file_size)
        )
    } else if limits.current_storage_used.saturating_add(file_size) > limits.total_storage_limit {
        format!(
            "Not enough storage space. Need {} but only {} available",
            format_bytes(file_size),
            format_bytes(limits.available_storage())
        )
    } else {
        UPLOAD_NOT_ALLOWED.to_string()
    }
}
