//! Storage backend interface
//!
//! The quota engine never touches persistence directly. It reads the
//! per-user storage record and active subscription, and calls the backend's
//! decision and accounting procedures through this trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::BackendError;
use crate::tiers::BASIC;

/// Stored size and storage caps for one user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageRecord {
    pub user_id: String,
    pub max_file_size_limit: i64,
    pub total_storage_limit: i64,
    pub total_storage_used: i64,
}

impl StorageRecord {
    /// Record a user gets before any usage or subscription is stored
    pub fn basic(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            max_file_size_limit: BASIC.max_file_size,
            total_storage_limit: BASIC.total_storage,
            total_storage_used: 0,
        }
    }

    /// Whether a file of `file_size` bytes fits both caps
    pub fn admits(&self, file_size: i64) -> bool {
        file_size <= self.max_file_size_limit
            && self.total_storage_used.saturating_add(file_size) <= self.total_storage_limit
    }
}

/// Lifecycle state of a subscription row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Trialing,
    PastDue,
    Canceled,
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubscriptionStatus::Active => write!(f, "active"),
            SubscriptionStatus::Trialing => write!(f, "trialing"),
            SubscriptionStatus::PastDue => write!(f, "past_due"),
            SubscriptionStatus::Canceled => write!(f, "canceled"),
        }
    }
}

#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// The user's storage row, if one exists
    async fn storage_record(&self, user_id: &str) -> Result<Option<StorageRecord>, BackendError>;

    /// Display name of the product behind the user's active subscription
    async fn active_product_name(&self, user_id: &str) -> Result<Option<String>, BackendError>;

    /// Upload eligibility decision; must not modify state
    async fn can_user_upload_file(&self, user_id: &str, file_size: i64)
        -> Result<bool, BackendError>;

    /// Add `file_size` to the user's used-storage counter
    async fn update_storage_usage(&self, user_id: &str, file_size: i64)
        -> Result<(), BackendError>;

    /// Overwrite the user's caps with those of the named product tier
    async fn update_storage_limits_for_subscription(
        &self,
        user_id: &str,
        product_name: &str,
    ) -> Result<(), BackendError>;
}
