//! Subscription quota engine
//!
//! Decides whether a user may upload a file of a given size and keeps the
//! per-user storage counter current. Persistence sits behind
//! [`StorageBackend`]; [`SqliteBackend`] is the bundled implementation.

pub mod backend;
pub mod engine;
pub mod error;
pub mod format;
pub mod sqlite;
pub mod tiers;

pub use backend::{StorageBackend, StorageRecord, SubscriptionStatus};
pub use engine::{FileUploadValidation, QuotaEngine, SubscriptionLimits};
pub use error::BackendError;
pub use format::{format_bytes, format_bytes_with_decimals, get_storage_usage_percentage};
pub use sqlite::SqliteBackend;
pub use tiers::{get_subscription_tier_info, TierInfo, BASIC, ENTERPRISE, PRO, TIERS};
