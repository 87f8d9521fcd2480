//! Subscription tier catalog

use serde::Serialize;

const MB: i64 = 1024 * 1024;
const GB: i64 = 1024 * MB;

/// Size and storage caps of a named subscription tier
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TierInfo {
    pub name: &'static str,
    pub max_file_size: i64,
    pub total_storage: i64,
    pub price: &'static str,
    pub features: &'static [&'static str],
}

pub const BASIC: TierInfo = TierInfo {
    name: "Basic",
    max_file_size: 10 * MB,
    total_storage: 100 * MB,
    price: "$9/month",
    features: &["Basic PDF processing", "10MB file limit", "100MB storage"],
};

pub const PRO: TierInfo = TierInfo {
    name: "Pro",
    max_file_size: 50 * MB,
    total_storage: GB,
    price: "$19/month",
    features: &[
        "Advanced PDF processing",
        "50MB file limit",
        "1GB storage",
        "Priority support",
    ],
};

pub const ENTERPRISE: TierInfo = TierInfo {
    name: "Enterprise",
    max_file_size: 100 * MB,
    total_storage: 10 * GB,
    price: "$49/month",
    features: &[
        "Premium PDF processing",
        "100MB file limit",
        "10GB storage",
        "Priority support",
        "API access",
    ],
};

pub static TIERS: [TierInfo; 3] = [BASIC, PRO, ENTERPRISE];

/// Look up a tier by exact name, falling back to Basic
pub fn get_subscription_tier_info(name: &str) -> &'static TierInfo {
    TIERS.iter().find(|tier| tier.name == name).unwrap_or(&TIERS[0])
}
