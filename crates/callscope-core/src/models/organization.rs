//! Organization domain model.
//!
//! Organizations are the tenant boundary: every user, agent, transcript,
//! call type and API key belongs to exactly one of them. A single
//! organization may be flagged `is_master`, which grants its members
//! visibility across all tenants.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum SubscriptionTier {
    #[default]
    Free,
    Basic,
    Professional,
    Enterprise,
}

impl SubscriptionTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionTier::Free => "Free",
            SubscriptionTier::Basic => "Basic",
            SubscriptionTier::Professional => "Professional",
            SubscriptionTier::Enterprise => "Enterprise",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Free" => Some(SubscriptionTier::Free),
            "Basic" => Some(SubscriptionTier::Basic),
            "Professional" => Some(SubscriptionTier::Professional),
            "Enterprise" => Some(SubscriptionTier::Enterprise),
            _ => None,
        }
    }

    /// Plan defaults applied when an organization is created without
    /// explicit feature flags.
    pub fn default_features(&self) -> OrganizationFeatures {
        match self {
            SubscriptionTier::Free => OrganizationFeatures {
                max_users: 5,
                max_calls: 100,
                api_access: false,
            },
            SubscriptionTier::Basic => OrganizationFeatures {
                max_users: 20,
                max_calls: 1_000,
                api_access: false,
            },
            SubscriptionTier::Professional => OrganizationFeatures {
                max_users: 100,
                max_calls: 10_000,
                api_access: true,
            },
            // Zero means unlimited.
            SubscriptionTier::Enterprise => OrganizationFeatures {
                max_users: 0,
                max_calls: 0,
                api_access: true,
            },
        }
    }
}

/// Plan limits. A limit of `0` is unlimited.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationFeatures {
    pub max_users: u64,
    pub max_calls: u64,
    pub api_access: bool,
}

impl OrganizationFeatures {
    pub fn allows_users(&self, current: u64) -> bool {
        self.max_users == 0 || current < self.max_users
    }

    pub fn allows_calls(&self, current: u64) -> bool {
        self.max_calls == 0 || current < self.max_calls
    }
}

/// Usage counters. Maintained by separate writes after the primary
/// write succeeds, so they may drift after a crash.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationUsage {
    pub user_count: u64,
    pub call_count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Organization {
    pub id: Uuid,
    pub name: String,
    /// Short unique code (upper-case, e.g. `ACME`).
    pub code: String,
    pub subscription_tier: SubscriptionTier,
    pub features: OrganizationFeatures,
    pub usage: OrganizationUsage,
    pub is_master: bool,
    pub is_active: bool,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrganization {
    pub name: String,
    pub code: String,
    #[serde(default)]
    pub subscription_tier: SubscriptionTier,
    /// Falls back to the tier's defaults.
    pub features: Option<OrganizationFeatures>,
    #[serde(default)]
    pub is_master: bool,
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOrganization {
    pub name: Option<String>,
    pub subscription_tier: Option<SubscriptionTier>,
    pub features: Option<OrganizationFeatures>,
    pub is_active: Option<bool>,
    pub metadata: Option<serde_json::Value>,
}

/// Normalizes a user-supplied organization code.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_limit_is_unlimited() {
        let features = SubscriptionTier::Enterprise.default_features();
        assert!(features.allows_users(1_000_000));
        assert!(features.allows_calls(u64::MAX - 1));
    }

    #[test]
    fn limits_are_exclusive_upper_bounds() {
        let features = SubscriptionTier::Free.default_features();
        assert!(features.allows_users(4));
        assert!(!features.allows_users(5));
        assert!(features.allows_calls(99));
        assert!(!features.allows_calls(100));
    }

    #[test]
    fn tier_names_roundtrip() {
        for tier in [
            SubscriptionTier::Free,
            SubscriptionTier::Basic,
            SubscriptionTier::Professional,
            SubscriptionTier::Enterprise,
        ] {
            assert_eq!(SubscriptionTier::parse(tier.as_str()), Some(tier));
        }
        assert_eq!(SubscriptionTier::parse("Gold"), None);
    }

    #[test]
    fn code_is_trimmed_and_uppercased() {
        assert_eq!(normalize_code("  acme-1 "), "ACME-1");
    }
}
