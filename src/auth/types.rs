//! Domain types shared by the token, key, and gateway services.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Subscription tier attached to a user account.
///
/// Stored as lowercase text; tiers only gate quotas and features outside
/// this crate, so no ordering is implied here.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionTier {
    Free,
    Basic,
    Premium,
    Enterprise,
}

impl SubscriptionTier {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Basic => "basic",
            Self::Premium => "premium",
            Self::Enterprise => "enterprise",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "free" => Some(Self::Free),
            "basic" => Some(Self::Basic),
            "premium" => Some(Self::Premium),
            "enterprise" => Some(Self::Enterprise),
            _ => None,
        }
    }
}

/// A resource name plus the action names allowed on it.
///
/// A key carries several permissions; a capability is granted when any of
/// them names the resource and the action. Matching is exact string
/// equality, there is no wildcard grammar.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub resource: String,
    pub actions: Vec<String>,
}

impl Permission {
    #[must_use]
    pub fn allows(&self, resource: &str, action: &str) -> bool {
        self.resource == resource && self.actions.iter().any(|a| a == action)
    }
}

/// Quota policy attached to an api key at creation.
///
/// Immutable for the key's lifetime; changing limits means re-issuing the
/// key. `max_servers` is an advisory concurrency ceiling enforced by
/// callers, not by the rate limiter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimit {
    pub requests_per_hour: u32,
    pub requests_per_day: u32,
    pub max_servers: u32,
}

/// Snapshot of a key's quota after one accounting step. Derived, never
/// stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateLimitStatus {
    /// Requests left in the binding window after this call.
    pub remaining: u32,
    /// Instant the binding window closes and its counter resets.
    pub reset_time: OffsetDateTime,
    pub exceeded: bool,
}

/// Issued session credential. Proven by signature and expiry, never stored.
#[derive(Clone, Debug)]
pub struct AuthToken {
    pub token: String,
    pub user_id: Uuid,
    pub expires_at: OffsetDateTime,
}

/// Result of validating a raw api key string.
///
/// `Expired` is reported separately from `Invalid` so the gateway can
/// surface the distinct expiry outcome; both are failures to validate.
#[derive(Clone, Debug)]
pub enum ApiKeyValidation {
    Invalid,
    Expired,
    Valid {
        key_id: Uuid,
        user_id: Uuid,
        permissions: Vec<Permission>,
        rate_limit: RateLimit,
    },
}

impl ApiKeyValidation {
    #[must_use]
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid { .. })
    }

    /// Union check across the key's permissions.
    #[must_use]
    pub fn allows(&self, resource: &str, action: &str) -> bool {
        match self {
            Self::Invalid | Self::Expired => false,
            Self::Valid { permissions, .. } => {
                permissions.iter().any(|p| p.allows(resource, action))
            }
        }
    }
}

/// Authenticated identity attached to a request after authorization.
///
/// `permissions` is `Some` for api-key principals and `None` for session
/// principals, which act with the full authority of the user.
#[derive(Clone, Debug)]
pub struct Principal {
    pub user_id: Uuid,
    pub permissions: Option<Vec<Permission>>,
}

impl Principal {
    /// Session principals are unscoped; key principals use union matching.
    #[must_use]
    pub fn allows(&self, resource: &str, action: &str) -> bool {
        match &self.permissions {
            None => true,
            Some(permissions) => permissions.iter().any(|p| p.allows(resource, action)),
        }
    }
}
