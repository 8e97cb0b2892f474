//! Recording visibility policy
//!
//! A host chooses how long a demo recording stays visible. The allowed
//! maximum depends on who they are:
//!
//! | Host                         | Max days |
//! |------------------------------|----------|
//! | admin role or enterprise plan | 365      |
//! | trial subscription           | 7        |
//! | everyone else                | 30       |
//!
//! The policy is evaluated server-side against the authoritative
//! subscription, never against values supplied by the client.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::{Plan, Role, SubscriptionSnapshot, SubscriptionStatus};

pub const MIN_VISIBILITY_DAYS: i64 = 1;
pub const TRIAL_MAX_VISIBILITY_DAYS: i64 = 7;
pub const STANDARD_MAX_VISIBILITY_DAYS: i64 = 30;
pub const EXTENDED_MAX_VISIBILITY_DAYS: i64 = 365;

/// Longest visibility window a host may grant.
pub fn max_visibility_days(role: Role, plan: Plan, status: SubscriptionStatus) -> i64 {
    if role.is_admin() || plan == Plan::Enterprise {
        EXTENDED_MAX_VISIBILITY_DAYS
    } else if status == SubscriptionStatus::Trial {
        TRIAL_MAX_VISIBILITY_DAYS
    } else {
        STANDARD_MAX_VISIBILITY_DAYS
    }
}

/// A granted visibility window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordingVisibility {
    pub requested_days: i64,
    pub granted_days: i64,
    pub visible_until: DateTime<Utc>,
}

impl RecordingVisibility {
    /// Clamp `requested_days` into `[1, max]` for this host and compute the expiry.
    pub fn grant(host: &SubscriptionSnapshot, requested_days: i64, now: DateTime<Utc>) -> Self {
        let max = max_visibility_days(host.role, host.plan, host.status);
        let granted_days = requested_days.clamp(MIN_VISIBILITY_DAYS, max);

        Self {
            requested_days,
            granted_days,
            visible_until: now + Duration::days(granted_days),
        }
    }

    pub fn was_clamped(&self) -> bool {
        self.granted_days != self.requested_days
    }
}
