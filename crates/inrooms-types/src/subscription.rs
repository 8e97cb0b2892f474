//! Subscription types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ParseEnumError, Plan, Role, UserId};

/// Subscription status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    /// Free trial, valid until `trial_ends_at`
    Trial,
    /// Paid and current
    Active,
    /// Latest invoice failed
    PastDue,
    /// Subscription was canceled
    Canceled,
    /// Checkout never completed or trial lapsed
    Expired,
}

impl SubscriptionStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Trial => "trial",
            Self::Active => "active",
            Self::PastDue => "past_due",
            Self::Canceled => "canceled",
            Self::Expired => "expired",
        }
    }

    /// Map a Stripe subscription status onto ours.
    ///
    /// `incomplete` is the state of a subscription whose first payment is
    /// still in flight; it says nothing about access, so it maps to `None`.
    pub fn from_stripe(status: &str) -> Option<Self> {
        match status {
            "incomplete" => None,
            "active" => Some(Self::Active),
            "trialing" => Some(Self::Trial),
            "past_due" | "unpaid" => Some(Self::PastDue),
            "canceled" => Some(Self::Canceled),
            _ => Some(Self::Expired),
        }
    }
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SubscriptionStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "trial" => Ok(Self::Trial),
            "active" => Ok(Self::Active),
            "past_due" => Ok(Self::PastDue),
            "canceled" => Ok(Self::Canceled),
            "expired" => Ok(Self::Expired),
            _ => Err(ParseEnumError::new("subscription status", s)),
        }
    }
}

/// The authoritative subscription and quota state of a user.
///
/// This is what `get_user_subscription` returns and what the Firestore copy
/// mirrors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionSnapshot {
    pub user_id: UserId,
    pub status: SubscriptionStatus,
    pub plan: Plan,
    pub role: Role,
    pub events_quota: i32,
    pub events_used: i32,
    pub trial_ends_at: Option<DateTime<Utc>>,
}

impl SubscriptionSnapshot {
    /// Whether the subscription currently admits new registrations.
    ///
    /// A trial without an end date never lapses.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        match self.status {
            SubscriptionStatus::Active => true,
            SubscriptionStatus::Trial => self.trial_ends_at.is_none_or(|end| end > now),
            _ => false,
        }
    }

    /// Registrations left in the current period (admins are unlimited).
    pub fn remaining_events(&self) -> Option<i32> {
        if self.role.is_admin() {
            None
        } else {
            Some((self.events_quota - self.events_used).max(0))
        }
    }

    /// True when a non-admin user has used the whole quota.
    pub fn quota_exhausted(&self) -> bool {
        !self.role.is_admin() && self.events_used >= self.events_quota
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn snapshot(status: SubscriptionStatus, used: i32, quota: i32) -> SubscriptionSnapshot {
        SubscriptionSnapshot {
            user_id: UserId::new(),
            status,
            plan: Plan::Starter,
            role: Role::User,
            events_quota: quota,
            events_used: used,
            trial_ends_at: None,
        }
    }

    #[test]
    fn test_trial_expiry() {
        let now = Utc::now();
        let mut snap = snapshot(SubscriptionStatus::Trial, 0, 3);
        assert!(snap.is_active_at(now));

        snap.trial_ends_at = Some(now - Duration::hours(1));
        assert!(!snap.is_active_at(now));

        snap.trial_ends_at = Some(now + Duration::days(1));
        assert!(snap.is_active_at(now));
    }

    #[test]
    fn test_inactive_statuses() {
        let now = Utc::now();
        for status in [
            SubscriptionStatus::PastDue,
            SubscriptionStatus::Canceled,
            SubscriptionStatus::Expired,
        ] {
            assert!(!snapshot(status, 0, 5).is_active_at(now));
        }
    }

    #[test]
    fn test_quota_exhausted_at_boundary() {
        assert!(!snapshot(SubscriptionStatus::Active, 4, 5).quota_exhausted());
        assert!(snapshot(SubscriptionStatus::Active, 5, 5).quota_exhausted());

        let mut admin = snapshot(SubscriptionStatus::Active, 9, 5);
        admin.role = Role::Admin;
        assert!(!admin.quota_exhausted());
        assert_eq!(admin.remaining_events(), None);
    }

    #[test]
    fn test_stripe_status_mapping() {
        assert_eq!(
            SubscriptionStatus::from_stripe("trialing"),
            Some(SubscriptionStatus::Trial)
        );
        assert_eq!(
            SubscriptionStatus::from_stripe("unpaid"),
            Some(SubscriptionStatus::PastDue)
        );
        assert_eq!(
            SubscriptionStatus::from_stripe("incomplete_expired"),
            Some(SubscriptionStatus::Expired)
        );
        assert_eq!(SubscriptionStatus::from_stripe("incomplete"), None);
    }
}
