//! Subscription plans and their event quotas

use serde::{Deserialize, Serialize};

use crate::ParseEnumError;

/// Events a new user may register for during the trial
pub const TRIAL_EVENTS_QUOTA: i32 = 3;

/// Length of the free trial granted at signup
pub const TRIAL_DAYS: i64 = 14;

/// Paid subscription plans
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    /// Entry plan, 5 events per billing period
    Starter,
    /// 15 events per billing period
    Professional,
    /// 50 events per billing period, extended recording visibility
    Enterprise,
}

impl Plan {
    /// Event registrations allowed per billing period
    pub const fn events_quota(&self) -> i32 {
        match self {
            Self::Starter => 5,
            Self::Professional => 15,
            Self::Enterprise => 50,
        }
    }

    /// All plans, cheapest first
    pub const fn all() -> [Plan; 3] {
        [Self::Starter, Self::Professional, Self::Enterprise]
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Starter => "starter",
            Self::Professional => "professional",
            Self::Enterprise => "enterprise",
        }
    }
}

impl std::fmt::Display for Plan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Plan {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "starter" | "basic" => Ok(Self::Starter),
            "professional" | "pro" => Ok(Self::Professional),
            "enterprise" => Ok(Self::Enterprise),
            _ => Err(ParseEnumError::new("plan", s)),
        }
    }
}

/// User role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
        }
    }

    pub const fn is_admin(&self) -> bool {
        matches!(self, Self::Admin)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "admin" => Ok(Self::Admin),
            _ => Err(ParseEnumError::new("role", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quotas_increase_with_plan() {
        let quotas: Vec<i32> = Plan::all().iter().map(Plan::events_quota).collect();
        assert!(quotas.windows(2).all(|w| w[0] < w[1]));
        assert!(TRIAL_EVENTS_QUOTA < Plan::Starter.events_quota());
    }

    #[test]
    fn test_plan_parse_aliases() {
        assert_eq!("pro".parse::<Plan>().unwrap(), Plan::Professional);
        assert_eq!("Enterprise".parse::<Plan>().unwrap(), Plan::Enterprise);
        assert!("gold".parse::<Plan>().is_err());
    }

    #[test]
    fn test_role_roundtrip_str() {
        for role in [Role::User, Role::Admin] {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
    }
}
