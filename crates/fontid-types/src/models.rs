use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Subscription tiers offered on the plans page.
///
/// The credential store keeps the plan as free text, so a stored value is not
/// guaranteed to parse back into one of these.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Plan {
    #[default]
    Free,
    Basic,
    Premium,
}

impl Plan {
    pub const ALL: [Plan; 3] = [Plan::Free, Plan::Basic, Plan::Premium];

    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Free => "Free",
            Plan::Basic => "Basic",
            Plan::Premium => "Premium",
        }
    }

    /// Monthly price in cents.
    pub fn monthly_price_cents(&self) -> u32 {
        match self {
            Plan::Free => 0,
            Plan::Basic => 500,
            Plan::Premium => 1000,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Plan::Free => "Limited features, watermark recordings.",
            Plan::Basic => "Unlimited recordings, no watermark.",
            Plan::Premium => "All features + priority support.",
        }
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownPlan(pub String);

impl fmt::Display for UnknownPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown plan: {}", self.0)
    }
}

impl std::error::Error for UnknownPlan {}

impl FromStr for Plan {
    type Err = UnknownPlan;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Plan::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownPlan(s.to_string()))
    }
}

/// Public view of a stored account. Never carries the password hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub username: String,
    pub plan: String,
    pub created_at: DateTime<Utc>,
    pub expiry_date: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_parse() {
        assert_eq!("Basic".parse::<Plan>(), Ok(Plan::Basic));
        assert_eq!(" premium ".parse::<Plan>(), Ok(Plan::Premium));
        assert!("Gold".parse::<Plan>().is_err());
    }

    #[test]
    fn test_plan_default_is_free() {
        assert_eq!(Plan::default(), Plan::Free);
        assert_eq!(Plan::Free.monthly_price_cents(), 0);
    }
}
