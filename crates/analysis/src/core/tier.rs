use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::InputValidationError;

/// Subscription level controlling how deep the requested analysis goes.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    #[default]
    Free,
    Pro,
    Enterprise,
}

const FREE_CATEGORIES: &[&str] = &[
    "Reentrancy",
    "Integer overflow and underflow",
    "Access control",
    "Unchecked external call results",
];

const PRO_CATEGORIES: &[&str] = &[
    "Front-running and transaction-ordering dependence",
    "Timestamp dependence",
    "Denial of service (gas limits, unbounded loops)",
];

const ENTERPRISE_CATEGORIES: &[&str] = &[
    "Oracle and price manipulation",
    "Flash-loan attack surfaces",
    "Business-logic flaws",
    "Upgradeability and proxy storage collisions",
    "Cross-contract interaction risks",
];

impl Tier {
    pub const ALL: [Tier; 3] = [Tier::Free, Tier::Pro, Tier::Enterprise];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Pro => "pro",
            Self::Enterprise => "enterprise",
        }
    }

    /// Vulnerability categories requested at this tier.
    ///
    /// Lists are cumulative: every category of a lower tier is also requested
    /// by every higher tier, in the same order.
    pub fn vulnerability_categories(&self) -> Vec<&'static str> {
        let mut categories = FREE_CATEGORIES.to_vec();
        if *self >= Tier::Pro {
            categories.extend_from_slice(PRO_CATEGORIES);
        }
        if *self >= Tier::Enterprise {
            categories.extend_from_slice(ENTERPRISE_CATEGORIES);
        }
        categories
    }

    /// Lowers the tier to `ceiling` when it asks for more than the ceiling allows.
    pub fn capped_at(self, ceiling: Tier) -> Tier {
        self.min(ceiling)
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Tier {
    type Err = InputValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "free" => Ok(Tier::Free),
            "pro" => Ok(Tier::Pro),
            "enterprise" => Ok(Tier::Enterprise),
            _ => Err(InputValidationError::InvalidTier(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tier_markers() {
        assert_eq!("free".parse::<Tier>().unwrap(), Tier::Free);
        assert_eq!(" Pro ".parse::<Tier>().unwrap(), Tier::Pro);
        assert_eq!("ENTERPRISE".parse::<Tier>().unwrap(), Tier::Enterprise);
    }

    #[test]
    fn test_parse_rejects_unknown_tier() {
        let err = "platinum".parse::<Tier>().unwrap_err();
        assert_eq!(err, InputValidationError::InvalidTier("platinum".to_string()));
        assert!("".parse::<Tier>().is_err());
    }

    #[test]
    fn test_categories_are_cumulative() {
        let free = Tier::Free.vulnerability_categories();
        let pro = Tier::Pro.vulnerability_categories();
        let enterprise = Tier::Enterprise.vulnerability_categories();

        assert!(free.len() < pro.len());
        assert!(pro.len() < enterprise.len());
        assert!(free.iter().all(|c| pro.contains(c)));
        assert!(pro.iter().all(|c| enterprise.contains(c)));
    }

    #[test]
    fn test_capped_at_ceiling() {
        assert_eq!(Tier::Enterprise.capped_at(Tier::Pro), Tier::Pro);
        assert_eq!(Tier::Free.capped_at(Tier::Enterprise), Tier::Free);
    }

    #[test]
    fn test_serde_uses_lowercase() {
        assert_eq!(serde_json::to_string(&Tier::Enterprise).unwrap(), "\"enterprise\"");
        let tier: Tier = serde_json::from_str("\"pro\"").unwrap();
        assert_eq!(tier, Tier::Pro);
    }
}
