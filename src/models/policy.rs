//! Benefit availability policies attached to restaurants.

use core::fmt;

use serde::{Deserialize, Serialize};

use super::{Account, Dining};

/// Decides whether a dining event qualifies for a restaurant's benefit.
///
/// Each variant is identified by a one-character discriminator code stored
/// alongside the restaurant row. New variants that need extra per-row
/// configuration (weekday restrictions, monthly caps) can be added here and
/// wired into [`BenefitAvailabilityPolicy::from_code`] without touching the
/// cache contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[non_exhaustive]
pub enum BenefitAvailabilityPolicy {
    /// The benefit is always available (code `"A"`).
    #[default]
    #[serde(rename = "A")]
    AlwaysAvailable,
    /// The benefit is never available (code `"N"`).
    #[serde(rename = "N")]
    NeverAvailable,
}

impl BenefitAvailabilityPolicy {
    /// Code for [`BenefitAvailabilityPolicy::AlwaysAvailable`].
    pub const ALWAYS_AVAILABLE_CODE: &'static str = "A";
    /// Code for [`BenefitAvailabilityPolicy::NeverAvailable`].
    pub const NEVER_AVAILABLE_CODE: &'static str = "N";

    /// Resolves a discriminator code to a policy.
    ///
    /// Returns `None` for codes that do not name a known policy.
    #[inline]
    #[must_use]
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            Self::ALWAYS_AVAILABLE_CODE => Some(Self::AlwaysAvailable),
            Self::NEVER_AVAILABLE_CODE => Some(Self::NeverAvailable),
            _ => None,
        }
    }

    /// Returns the discriminator code stored with the restaurant row.
    #[inline]
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::AlwaysAvailable => Self::ALWAYS_AVAILABLE_CODE,
            Self::NeverAvailable => Self::NEVER_AVAILABLE_CODE,
        }
    }

    /// Returns `true` if the benefit applies to this account and dining.
    #[inline]
    #[must_use]
    pub const fn is_benefit_available_for(self, _account: &Account, _dining: &Dining) -> bool {
        match self {
            Self::AlwaysAvailable => true,
            Self::NeverAvailable => false,
        }
    }
}

impl fmt::Display for BenefitAvailabilityPolicy {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match *self {
            Self::AlwaysAvailable => "alwaysAvailable",
            Self::NeverAvailable => "neverAvailable",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::models::{AccountNumber, MerchantNumber, MonetaryAmount};

    fn dining() -> Dining {
        Dining::new(
            MonetaryAmount::parse("100.00").unwrap(),
            "1234123412341234".to_owned(),
            MerchantNumber::from("1234567890"),
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        )
    }

    #[test]
    fn codes_resolve() {
        assert_eq!(
            BenefitAvailabilityPolicy::from_code("A"),
            Some(BenefitAvailabilityPolicy::AlwaysAvailable)
        );
        assert_eq!(
            BenefitAvailabilityPolicy::from_code("N"),
            Some(BenefitAvailabilityPolicy::NeverAvailable)
        );
        assert_eq!(BenefitAvailabilityPolicy::from_code("X"), None);
        assert_eq!(BenefitAvailabilityPolicy::from_code("a"), None);
    }

    #[test]
    fn code_roundtrips_through_from_code() {
        for policy in [
            BenefitAvailabilityPolicy::AlwaysAvailable,
            BenefitAvailabilityPolicy::NeverAvailable,
        ] {
            assert_eq!(BenefitAvailabilityPolicy::from_code(policy.code()), Some(policy));
        }
    }

    #[test]
    fn availability() {
        let account = Account::new(AccountNumber::from("123456789"), "Keith and Keri Donald");
        let dining = dining();
        assert!(BenefitAvailabilityPolicy::AlwaysAvailable.is_benefit_available_for(&account, &dining));
        assert!(!BenefitAvailabilityPolicy::NeverAvailable.is_benefit_available_for(&account, &dining));
    }

    #[test]
    fn display_names() {
        assert_eq!(BenefitAvailabilityPolicy::AlwaysAvailable.to_string(), "alwaysAvailable");
        assert_eq!(BenefitAvailabilityPolicy::NeverAvailable.to_string(), "neverAvailable");
    }
}
