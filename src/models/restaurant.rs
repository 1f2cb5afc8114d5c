//! Restaurant model.

use serde::{Deserialize, Serialize};

use super::{Account, BenefitAvailabilityPolicy, Dining, MerchantNumber, MonetaryAmount, Percentage};

/// A merchant that pays dining rewards to member accounts.
///
/// Restaurants are reference data: they are built once from the backing
/// store and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Restaurant {
    /// Unique merchant number.
    pub merchant_number: MerchantNumber,
    /// Display name.
    pub name: String,
    /// Fraction of each bill paid out as a reward.
    pub benefit_percentage: Percentage,
    /// Decides which dining events earn a reward.
    #[serde(default)]
    pub benefit_availability_policy: BenefitAvailabilityPolicy,
}

impl Restaurant {
    /// Computes the reward earned by `account` for `dining`.
    ///
    /// Returns zero when the availability policy rejects the dining.
    #[inline]
    #[must_use]
    pub fn calculate_benefit_for(&self, account: &Account, dining: &Dining) -> MonetaryAmount {
        if self
            .benefit_availability_policy
            .is_benefit_available_for(account, dining)
        {
            dining.amount * self.benefit_percentage
        } else {
            MonetaryAmount::zero()
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;
    use crate::models::AccountNumber;

    fn restaurant(policy: BenefitAvailabilityPolicy) -> Restaurant {
        Restaurant {
            merchant_number: MerchantNumber::from("1234567890"),
            name: "Pizza Bob's".to_owned(),
            benefit_percentage: Percentage::parse("0.08").unwrap(),
            benefit_availability_policy: policy,
        }
    }

    #[test]
    fn benefit_when_available() {
        let account = Account::new(AccountNumber::from("123456789"), "Keith and Keri Donald");
        let dining = Dining::create("100.00", "1234123412341234", "1234567890").unwrap();
        let benefit = restaurant(BenefitAvailabilityPolicy::AlwaysAvailable)
            .calculate_benefit_for(&account, &dining);
        assert_eq!(benefit, MonetaryAmount::new(dec!(8.00)));
    }

    #[test]
    fn no_benefit_when_never_available() {
        let account = Account::new(AccountNumber::from("123456789"), "Keith and Keri Donald");
        let dining = Dining::create("100.00", "1234123412341234", "1234567890").unwrap();
        let benefit = restaurant(BenefitAvailabilityPolicy::NeverAvailable)
            .calculate_benefit_for(&account, &dining);
        assert!(benefit.is_zero());
    }
}
