//! Raw restaurant rows as exchanged with the backing store.

use serde::{Deserialize, Serialize};

use super::{BenefitAvailabilityPolicy, MerchantNumber, Percentage, Restaurant};
use crate::error::{Result, RewardsError};

/// One row of the restaurant table, columns kept in their stored form.
///
/// Serialized with the column names of the `T_RESTAURANT` table
/// (`MERCHANT_NUMBER`, `NAME`, `BENEFIT_PERCENTAGE`,
/// `BENEFIT_AVAILABILITY_POLICY`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct RestaurantRow {
    /// Merchant number column.
    pub merchant_number: String,
    /// Name column.
    pub name: String,
    /// Benefit percentage as a decimal string, e.g. `"0.08"`.
    pub benefit_percentage: String,
    /// Policy discriminator code; absent means always available.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub benefit_availability_policy: Option<String>,
}

impl RestaurantRow {
    /// Creates a row without a policy code.
    #[inline]
    #[must_use]
    pub fn new<M, N, P>(merchant_number: M, name: N, benefit_percentage: P) -> Self
    where
        M: Into<String>,
        N: Into<String>,
        P: Into<String>,
    {
        Self {
            merchant_number: merchant_number.into(),
            name: name.into(),
            benefit_percentage: benefit_percentage.into(),
            benefit_availability_policy: None,
        }
    }

    /// Sets the policy discriminator code.
    #[inline]
    #[must_use]
    pub fn with_policy<C: Into<String>>(mut self, code: C) -> Self {
        self.benefit_availability_policy = Some(code.into());
        self
    }

    /// Maps the row to a [`Restaurant`].
    ///
    /// # Errors
    ///
    /// Returns [`RewardsError::Mapping`] if the merchant number is empty,
    /// the benefit percentage is not a fraction in `[0, 1]`, or the policy
    /// code is unknown.
    #[inline]
    pub fn into_restaurant(self) -> Result<Restaurant> {
        if self.merchant_number.trim().is_empty() {
            return Err(RewardsError::mapping(
                self.merchant_number,
                "merchant number is empty",
            ));
        }
        let benefit_percentage = Percentage::parse(&self.benefit_percentage)
            .map_err(|err| RewardsError::mapping(self.merchant_number.clone(), err))?;
        let benefit_availability_policy = map_policy(
            &self.merchant_number,
            self.benefit_availability_policy.as_deref(),
        )?;
        Ok(Restaurant {
            merchant_number: MerchantNumber::new(self.merchant_number),
            name: self.name,
            benefit_percentage,
            benefit_availability_policy,
        })
    }
}

impl From<&Restaurant> for RestaurantRow {
    #[inline]
    fn from(restaurant: &Restaurant) -> Self {
        Self::new(
            restaurant.merchant_number.as_inner(),
            restaurant.name.as_str(),
            restaurant.benefit_percentage.as_decimal().to_string(),
        )
        .with_policy(restaurant.benefit_availability_policy.code())
    }
}

/// Resolves the policy discriminator column of a row.
fn map_policy(merchant_number: &str, code: Option<&str>) -> Result<BenefitAvailabilityPolicy> {
    code.map_or(Ok(BenefitAvailabilityPolicy::AlwaysAvailable), |raw| {
        BenefitAvailabilityPolicy::from_code(raw).ok_or_else(|| {
            RewardsError::mapping(merchant_number, format!("not a supported policy code {raw:?}"))
        })
    })
}
