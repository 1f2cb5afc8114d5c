//! Dining events charged at restaurants in the network.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::{MerchantNumber, MonetaryAmount};
use crate::error::{Result, RewardsError};

/// A meal paid with a member's credit card at a network restaurant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dining {
    /// Total bill.
    pub amount: MonetaryAmount,
    /// Card the bill was charged to.
    pub credit_card_number: String,
    /// Restaurant where the meal took place.
    pub merchant_number: MerchantNumber,
    /// Day of the meal.
    pub date: NaiveDate,
}

impl Dining {
    /// Creates a dining event on the given date.
    #[inline]
    #[must_use]
    pub const fn new(
        amount: MonetaryAmount,
        credit_card_number: String,
        merchant_number: MerchantNumber,
        date: NaiveDate,
    ) -> Self {
        Self {
            amount,
            credit_card_number,
            merchant_number,
            date,
        }
    }

    /// Creates a dining event dated today from textual input, e.g.
    /// `Dining::create("100.00", "1234123412341234", "1234567890")`.
    ///
    /// # Errors
    ///
    /// Returns [`RewardsError::InvalidAmount`] if `amount` is not a
    /// decimal number or is negative.
    #[inline]
    pub fn create(amount: &str, credit_card_number: &str, merchant_number: &str) -> Result<Self> {
        let bill = MonetaryAmount::parse(amount)?;
        if bill.is_negative() {
            return Err(RewardsError::InvalidAmount(format!(
                "dining amount {bill} is negative"
            )));
        }
        Ok(Self::new(
            bill,
            credit_card_number.to_owned(),
            MerchantNumber::from(merchant_number),
            Utc::now().date_naive(),
        ))
    }
}
