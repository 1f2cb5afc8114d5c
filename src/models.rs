//! Data models for the reward network.
//!
//! This module contains the restaurant reference data and its raw row
//! form, member accounts, dining events, reward confirmations, newtype
//! identifiers, and the decimal value types used for money.

mod account;
mod dining;
mod ids;
mod money;
mod policy;
mod restaurant;
mod reward;
mod row;

pub use account::{Account, AccountContribution, Beneficiary, Distribution};
pub use chrono::NaiveDate;
pub use dining::Dining;
pub use ids::{AccountNumber, ConfirmationNumber, MerchantNumber};
pub use money::{MonetaryAmount, Percentage};
pub use policy::BenefitAvailabilityPolicy;
pub use restaurant::Restaurant;
pub use reward::RewardConfirmation;
pub use row::RestaurantRow;
