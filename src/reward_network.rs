//! Reward calculation for dining events.

use crate::error::Result;
use crate::models::{Dining, RewardConfirmation};
use crate::repository::{AccountLookup, RestaurantLookup, RewardLedger};

/// Rewards member accounts for dining at network restaurants.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
///
/// use rewards_rs::cache::BlockingRestaurantCache;
/// use rewards_rs::models::{Account, AccountNumber, Dining, Percentage, RestaurantRow};
/// use rewards_rs::repository::{StorageAccounts, StorageRewards};
/// use rewards_rs::reward_network::RewardNetwork;
/// use rewards_rs::storage::{BlockingStorage, InMemoryStorage};
///
/// let storage = Arc::new(InMemoryStorage::new());
/// storage.upsert_restaurant_rows(vec![
///     RestaurantRow::new("1234567890", "Pizza Bob's", "0.08").with_policy("A"),
/// ])?;
/// let mut account = Account::new(AccountNumber::from("123456789"), "Keith and Keri Donald");
/// account.add_credit_card("1234123412341234");
/// account.add_beneficiary("Annabelle")?;
/// storage.upsert_accounts(vec![account])?;
///
/// let restaurants = BlockingRestaurantCache::new(Arc::clone(&storage));
/// restaurants.populate()?;
/// let network = RewardNetwork::new(
///     StorageAccounts::new(Arc::clone(&storage)),
///     restaurants,
///     StorageRewards::open(Arc::clone(&storage))?,
/// );
///
/// let dining = Dining::create("100.00", "1234123412341234", "1234567890")?;
/// let confirmation = network.reward_account_for(&dining)?;
/// assert_eq!(confirmation.contribution.amount.to_string(), "8.00");
/// # Ok::<(), rewards_rs::error::RewardsError>(())
/// ```
#[derive(Debug)]
pub struct RewardNetwork<A, R, L> {
    /// Account repository.
    accounts: A,
    /// Restaurant repository.
    restaurants: R,
    /// Reward ledger.
    rewards: L,
}

impl<A, R, L> RewardNetwork<A, R, L>
where
    A: AccountLookup,
    R: RestaurantLookup,
    L: RewardLedger,
{
    /// Assembles a network from its three repositories.
    #[inline]
    #[must_use]
    pub const fn new(accounts: A, restaurants: R, rewards: L) -> Self {
        Self {
            accounts,
            restaurants,
            rewards,
        }
    }

    /// Returns the account repository.
    #[inline]
    #[must_use]
    pub const fn accounts(&self) -> &A {
        &self.accounts
    }

    /// Returns the restaurant repository.
    #[inline]
    #[must_use]
    pub const fn restaurants(&self) -> &R {
        &self.restaurants
    }

    /// Returns the reward ledger.
    #[inline]
    #[must_use]
    pub const fn rewards(&self) -> &L {
        &self.rewards
    }

    /// Rewards the account charged for `dining`.
    ///
    /// Looks up the account by credit card and the restaurant by merchant
    /// number, computes the benefit, then has the ledger credit the
    /// beneficiaries and record the confirmation in one unit of work. When
    /// that fails, no savings are kept.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the card or merchant is unknown,
    /// `InvalidAccount` if the beneficiary allocations do not add up to
    /// 100%, or any storage error raised while persisting.
    #[tracing::instrument(skip_all, fields(merchant_number = %dining.merchant_number))]
    pub fn reward_account_for(&self, dining: &Dining) -> Result<RewardConfirmation> {
        let account = self
            .accounts
            .find_by_credit_card(&dining.credit_card_number)?;
        let restaurant = self
            .restaurants
            .find_by_merchant_number(dining.merchant_number.as_inner())?;
        let benefit = restaurant.calculate_benefit_for(&account, dining);
        let confirmation = self.rewards.record_reward(&account, benefit, dining)?;
        tracing::debug!(
            account = %account.number,
            benefit = %benefit,
            confirmation = %confirmation.confirmation_number,
            "reward confirmed"
        );
        Ok(confirmation)
    }
}
