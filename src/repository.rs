//! Lookup seams used by the reward network.
//!
//! [`RestaurantLookup`], [`AccountLookup`] and [`RewardLedger`] are the
//! three repositories the reward calculation talks to. The restaurant side
//! is served either by a cache (see [`crate::cache`]) or by
//! [`QueryingRestaurants`], which selects one row per lookup. Accounts and
//! rewards are kept in a [`BlockingStorage`].

#[cfg(feature = "blocking")]
use core::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[cfg(feature = "blocking")]
use crate::error::RewardsError;
use crate::error::Result;
#[cfg(feature = "blocking")]
use crate::models::ConfirmationNumber;
use crate::models::{
    Account, AccountContribution, Dining, MonetaryAmount, Restaurant, RewardConfirmation,
};
#[cfg(feature = "blocking")]
use crate::storage::BlockingStorage;

/// Finds restaurants by merchant number.
pub trait RestaurantLookup {
    /// Returns the restaurant with the given merchant number.
    ///
    /// # Errors
    ///
    /// Returns [`RewardsError::NotFound`](crate::error::RewardsError::NotFound)
    /// when no restaurant matches. Implementations that read a backing store
    /// may also fail with `DataAccess` or `Mapping`.
    fn find_by_merchant_number(&self, merchant_number: &str) -> Result<Arc<Restaurant>>;
}

/// Finds accounts and persists beneficiary changes.
pub trait AccountLookup {
    /// Returns the account a credit card is charged to.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no account holds the card.
    fn find_by_credit_card(&self, credit_card_number: &str) -> Result<Account>;

    /// Persists the beneficiaries (allocations and savings) of an account.
    ///
    /// The stored beneficiaries are replaced by the given ones. Crediting a
    /// reward goes through [`RewardLedger::record_reward`] instead, which
    /// applies the credit to the stored account.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the account is not stored, or a storage error.
    fn update_beneficiaries(&self, account: &Account) -> Result<()>;
}

/// Records reward confirmations.
pub trait RewardLedger {
    /// Records a contribution made for a dining event and returns the
    /// confirmation.
    ///
    /// # Errors
    ///
    /// Returns an error if the confirmation cannot be stored.
    fn confirm_reward(
        &self,
        contribution: &AccountContribution,
        dining: &Dining,
    ) -> Result<RewardConfirmation>;

    /// Credits `benefit` to the beneficiaries of `account` and records the
    /// confirming reward as one unit of work.
    ///
    /// Either both the savings and the reward are stored, or neither is.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the account is not stored, `InvalidAccount` if
    /// its allocations do not add up to 100%, or a storage error.
    fn record_reward(
        &self,
        account: &Account,
        benefit: MonetaryAmount,
        dining: &Dining,
    ) -> Result<RewardConfirmation>;
}

impl<T: RestaurantLookup + ?Sized> RestaurantLookup for Arc<T> {
    #[inline]
    fn find_by_merchant_number(&self, merchant_number: &str) -> Result<Arc<Restaurant>> {
        (**self).find_by_merchant_number(merchant_number)
    }
}

impl<T: AccountLookup + ?Sized> AccountLookup for Arc<T> {
    #[inline]
    fn find_by_credit_card(&self, credit_card_number: &str) -> Result<Account> {
        (**self).find_by_credit_card(credit_card_number)
    }

    #[inline]
    fn update_beneficiaries(&self, account: &Account) -> Result<()> {
        (**self).update_beneficiaries(account)
    }
}

impl<T: RewardLedger + ?Sized> RewardLedger for Arc<T> {
    #[inline]
    fn confirm_reward(
        &self,
        contribution: &AccountContribution,
        dining: &Dining,
    ) -> Result<RewardConfirmation> {
        (**self).confirm_reward(contribution, dining)
    }

    #[inline]
    fn record_reward(
        &self,
        account: &Account,
        benefit: MonetaryAmount,
        dining: &Dining,
    ) -> Result<RewardConfirmation> {
        (**self).record_reward(account, benefit, dining)
    }
}

/// Restaurant lookup that selects the matching row on every call.
///
/// Nothing is cached: each lookup issues one parameterized read against the
/// storage and maps the row it gets back.
#[cfg(feature = "blocking")]
#[derive(Debug)]
pub struct QueryingRestaurants<S: BlockingStorage> {
    /// Row source.
    storage: S,
}

#[cfg(feature = "blocking")]
impl<S: BlockingStorage> QueryingRestaurants<S> {
    /// Wraps a storage backend.
    #[inline]
    #[must_use]
    pub const fn new(storage: S) -> Self {
        Self { storage }
    }

    /// Returns the underlying storage.
    #[inline]
    #[must_use]
    pub const fn storage(&self) -> &S {
        &self.storage
    }
}

#[cfg(feature = "blocking")]
impl<S: BlockingStorage> RestaurantLookup for QueryingRestaurants<S> {
    #[inline]
    fn find_by_merchant_number(&self, merchant_number: &str) -> Result<Arc<Restaurant>> {
        let row = self
            .storage
            .restaurant_row(merchant_number)?
            .ok_or_else(|| RewardsError::not_found("restaurant", merchant_number))?;
        Ok(Arc::new(row.into_restaurant()?))
    }
}

/// Account repository over a [`BlockingStorage`].
#[cfg(feature = "blocking")]
#[derive(Debug)]
pub struct StorageAccounts<S: BlockingStorage> {
    /// Account store.
    storage: S,
}

#[cfg(feature = "blocking")]
impl<S: BlockingStorage> StorageAccounts<S> {
    /// Wraps a storage backend.
    #[inline]
    #[must_use]
    pub const fn new(storage: S) -> Self {
        Self { storage }
    }
}

#[cfg(feature = "blocking")]
impl<S: BlockingStorage> AccountLookup for StorageAccounts<S> {
    fn find_by_credit_card(&self, credit_card_number: &str) -> Result<Account> {
        self.storage
            .accounts()?
            .into_iter()
            .find(|account| account.has_credit_card(credit_card_number))
            .ok_or_else(|| RewardsError::not_found("account for credit card", credit_card_number))
    }

    fn update_beneficiaries(&self, account: &Account) -> Result<()> {
        let mut stored = self
            .storage
            .accounts()?
            .into_iter()
            .find(|stored| stored.number == account.number)
            .ok_or_else(|| RewardsError::not_found("account", &account.number))?;
        stored.beneficiaries.clone_from(&account.beneficiaries);
        tracing::debug!(account = %stored.number, "updating beneficiaries");
        self.storage.upsert_accounts(vec![stored])
    }
}

/// Reward ledger over a [`BlockingStorage`].
///
/// Confirmation numbers are sequential, continuing after the highest number
/// already stored when the ledger was opened.
#[cfg(feature = "blocking")]
#[derive(Debug)]
pub struct StorageRewards<S: BlockingStorage> {
    /// Reward store.
    storage: S,
    /// Last confirmation number handed out.
    last_confirmation: AtomicU64,
}

#[cfg(feature = "blocking")]
impl<S: BlockingStorage> StorageRewards<S> {
    /// Opens a ledger, continuing the numbering of stored rewards.
    ///
    /// Numbers lost to failed writes leave gaps; they are never handed out
    /// twice.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored rewards cannot be read.
    #[inline]
    pub fn open(storage: S) -> Result<Self> {
        let last = storage
            .rewards()?
            .iter()
            .filter_map(|reward| reward.confirmation_number.as_inner().parse::<u64>().ok())
            .max()
            .unwrap_or(0);
        Ok(Self {
            storage,
            last_confirmation: AtomicU64::new(last),
        })
    }

    /// Hands out the next confirmation number.
    fn next_confirmation_number(&self) -> ConfirmationNumber {
        let next = self
            .last_confirmation
            .fetch_add(1, Ordering::SeqCst)
            .saturating_add(1);
        ConfirmationNumber::new(next.to_string())
    }
}

#[cfg(feature = "blocking")]
impl<S: BlockingStorage> RewardLedger for StorageRewards<S> {
    fn confirm_reward(
        &self,
        contribution: &AccountContribution,
        dining: &Dining,
    ) -> Result<RewardConfirmation> {
        let confirmation = RewardConfirmation {
            confirmation_number: self.next_confirmation_number(),
            contribution: contribution.clone(),
            dining: dining.clone(),
        };
        tracing::debug!(
            confirmation = %confirmation.confirmation_number,
            account = %contribution.account_number,
            amount = %contribution.amount,
            "confirming reward"
        );
        self.storage.insert_reward(confirmation.clone())?;
        Ok(confirmation)
    }

    fn record_reward(
        &self,
        account: &Account,
        benefit: MonetaryAmount,
        dining: &Dining,
    ) -> Result<RewardConfirmation> {
        let confirmation_number = self.next_confirmation_number();
        tracing::debug!(
            confirmation = %confirmation_number,
            account = %account.number,
            benefit = %benefit,
            "recording reward"
        );
        self.storage
            .record_reward(&account.number, benefit, confirmation_number, dining)
    }
}
