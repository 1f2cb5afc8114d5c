//! In-memory storage backend.
//!
//! Provides [`InMemoryStorage`], a thread-safe in-memory implementation of
//! the storage traits. Ideal for unit and integration tests where file or
//! database I/O is undesirable.

use std::sync::Mutex;

#[cfg(feature = "async")]
use core::future::{self, Future};

use super::{account_key, credit_account, lock_poison_error, restaurant_key, upsert_by_key};
use crate::error::Result;
use crate::models::{
    Account, AccountNumber, ConfirmationNumber, Dining, MonetaryAmount, RestaurantRow,
    RewardConfirmation,
};

/// Thread-safe in-memory storage.
///
/// This type implements both [`super::Storage`] (async) and
/// [`super::BlockingStorage`] (blocking) traits, providing a zero-setup
/// backing store for tests and demos.
///
/// # Upsert semantics
///
/// Upserts merge by key: existing rows with a matching key are replaced in
/// place, new rows are appended. Listing order is insertion order.
///
/// # Example
///
/// ```rust
/// use rewards_rs::models::RestaurantRow;
/// use rewards_rs::storage::{BlockingStorage, InMemoryStorage};
///
/// let storage = InMemoryStorage::new();
/// storage
///     .upsert_restaurant_rows(vec![
///         RestaurantRow::new("1234567890", "Pizza Bob's", "0.08").with_policy("A"),
///     ])
///     .unwrap();
/// assert_eq!(storage.restaurant_rows().unwrap().len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    /// All state behind a single mutex for thread-safe interior mutability.
    inner: Mutex<Inner>,
}

/// Inner mutable state.
#[derive(Debug, Default)]
struct Inner {
    /// Stored restaurant rows.
    restaurants: Vec<RestaurantRow>,
    /// Stored accounts.
    accounts: Vec<Account>,
    /// Recorded rewards, oldest first.
    rewards: Vec<RewardConfirmation>,
}

impl InMemoryStorage {
    /// Creates a new empty in-memory storage.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires the inner lock and applies a closure.
    fn with_lock<R, F: FnOnce(&mut Inner) -> R>(&self, op: F) -> Result<R> {
        let mut inner = self.inner.lock().map_err(|err| lock_poison_error(&err))?;
        Ok(op(&mut inner))
    }

    /// Finds a restaurant row by merchant number.
    fn find_restaurant_row(&self, merchant_number: &str) -> Result<Option<RestaurantRow>> {
        self.with_lock(|inner| {
            inner
                .restaurants
                .iter()
                .find(|row| row.merchant_number == merchant_number)
                .cloned()
        })
    }

    /// Credits the account and appends the reward under one guard.
    fn record(
        &self,
        account_number: &AccountNumber,
        benefit: MonetaryAmount,
        confirmation_number: ConfirmationNumber,
        dining: &Dining,
    ) -> Result<RewardConfirmation> {
        self.with_lock(|inner| {
            let (_credited, reward) = credit_account(
                &mut inner.accounts,
                account_number,
                benefit,
                confirmation_number,
                dining,
            )?;
            inner.rewards.push(reward.clone());
            Ok(reward)
        })?
    }

    /// Drops every stored entity.
    fn clear_all(&self) -> Result<()> {
        self.with_lock(|inner| *inner = Inner::default())
    }
}

// ── BlockingStorage implementation ──────────────────────────────────────

#[cfg(feature = "blocking")]
impl super::BlockingStorage for InMemoryStorage {
    #[inline]
    fn restaurant_rows(&self) -> Result<Vec<RestaurantRow>> {
        self.with_lock(|inner| inner.restaurants.clone())
    }

    #[inline]
    fn restaurant_row(&self, merchant_number: &str) -> Result<Option<RestaurantRow>> {
        self.find_restaurant_row(merchant_number)
    }

    #[inline]
    fn upsert_restaurant_rows(&self, items: Vec<RestaurantRow>) -> Result<()> {
        self.with_lock(|inner| upsert_by_key(&mut inner.restaurants, items, restaurant_key))
    }

    #[inline]
    fn accounts(&self) -> Result<Vec<Account>> {
        self.with_lock(|inner| inner.accounts.clone())
    }

    #[inline]
    fn upsert_accounts(&self, items: Vec<Account>) -> Result<()> {
        self.with_lock(|inner| upsert_by_key(&mut inner.accounts, items, account_key))
    }

    #[inline]
    fn rewards(&self) -> Result<Vec<RewardConfirmation>> {
        self.with_lock(|inner| inner.rewards.clone())
    }

    #[inline]
    fn insert_reward(&self, reward: RewardConfirmation) -> Result<()> {
        self.with_lock(|inner| inner.rewards.push(reward))
    }

    #[inline]
    fn record_reward(
        &self,
        account_number: &AccountNumber,
        benefit: MonetaryAmount,
        confirmation_number: ConfirmationNumber,
        dining: &Dining,
    ) -> Result<RewardConfirmation> {
        self.record(account_number, benefit, confirmation_number, dining)
    }

    #[inline]
    fn clear(&self) -> Result<()> {
        self.clear_all()
    }
}

// ── Storage (async) implementation ──────────────────────────────────────

#[cfg(feature = "async")]
impl super::Storage for InMemoryStorage {
    #[inline]
    fn restaurant_rows(&self) -> impl Future<Output = Result<Vec<RestaurantRow>>> + Send {
        future::ready(self.with_lock(|inner| inner.restaurants.clone()))
    }

    #[inline]
    fn restaurant_row(
        &self,
        merchant_number: &str,
    ) -> impl Future<Output = Result<Option<RestaurantRow>>> + Send {
        future::ready(self.find_restaurant_row(merchant_number))
    }

    #[inline]
    fn upsert_restaurant_rows(
        &self,
        items: Vec<RestaurantRow>,
    ) -> impl Future<Output = Result<()>> + Send {
        future::ready(
            self.with_lock(|inner| upsert_by_key(&mut inner.restaurants, items, restaurant_key)),
        )
    }

    #[inline]
    fn accounts(&self) -> impl Future<Output = Result<Vec<Account>>> + Send {
        future::ready(self.with_lock(|inner| inner.accounts.clone()))
    }

    #[inline]
    fn upsert_accounts(&self, items: Vec<Account>) -> impl Future<Output = Result<()>> + Send {
        future::ready(self.with_lock(|inner| upsert_by_key(&mut inner.accounts, items, account_key)))
    }

    #[inline]
    fn rewards(&self) -> impl Future<Output = Result<Vec<RewardConfirmation>>> + Send {
        future::ready(self.with_lock(|inner| inner.rewards.clone()))
    }

    #[inline]
    fn insert_reward(&self, reward: RewardConfirmation) -> impl Future<Output = Result<()>> + Send {
        future::ready(self.with_lock(|inner| inner.rewards.push(reward)))
    }

    #[inline]
    fn record_reward(
        &self,
        account_number: &AccountNumber,
        benefit: MonetaryAmount,
        confirmation_number: ConfirmationNumber,
        dining: &Dining,
    ) -> impl Future<Output = Result<RewardConfirmation>> + Send {
        future::ready(self.record(account_number, benefit, confirmation_number, dining))
    }

    #[inline]
    fn clear(&self) -> impl Future<Output = Result<()>> + Send {
        future::ready(self.clear_all())
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;
    use crate::models::{MerchantNumber, NaiveDate, Percentage};

    fn pizza_bobs() -> RestaurantRow {
        RestaurantRow::new("1234567890", "Pizza Bob's", "0.08").with_policy("A")
    }

    fn member(allocation: &str) -> Account {
        let mut account = Account::new(AccountNumber::from("123456789"), "Keith and Keri Donald");
        account.add_credit_card("1234123412341234");
        account
            .add_beneficiary_with_allocation("Annabelle", Percentage::parse(allocation).unwrap())
            .unwrap();
        account
    }

    fn dining() -> Dining {
        Dining::new(
            MonetaryAmount::new(dec!(100)),
            "1234123412341234".to_owned(),
            MerchantNumber::from("1234567890"),
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        )
    }

    #[cfg(feature = "blocking")]
    mod blocking {
        use super::*;
        use crate::storage::BlockingStorage;

        #[test]
        fn empty_storage_returns_empty_vecs() {
            let storage = InMemoryStorage::new();
            assert!(storage.restaurant_rows().unwrap().is_empty());
            assert!(storage.accounts().unwrap().is_empty());
            assert!(storage.rewards().unwrap().is_empty());
        }

        #[test]
        fn upsert_and_find_restaurant_row() {
            let storage = InMemoryStorage::new();
            storage.upsert_restaurant_rows(vec![pizza_bobs()]).unwrap();

            let row = storage.restaurant_row("1234567890").unwrap();
            assert_eq!(row, Some(pizza_bobs()));
            assert!(storage.restaurant_row("0000000000").unwrap().is_none());
        }

        #[test]
        fn upsert_replaces_existing_row() {
            let storage = InMemoryStorage::new();
            storage.upsert_restaurant_rows(vec![pizza_bobs()]).unwrap();
            storage
                .upsert_restaurant_rows(vec![
                    RestaurantRow::new("1234567890", "Pizza Bob's", "0.10").with_policy("N"),
                ])
                .unwrap();

            let rows = storage.restaurant_rows().unwrap();
            assert_eq!(rows.len(), 1);
            assert_eq!(rows[0].benefit_percentage, "0.10");
        }

        #[test]
        fn upsert_accounts_by_number() {
            let storage = InMemoryStorage::new();
            let first = Account::new(AccountNumber::from("1"), "Old Name");
            let second = Account::new(AccountNumber::from("2"), "Other");
            storage.upsert_accounts(vec![first, second]).unwrap();
            storage
                .upsert_accounts(vec![Account::new(AccountNumber::from("1"), "New Name")])
                .unwrap();

            let accounts = storage.accounts().unwrap();
            assert_eq!(accounts.len(), 2);
            assert_eq!(accounts[0].name, "New Name");
        }

        #[test]
        fn clear_removes_everything() {
            let storage = InMemoryStorage::new();
            storage.upsert_restaurant_rows(vec![pizza_bobs()]).unwrap();
            storage
                .upsert_accounts(vec![Account::new(AccountNumber::from("1"), "A")])
                .unwrap();

            storage.clear().unwrap();

            assert!(storage.restaurant_rows().unwrap().is_empty());
            assert!(storage.accounts().unwrap().is_empty());
        }

        #[test]
        fn record_reward_credits_stored_account() {
            let storage = InMemoryStorage::new();
            storage.upsert_accounts(vec![member("100%")]).unwrap();

            let number = AccountNumber::from("123456789");
            let benefit = MonetaryAmount::new(dec!(8));
            let _first = storage
                .record_reward(&number, benefit, ConfirmationNumber::from("1"), &dining())
                .unwrap();
            let second = storage
                .record_reward(&number, benefit, ConfirmationNumber::from("2"), &dining())
                .unwrap();

            let total = MonetaryAmount::new(dec!(16));
            assert_eq!(second.contribution.distributions[0].total_savings, total);
            assert_eq!(storage.accounts().unwrap()[0].beneficiaries[0].savings, total);
            assert_eq!(storage.rewards().unwrap().len(), 2);
        }

        #[test]
        fn rejected_reward_keeps_nothing() {
            let storage = InMemoryStorage::new();
            storage.upsert_accounts(vec![member("50%")]).unwrap();

            let err = storage
                .record_reward(
                    &AccountNumber::from("123456789"),
                    MonetaryAmount::new(dec!(8)),
                    ConfirmationNumber::from("1"),
                    &dining(),
                )
                .unwrap_err();

            assert!(matches!(err, crate::error::RewardsError::InvalidAccount(_)));
            assert!(storage.accounts().unwrap()[0].beneficiaries[0].savings.is_zero());
            assert!(storage.rewards().unwrap().is_empty());
        }
    }

    #[cfg(feature = "async")]
    mod async_tests {
        use super::*;
        use crate::storage::Storage;

        #[tokio::test]
        async fn upsert_and_read_rows() {
            let storage = InMemoryStorage::new();
            storage.upsert_restaurant_rows(vec![pizza_bobs()]).await.unwrap();

            let rows = storage.restaurant_rows().await.unwrap();
            assert_eq!(rows, vec![pizza_bobs()]);
            assert!(storage.restaurant_row("1234567890").await.unwrap().is_some());
        }

        #[tokio::test]
        async fn clear_empties_storage() {
            let storage = InMemoryStorage::new();
            storage.upsert_restaurant_rows(vec![pizza_bobs()]).await.unwrap();
            storage.clear().await.unwrap();
            assert!(storage.restaurant_rows().await.unwrap().is_empty());
        }
    }
}
