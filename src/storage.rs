//! Pluggable backing stores for reward-network data.
//!
//! This module defines the [`Storage`] (async) and [`BlockingStorage`]
//! (blocking) traits via a shared macro. Restaurant data is exposed as raw
//! [`RestaurantRow`](crate::models::RestaurantRow)s so that mapping (and its
//! failures) stays with the repository layer.

#[cfg(feature = "storage-file")]
mod file;
mod memory;
#[cfg(feature = "storage-sqlite")]
mod sqlite;

use core::hash::Hash;
use std::collections::HashMap;

#[cfg(feature = "storage-file")]
pub use file::FileStorage;
pub use memory::InMemoryStorage;
#[cfg(feature = "storage-sqlite")]
pub use sqlite::SqliteStorage;

use crate::error::{Result, RewardsError};
use crate::models::{
    Account, AccountNumber, ConfirmationNumber, Dining, MonetaryAmount, RewardConfirmation,
};

/// Generates a storage trait (async or blocking) with all entity methods.
///
/// Uses `@methods` to define the method list once, and `@method` to render
/// each method in async (`impl Future + Send`) or blocking (`fn`) style.
macro_rules! define_storage {
    // ── Entry points ────────────────────────────────────────────────
    (
        trait_name: $trait_name:ident,
        trait_doc: $trait_doc:expr,
        mode: async_mode,
    ) => {
        #[doc = $trait_doc]
        pub trait $trait_name: core::fmt::Debug + Send + Sync {
            define_storage!(@methods async_mode);
        }
    };
    (
        trait_name: $trait_name:ident,
        trait_doc: $trait_doc:expr,
        mode: blocking,
    ) => {
        #[doc = $trait_doc]
        pub trait $trait_name: core::fmt::Debug + Send + Sync {
            define_storage!(@methods blocking);
        }
    };

    // ── Single method list (shared between both variants) ───────────
    (@methods $mode:ident) => {
        // Restaurants
        define_storage!(@method $mode, restaurant_rows,
            "Returns every restaurant row (one unconditional select).\n\n# Errors\n\nReturns an error if the storage backend fails to read.",
            -> Result<Vec<RestaurantRow>>);
        define_storage!(@method $mode, restaurant_row,
            "Returns the restaurant row with the given merchant number, if any.\n\n# Errors\n\nReturns an error if the storage backend fails to read.",
            merchant_number: &str, -> Result<Option<RestaurantRow>>);
        define_storage!(@method $mode, upsert_restaurant_rows,
            "Inserts or updates restaurant rows (matched by merchant number).\n\n# Errors\n\nReturns an error if the storage backend fails to write.",
            items: Vec<RestaurantRow>, -> Result<()>);

        // Accounts
        define_storage!(@method $mode, accounts,
            "Returns all stored accounts.\n\n# Errors\n\nReturns an error if the storage backend fails to read.",
            -> Result<Vec<Account>>);
        define_storage!(@method $mode, upsert_accounts,
            "Inserts or updates accounts (matched by account number).\n\n# Errors\n\nReturns an error if the storage backend fails to write.",
            items: Vec<Account>, -> Result<()>);

        // Rewards
        define_storage!(@method $mode, rewards,
            "Returns all recorded reward confirmations, oldest first.\n\n# Errors\n\nReturns an error if the storage backend fails to read.",
            -> Result<Vec<RewardConfirmation>>);
        define_storage!(@method $mode, insert_reward,
            "Appends a reward confirmation.\n\n# Errors\n\nReturns an error if the storage backend fails to write.",
            reward: RewardConfirmation, -> Result<()>);
        define_storage!(@method $mode, record_reward,
            "Credits `benefit` to the stored account and appends the reward confirming it, as one unit of work.\n\nThe account is re-read under the backend's lock or transaction, so concurrent rewards for the same account never overwrite each other. If any step fails, neither the savings nor the reward are kept.\n\n# Errors\n\nReturns `NotFound` if the account is not stored, `InvalidAccount` if its allocations do not add up to 100%, or an error if the storage backend fails.",
            account_number: &AccountNumber, benefit: MonetaryAmount, confirmation_number: ConfirmationNumber, dining: &Dining, -> Result<RewardConfirmation>);

        // Clear
        define_storage!(@method $mode, clear,
            "Removes all stored data.\n\n# Errors\n\nReturns an error if the storage backend fails to write.",
            -> Result<()>);
    };

    // ── Blocking method renderer ────────────────────────────────────
    (@method blocking, $name:ident, $doc:expr,
     $($param:ident: $param_ty:ty,)* -> $ret:ty) => {
        #[doc = $doc]
        fn $name(&self $(, $param: $param_ty)*) -> $ret;
    };

    // ── Async method renderer (returns impl Future + Send) ──────────
    (@method async_mode, $name:ident, $doc:expr,
     $($param:ident: $param_ty:ty,)* -> $ret:ty) => {
        #[doc = $doc]
        fn $name(&self $(, $param: $param_ty)*)
            -> impl core::future::Future<Output = $ret> + Send;
    };
}

#[cfg(feature = "async")]
mod async_storage {
    //! Async storage trait definition.

    use crate::error::Result;
    use crate::models::{
        Account, AccountNumber, ConfirmationNumber, Dining, MonetaryAmount, RestaurantRow,
        RewardConfirmation,
    };

    define_storage! {
        trait_name: Storage,
        trait_doc: "Async backing store for reward-network data.\n\nAll methods take `&self`; implementations use interior mutability\n(e.g. `Mutex`) for thread-safe mutation.",
        mode: async_mode,
    }
}

#[cfg(feature = "blocking")]
mod blocking_storage {
    //! Blocking storage trait definition.

    use crate::error::Result;
    use crate::models::{
        Account, AccountNumber, ConfirmationNumber, Dining, MonetaryAmount, RestaurantRow,
        RewardConfirmation,
    };

    define_storage! {
        trait_name: BlockingStorage,
        trait_doc: "Blocking backing store for reward-network data.\n\nAll methods take `&self`; implementations use interior mutability\n(e.g. `Mutex`) for thread-safe mutation.",
        mode: blocking,
    }
}

#[cfg(feature = "async")]
pub use async_storage::Storage;
#[cfg(feature = "blocking")]
pub use blocking_storage::BlockingStorage;

/// Forwards every storage method through an [`Arc`](std::sync::Arc) so one
/// backend can be shared by the cache, the account repository and the
/// ledger.
macro_rules! forward_storage_through_arc {
    ($trait_name:ident $(, $async_kw:tt)?) => {
        impl<T: $trait_name + ?Sized> $trait_name for std::sync::Arc<T> {
            #[inline]
            fn restaurant_rows(&self) -> forward_storage_through_arc!(@ret $($async_kw)?, Result<Vec<RestaurantRow>>) {
                (**self).restaurant_rows()
            }

            #[inline]
            fn restaurant_row(&self, merchant_number: &str) -> forward_storage_through_arc!(@ret $($async_kw)?, Result<Option<RestaurantRow>>) {
                (**self).restaurant_row(merchant_number)
            }

            #[inline]
            fn upsert_restaurant_rows(&self, items: Vec<RestaurantRow>) -> forward_storage_through_arc!(@ret $($async_kw)?, Result<()>) {
                (**self).upsert_restaurant_rows(items)
            }

            #[inline]
            fn accounts(&self) -> forward_storage_through_arc!(@ret $($async_kw)?, Result<Vec<Account>>) {
                (**self).accounts()
            }

            #[inline]
            fn upsert_accounts(&self, items: Vec<Account>) -> forward_storage_through_arc!(@ret $($async_kw)?, Result<()>) {
                (**self).upsert_accounts(items)
            }

            #[inline]
            fn rewards(&self) -> forward_storage_through_arc!(@ret $($async_kw)?, Result<Vec<RewardConfirmation>>) {
                (**self).rewards()
            }

            #[inline]
            fn insert_reward(&self, reward: RewardConfirmation) -> forward_storage_through_arc!(@ret $($async_kw)?, Result<()>) {
                (**self).insert_reward(reward)
            }

            #[inline]
            fn record_reward(
                &self,
                account_number: &AccountNumber,
                benefit: MonetaryAmount,
                confirmation_number: ConfirmationNumber,
                dining: &Dining,
            ) -> forward_storage_through_arc!(@ret $($async_kw)?, Result<RewardConfirmation>) {
                (**self).record_reward(account_number, benefit, confirmation_number, dining)
            }

            #[inline]
            fn clear(&self) -> forward_storage_through_arc!(@ret $($async_kw)?, Result<()>) {
                (**self).clear()
            }
        }
    };
    (@ret , $ret:ty) => { $ret };
    (@ret async, $ret:ty) => { impl core::future::Future<Output = $ret> + Send };
}

#[cfg(feature = "async")]
mod async_arc {
    //! Async storage shared through `Arc`.

    use super::Storage;
    use crate::error::Result;
    use crate::models::{
        Account, AccountNumber, ConfirmationNumber, Dining, MonetaryAmount, RestaurantRow,
        RewardConfirmation,
    };

    forward_storage_through_arc!(Storage, async);
}

#[cfg(feature = "blocking")]
mod blocking_arc {
    //! Blocking storage shared through `Arc`.

    use super::BlockingStorage;
    use crate::error::Result;
    use crate::models::{
        Account, AccountNumber, ConfirmationNumber, Dining, MonetaryAmount, RestaurantRow,
        RewardConfirmation,
    };

    forward_storage_through_arc!(BlockingStorage);
}

// ── Helpers shared by the backends ──────────────────────────────────────

/// Merges `new_items` into `existing` by key.
///
/// Items with a known key replace the existing entry in place; new keys are
/// appended in input order. Within `new_items` the last occurrence wins.
fn upsert_by_key<T, K>(existing: &mut Vec<T>, new_items: Vec<T>, key_fn: fn(&T) -> K)
where
    K: Hash + Eq,
{
    let mut positions: HashMap<K, usize> = existing
        .iter()
        .enumerate()
        .map(|(idx, item)| (key_fn(item), idx))
        .collect();
    for item in new_items {
        let key = key_fn(&item);
        if let Some(slot) = positions.get(&key).and_then(|&idx| existing.get_mut(idx)) {
            *slot = item;
        } else {
            let _old = positions.insert(key, existing.len());
            existing.push(item);
        }
    }
}

/// Wraps any backend error into a [`RewardsError::DataAccess`].
#[cfg(any(feature = "storage-file", feature = "storage-sqlite"))]
fn data_access_error<E>(err: E) -> RewardsError
where
    E: core::error::Error + Send + Sync + 'static,
{
    RewardsError::DataAccess(Box::new(err))
}

/// Wraps a mutex poison error into a [`RewardsError::DataAccess`].
fn lock_poison_error<T>(err: &std::sync::PoisonError<T>) -> RewardsError {
    RewardsError::DataAccess(err.to_string().into())
}

/// Credits `benefit` to the account numbered `account_number` within
/// `accounts` and builds the confirmation of the reward.
///
/// Returns the credited account alongside the confirmation. `accounts` is
/// left untouched on error.
fn credit_account(
    accounts: &mut [Account],
    account_number: &AccountNumber,
    benefit: MonetaryAmount,
    confirmation_number: ConfirmationNumber,
    dining: &Dining,
) -> Result<(Account, RewardConfirmation)> {
    let account = accounts
        .iter_mut()
        .find(|account| account.number == *account_number)
        .ok_or_else(|| RewardsError::not_found("account", account_number))?;
    let contribution = account.make_contribution(benefit)?;
    let confirmation = RewardConfirmation {
        confirmation_number,
        contribution,
        dining: dining.clone(),
    };
    Ok((account.clone(), confirmation))
}

/// Extracts the merchant number of a restaurant row.
fn restaurant_key(row: &crate::models::RestaurantRow) -> String {
    row.merchant_number.clone()
}

/// Extracts the account number.
fn account_key(account: &Account) -> AccountNumber {
    account.number.clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsert_replaces_in_place_and_appends() {
        let mut existing = vec![(1_u8, "a"), (2_u8, "b")];
        upsert_by_key(&mut existing, vec![(3_u8, "c"), (1_u8, "A")], |item| item.0);
        assert_eq!(existing, vec![(1_u8, "A"), (2_u8, "b"), (3_u8, "c")]);
    }

    #[test]
    fn upsert_last_duplicate_wins() {
        let mut existing = Vec::new();
        upsert_by_key(
            &mut existing,
            vec![(7_u8, "first"), (7_u8, "second")],
            |item| item.0,
        );
        assert_eq!(existing, vec![(7_u8, "second")]);
    }

    #[test]
    fn lock_poison_maps_to_data_access() {
        let mutex = std::sync::Mutex::new(());
        let _joined = std::thread::scope(|scope| {
            scope
                .spawn(|| {
                    let _guard = mutex.lock().unwrap();
                    panic!("poison");
                })
                .join()
        });
        let err = lock_poison_error(&mutex.lock().unwrap_err());
        assert!(matches!(err, RewardsError::DataAccess(_)));
    }
}
