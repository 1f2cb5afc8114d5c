//! JSON-file-based storage backend.
//!
//! Stores each entity type in a separate JSON file under a configurable
//! directory (default: `$XDG_DATA_HOME/rewards-rs/`).

#[cfg(feature = "async")]
use core::future::Future;
use std::fs;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

use serde::Serialize;
use serde::de::DeserializeOwned;

use super::{
    account_key, credit_account, data_access_error, lock_poison_error, restaurant_key,
    upsert_by_key,
};
use crate::error::{Result, RewardsError};
use crate::models::{
    Account, AccountNumber, ConfirmationNumber, Dining, MonetaryAmount, RestaurantRow,
    RewardConfirmation,
};

/// Application name used for the XDG data directory.
const APP_NAME: &str = "rewards-rs";

/// File name for restaurant rows.
const RESTAURANTS_FILE: &str = "restaurants.json";
/// File name for accounts.
const ACCOUNTS_FILE: &str = "accounts.json";
/// File name for reward confirmations.
const REWARDS_FILE: &str = "rewards.json";
/// Sentinel file used for cross-process file locking.
const LOCK_FILE: &str = "storage.lock";

/// File-backed storage that persists reward-network data as JSON files.
///
/// # Concurrency
///
/// Thread safety within a single process is provided by an in-process
/// [`Mutex`]. Cross-process safety is achieved via an advisory file lock
/// on `storage.lock` (using [`std::fs::File::lock`] /
/// [`std::fs::File::lock_shared`]).
///
/// Read operations acquire a shared lock (allowing concurrent readers),
/// while write operations acquire an exclusive lock. Both are released on
/// every exit path.
///
/// # File layout
///
/// ```text
/// <dir>/
///   storage.lock          (cross-process lock sentinel)
///   restaurants.json
///   accounts.json
///   rewards.json
/// ```
#[derive(Debug)]
pub struct FileStorage {
    /// Root directory containing all JSON files.
    dir: PathBuf,
    /// Mutex serializing concurrent in-process access.
    lock: Mutex<()>,
    /// Sentinel file for cross-process advisory locking.
    lock_file: fs::File,
}

impl FileStorage {
    /// Creates a new file storage rooted at the given directory.
    ///
    /// Creates the directory (and parents) if it does not exist. Also
    /// opens (or creates) the `storage.lock` sentinel file used for
    /// cross-process advisory locking.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or the lock
    /// file cannot be opened.
    #[inline]
    pub fn new(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir).map_err(data_access_error)?;
        let lock_file = fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(dir.join(LOCK_FILE))
            .map_err(data_access_error)?;
        tracing::debug!(dir = %dir.display(), "opened file storage");
        Ok(Self {
            dir,
            lock: Mutex::new(()),
            lock_file,
        })
    }

    /// Returns the default XDG-compliant data directory for this application.
    ///
    /// On Linux: `$XDG_DATA_HOME/rewards-rs/` (typically
    /// `~/.local/share/rewards-rs/`).
    ///
    /// # Errors
    ///
    /// Returns an error if the platform data directory cannot be determined.
    #[inline]
    pub fn default_dir() -> Result<PathBuf> {
        dirs::data_dir()
            .map(|data_path| data_path.join(APP_NAME))
            .ok_or_else(|| {
                RewardsError::DataAccess("could not determine platform data directory".into())
            })
    }

    // ── Private helpers ─────────────────────────────────────────────

    /// Returns the full path for a given file name.
    fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// Acquires an in-process mutex guard and a shared (read) file lock,
    /// executes `op`, then releases the file lock.
    fn with_shared_lock<R, F: FnOnce() -> Result<R>>(&self, op: F) -> Result<R> {
        let _guard: MutexGuard<'_, ()> = self.lock.lock().map_err(|err| lock_poison_error(&err))?;
        self.lock_file.lock_shared().map_err(data_access_error)?;
        let result = op();
        // Only surface the unlock error when the operation succeeded;
        // otherwise the original error is more useful.
        if let Err(err) = self.lock_file.unlock()
            && result.is_ok()
        {
            return Err(data_access_error(err));
        }
        result
    }

    /// Acquires an in-process mutex guard and an exclusive (write) file
    /// lock, executes `op`, then releases the file lock.
    fn with_exclusive_lock<R, F: FnOnce() -> Result<R>>(&self, op: F) -> Result<R> {
        let _guard: MutexGuard<'_, ()> = self.lock.lock().map_err(|err| lock_poison_error(&err))?;
        self.lock_file.lock().map_err(data_access_error)?;
        let result = op();
        if let Err(err) = self.lock_file.unlock()
            && result.is_ok()
        {
            return Err(data_access_error(err));
        }
        result
    }

    /// Reads and deserializes a JSON file. Returns an empty `Vec` if the
    /// file does not exist.
    fn read_entities<T: DeserializeOwned>(&self, name: &str) -> Result<Vec<T>> {
        let path = self.path(name);
        match fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str(&contents).map_err(RewardsError::from),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(err) => Err(data_access_error(err)),
        }
    }

    /// Atomically writes a serialized JSON file (write-to-tmp then rename).
    fn write_entities<T: Serialize>(&self, name: &str, items: &[T]) -> Result<()> {
        let path = self.path(name);
        let tmp_path = self.path(&format!("{name}.tmp"));
        let json = serde_json::to_string_pretty(items).map_err(RewardsError::from)?;
        fs::write(&tmp_path, json).map_err(data_access_error)?;
        fs::rename(&tmp_path, &path).map_err(data_access_error)?;
        Ok(())
    }

    /// Reads an entity file under a shared lock.
    fn read_locked<T: DeserializeOwned>(&self, name: &str) -> Result<Vec<T>> {
        self.with_shared_lock(|| self.read_entities(name))
    }

    /// Merges new items into an entity file by key (insert-or-replace).
    fn upsert_file<T, K>(&self, name: &str, new_items: Vec<T>, key_fn: fn(&T) -> K) -> Result<()>
    where
        T: Serialize + DeserializeOwned,
        K: core::hash::Hash + Eq,
    {
        if new_items.is_empty() {
            return Ok(());
        }
        self.with_exclusive_lock(|| {
            let mut existing: Vec<T> = self.read_entities(name)?;
            upsert_by_key(&mut existing, new_items, key_fn);
            self.write_entities(name, &existing)
        })
    }

    /// Looks up a single restaurant row by merchant number.
    fn find_restaurant_row(&self, merchant_number: &str) -> Result<Option<RestaurantRow>> {
        let rows: Vec<RestaurantRow> = self.read_locked(RESTAURANTS_FILE)?;
        Ok(rows
            .into_iter()
            .find(|row| row.merchant_number == merchant_number))
    }

    /// Appends a reward confirmation to the rewards file.
    fn append_reward(&self, reward: RewardConfirmation) -> Result<()> {
        self.with_exclusive_lock(|| {
            let mut rewards: Vec<RewardConfirmation> = self.read_entities(REWARDS_FILE)?;
            rewards.push(reward);
            self.write_entities(REWARDS_FILE, &rewards)
        })
    }

    /// Credits the account and appends the reward under one exclusive lock.
    ///
    /// The accounts file is written first; if appending the reward then
    /// fails, the previous accounts are written back.
    fn record(
        &self,
        account_number: &AccountNumber,
        benefit: MonetaryAmount,
        confirmation_number: ConfirmationNumber,
        dining: &Dining,
    ) -> Result<RewardConfirmation> {
        self.with_exclusive_lock(|| {
            let previous: Vec<Account> = self.read_entities(ACCOUNTS_FILE)?;
            let mut rewards: Vec<RewardConfirmation> = self.read_entities(REWARDS_FILE)?;
            let mut accounts = previous.clone();
            let (_credited, reward) = credit_account(
                &mut accounts,
                account_number,
                benefit,
                confirmation_number,
                dining,
            )?;
            rewards.push(reward.clone());

            self.write_entities(ACCOUNTS_FILE, &accounts)?;
            if let Err(err) = self.write_entities(REWARDS_FILE, &rewards) {
                if let Err(restore) = self.write_entities(ACCOUNTS_FILE, &previous) {
                    tracing::error!(error = %restore, "failed to restore accounts after a failed reward");
                }
                return Err(err);
            }
            Ok(reward)
        })
    }

    /// Deletes all entity files.
    ///
    /// The `storage.lock` sentinel is preserved; it is infrastructure, not
    /// data.
    fn clear_all(&self) -> Result<()> {
        self.with_exclusive_lock(|| {
            for name in [RESTAURANTS_FILE, ACCOUNTS_FILE, REWARDS_FILE] {
                match fs::remove_file(self.path(name)) {
                    Ok(()) => {}
                    Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                    Err(err) => return Err(data_access_error(err)),
                }
            }
            Ok(())
        })
    }
}

// ── BlockingStorage implementation ──────────────────────────────────────

#[cfg(feature = "blocking")]
impl super::BlockingStorage for FileStorage {
    #[inline]
    fn restaurant_rows(&self) -> Result<Vec<RestaurantRow>> {
        self.read_locked(RESTAURANTS_FILE)
    }

    #[inline]
    fn restaurant_row(&self, merchant_number: &str) -> Result<Option<RestaurantRow>> {
        self.find_restaurant_row(merchant_number)
    }

    #[inline]
    fn upsert_restaurant_rows(&self, items: Vec<RestaurantRow>) -> Result<()> {
        self.upsert_file(RESTAURANTS_FILE, items, restaurant_key)
    }

    #[inline]
    fn accounts(&self) -> Result<Vec<Account>> {
        self.read_locked(ACCOUNTS_FILE)
    }

    #[inline]
    fn upsert_accounts(&self, items: Vec<Account>) -> Result<()> {
        self.upsert_file(ACCOUNTS_FILE, items, account_key)
    }

    #[inline]
    fn rewards(&self) -> Result<Vec<RewardConfirmation>> {
        self.read_locked(REWARDS_FILE)
    }

    #[inline]
    fn insert_reward(&self, reward: RewardConfirmation) -> Result<()> {
        self.append_reward(reward)
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
impl super::Storage for FileStorage {
    #[inline]
    fn restaurant_rows(&self) -> impl Future<Output = Result<Vec<RestaurantRow>>> + Send {
        core::future::ready(self.read_locked(RESTAURANTS_FILE))
    }

    #[inline]
    fn restaurant_row(
        &self,
        merchant_number: &str,
    ) -> impl Future<Output = Result<Option<RestaurantRow>>> + Send {
        core::future::ready(self.find_restaurant_row(merchant_number))
    }

    #[inline]
    fn upsert_restaurant_rows(
        &self,
        items: Vec<RestaurantRow>,
    ) -> impl Future<Output = Result<()>> + Send {
        core::future::ready(self.upsert_file(RESTAURANTS_FILE, items, restaurant_key))
    }

    #[inline]
    fn accounts(&self) -> impl Future<Output = Result<Vec<Account>>> + Send {
        core::future::ready(self.read_locked(ACCOUNTS_FILE))
    }

    #[inline]
    fn upsert_accounts(&self, items: Vec<Account>) -> impl Future<Output = Result<()>> + Send {
        core::future::ready(self.upsert_file(ACCOUNTS_FILE, items, account_key))
    }

    #[inline]
    fn rewards(&self) -> impl Future<Output = Result<Vec<RewardConfirmation>>> + Send {
        core::future::ready(self.read_locked(REWARDS_FILE))
    }

    #[inline]
    fn insert_reward(&self, reward: RewardConfirmation) -> impl Future<Output = Result<()>> + Send {
        core::future::ready(self.append_reward(reward))
    }

    #[inline]
    fn record_reward(
        &self,
        account_number: &AccountNumber,
        benefit: MonetaryAmount,
        confirmation_number: ConfirmationNumber,
        dining: &Dining,
    ) -> impl Future<Output = Result<RewardConfirmation>> + Send {
        core::future::ready(self.record(account_number, benefit, confirmation_number, dining))
    }

    #[inline]
    fn clear(&self) -> impl Future<Output = Result<()>> + Send {
        core::future::ready(self.clear_all())
    }
}
