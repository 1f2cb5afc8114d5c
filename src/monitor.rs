//! Call logging and timing for repositories.
//!
//! [`Monitored`] wraps a repository and implements the same lookup traits.
//! `find_*` calls are logged before they are delegated; calls that write
//! (`update_beneficiaries`, `record_reward`) are timed with a [`Monitor`]
//! handed out by a shared [`MonitorFactory`], which keeps per-name call
//! counts and durations.
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use rewards_rs::monitor::{MonitorFactory, Monitored};
//! use rewards_rs::repository::{AccountLookup, StorageAccounts};
//! use rewards_rs::storage::InMemoryStorage;
//!
//! let monitors = Arc::new(MonitorFactory::new());
//! let accounts = Monitored::new(
//!     StorageAccounts::new(InMemoryStorage::new()),
//!     Arc::clone(&monitors),
//! );
//! assert!(accounts.find_by_credit_card("1234123412341234").is_err());
//! ```

use core::time::Duration;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use crate::error::Result;
use crate::models::{
    Account, AccountContribution, Dining, MonetaryAmount, Restaurant, RewardConfirmation,
};
use crate::repository::{AccountLookup, RestaurantLookup, RewardLedger};

/// Aggregated timings of one monitor name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MonitorStats {
    /// Completed calls.
    pub calls: u64,
    /// Sum of all call durations.
    pub total: Duration,
    /// Longest single call.
    pub max: Duration,
}

impl MonitorStats {
    /// Mean call duration, or `None` before the first call.
    #[inline]
    #[must_use]
    pub fn average(&self) -> Option<Duration> {
        let calls = u32::try_from(self.calls).ok().filter(|&calls| calls > 0)?;
        Some(self.total / calls)
    }

    /// Folds one measurement into the aggregate.
    fn record(&mut self, elapsed: Duration) {
        self.calls = self.calls.saturating_add(1);
        self.total = self.total.saturating_add(elapsed);
        self.max = self.max.max(elapsed);
    }
}

/// Hands out named [`Monitor`]s and aggregates what they measure.
#[derive(Debug, Default)]
pub struct MonitorFactory {
    /// Aggregates keyed by monitor name.
    stats: Mutex<HashMap<String, MonitorStats>>,
}

impl MonitorFactory {
    /// Creates a factory with no recorded timings.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts timing a call under `name`.
    #[inline]
    #[must_use = "the call is measured until the monitor is stopped or dropped"]
    pub fn start<N: Into<String>>(&self, name: N) -> Monitor<'_> {
        Monitor {
            name: name.into(),
            started: Instant::now(),
            factory: self,
            stopped: false,
        }
    }

    /// Returns the aggregate recorded under `name`, if any.
    #[inline]
    #[must_use]
    pub fn stats(&self, name: &str) -> Option<MonitorStats> {
        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .copied()
    }

    /// Returns every monitor name seen so far, sorted.
    #[inline]
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// Adds one measurement.
    fn record(&self, name: &str, elapsed: Duration) {
        let mut stats = self.stats.lock().unwrap_or_else(PoisonError::into_inner);
        stats.entry(name.to_owned()).or_default().record(elapsed);
    }
}

/// A running measurement.
///
/// Stops on [`stop`](Self::stop) or when dropped, so a call that returns
/// early or unwinds is still recorded.
#[derive(Debug)]
pub struct Monitor<'a> {
    /// Name the measurement is recorded under.
    name: String,
    /// Start instant.
    started: Instant,
    /// Factory receiving the measurement.
    factory: &'a MonitorFactory,
    /// Set once the measurement has been recorded.
    stopped: bool,
}

impl Monitor<'_> {
    /// Name the measurement is recorded under.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stops the measurement and returns the elapsed time.
    #[inline]
    #[must_use]
    pub fn stop(mut self) -> Duration {
        self.finish()
    }

    /// Records the measurement once.
    fn finish(&mut self) -> Duration {
        let elapsed = self.started.elapsed();
        if !self.stopped {
            self.stopped = true;
            self.factory.record(&self.name, elapsed);
            tracing::info!(
                monitor = %self.name,
                elapsed_us = elapsed.as_micros(),
                "monitor stopped"
            );
        }
        elapsed
    }
}

impl Drop for Monitor<'_> {
    #[inline]
    fn drop(&mut self) {
        let _elapsed = self.finish();
    }
}

/// Logging and timing decorator for repositories.
#[derive(Debug)]
pub struct Monitored<L> {
    /// Wrapped repository.
    inner: L,
    /// Shared factory receiving the timings.
    monitors: Arc<MonitorFactory>,
    /// Short type name of the wrapped repository.
    target: &'static str,
}

impl<L> Monitored<L> {
    /// Wraps a repository.
    #[inline]
    #[must_use]
    pub fn new(inner: L, monitors: Arc<MonitorFactory>) -> Self {
        Self {
            inner,
            monitors,
            target: short_type_name::<L>(),
        }
    }

    /// Returns the wrapped repository.
    #[inline]
    #[must_use]
    pub const fn inner(&self) -> &L {
        &self.inner
    }

    /// Returns the factory receiving the timings.
    #[inline]
    #[must_use]
    pub const fn monitors(&self) -> &Arc<MonitorFactory> {
        &self.monitors
    }

    /// Monitor name for a method of the wrapped repository.
    fn monitor_name(&self, method: &str) -> String {
        format!("{}.{method}", self.target)
    }
}

impl<L: RestaurantLookup> RestaurantLookup for Monitored<L> {
    #[inline]
    fn find_by_merchant_number(&self, merchant_number: &str) -> Result<Arc<Restaurant>> {
        tracing::info!(
            repository = self.target,
            merchant_number,
            "find_by_merchant_number"
        );
        self.inner.find_by_merchant_number(merchant_number)
    }
}

impl<L: AccountLookup> AccountLookup for Monitored<L> {
    #[inline]
    fn find_by_credit_card(&self, credit_card_number: &str) -> Result<Account> {
        tracing::info!(repository = self.target, "find_by_credit_card");
        self.inner.find_by_credit_card(credit_card_number)
    }

    #[inline]
    fn update_beneficiaries(&self, account: &Account) -> Result<()> {
        let monitor = self.monitors.start(self.monitor_name("update_beneficiaries"));
        let result = self.inner.update_beneficiaries(account);
        let _elapsed = monitor.stop();
        result
    }
}

impl<L: RewardLedger> RewardLedger for Monitored<L> {
    #[inline]
    fn confirm_reward(
        &self,
        contribution: &AccountContribution,
        dining: &Dining,
    ) -> Result<RewardConfirmation> {
        self.inner.confirm_reward(contribution, dining)
    }

    #[inline]
    fn record_reward(
        &self,
        account: &Account,
        benefit: MonetaryAmount,
        dining: &Dining,
    ) -> Result<RewardConfirmation> {
        let monitor = self.monitors.start(self.monitor_name("record_reward"));
        let result = self.inner.record_reward(account, benefit, dining);
        let _elapsed = monitor.stop();
        result
    }
}

/// Pointer types looked through when naming a repository.
const WRAPPERS: [&str; 3] = ["&", "alloc::sync::Arc<", "alloc::boxed::Box<"];

/// Type name without module path, pointer wrappers or generic arguments.
fn short_type_name<T>() -> &'static str {
    let mut name = core::any::type_name::<T>();
    while let Some(inner) = WRAPPERS
        .iter()
        .find_map(|wrapper| name.strip_prefix(wrapper))
    {
        name = inner;
    }
    let base = name.split('<').next().unwrap_or(name);
    base.rsplit("::").next().unwrap_or(base)
}

#[cfg(test)]
mod tests {
    use core::cell::Cell;

    use super::*;
    use crate::error::RewardsError;
    use crate::models::{AccountNumber, MerchantNumber, Percentage};

    /// Repository double that counts calls and can fail updates.
    #[derive(Debug, Default)]
    struct Recording {
        /// Calls seen so far.
        calls: Cell<u32>,
        /// When set, updates fail.
        fail_updates: bool,
    }

    impl RestaurantLookup for Recording {
        fn find_by_merchant_number(&self, merchant_number: &str) -> Result<Arc<Restaurant>> {
            self.calls.set(self.calls.get() + 1);
            Ok(Arc::new(Restaurant {
                merchant_number: MerchantNumber::from(merchant_number),
                name: "Pizza Bob's".to_owned(),
                benefit_percentage: Percentage::parse("0.08").unwrap(),
                benefit_availability_policy: crate::models::BenefitAvailabilityPolicy::default(),
            }))
        }
    }

    impl AccountLookup for Recording {
        fn find_by_credit_card(&self, _credit_card_number: &str) -> Result<Account> {
            self.calls.set(self.calls.get() + 1);
            Err(RewardsError::not_found("account", "none"))
        }

        fn update_beneficiaries(&self, _account: &Account) -> Result<()> {
            self.calls.set(self.calls.get() + 1);
            if self.fail_updates {
                return Err(RewardsError::DataAccess("disk full".into()));
            }
            Ok(())
        }
    }

    impl RewardLedger for Recording {
        fn confirm_reward(
            &self,
            _contribution: &AccountContribution,
            _dining: &Dining,
        ) -> Result<RewardConfirmation> {
            Err(RewardsError::DataAccess("ledger offline".into()))
        }

        fn record_reward(
            &self,
            _account: &Account,
            _benefit: MonetaryAmount,
            _dining: &Dining,
        ) -> Result<RewardConfirmation> {
            self.calls.set(self.calls.get() + 1);
            Err(RewardsError::DataAccess("ledger offline".into()))
        }
    }

    fn account() -> Account {
        Account::new(AccountNumber::from("123456789"), "Keith and Keri Donald")
    }

    #[test]
    fn find_is_delegated_without_timing() {
        let monitors = Arc::new(MonitorFactory::new());
        let monitored = Monitored::new(Recording::default(), Arc::clone(&monitors));

        let restaurant = monitored.find_by_merchant_number("1234567890").unwrap();
        assert_eq!(restaurant.merchant_number.as_inner(), "1234567890");
        assert!(monitored.find_by_credit_card("1").unwrap_err().is_not_found());
        assert_eq!(monitored.inner().calls.get(), 2);
        assert!(monitors.names().is_empty());
    }

    #[test]
    fn update_is_timed_under_type_and_method() {
        let monitors = Arc::new(MonitorFactory::new());
        let monitored = Monitored::new(Recording::default(), Arc::clone(&monitors));

        monitored.update_beneficiaries(&account()).unwrap();
        monitored.update_beneficiaries(&account()).unwrap();

        let stats = monitors.stats("Recording.update_beneficiaries").unwrap();
        assert_eq!(stats.calls, 2);
        assert!(stats.max <= stats.total);
        assert!(stats.average().is_some());
    }

    #[test]
    fn failed_update_is_still_timed() {
        let monitors = Arc::new(MonitorFactory::new());
        let monitored = Monitored::new(
            Recording {
                fail_updates: true,
                ..Recording::default()
            },
            Arc::clone(&monitors),
        );

        let err = monitored.update_beneficiaries(&account()).unwrap_err();
        assert!(matches!(err, RewardsError::DataAccess(_)));
        assert_eq!(monitors.stats("Recording.update_beneficiaries").unwrap().calls, 1);
    }

    #[test]
    fn record_reward_is_timed() {
        let monitors = Arc::new(MonitorFactory::new());
        let monitored = Monitored::new(Recording::default(), Arc::clone(&monitors));
        let dining = Dining::create("100.00", "1234123412341234", "1234567890").unwrap();

        let err = monitored
            .record_reward(&account(), MonetaryAmount::zero(), &dining)
            .unwrap_err();

        assert!(matches!(err, RewardsError::DataAccess(_)));
        assert_eq!(monitored.inner().calls.get(), 1);
        assert_eq!(monitors.stats("Recording.record_reward").unwrap().calls, 1);
    }

    #[test]
    fn dropped_monitor_records_once() {
        let monitors = MonitorFactory::new();
        {
            let _monitor = monitors.start("scoped");
        }
        let monitor = monitors.start("stopped");
        let _elapsed = monitor.stop();

        assert_eq!(monitors.stats("scoped").unwrap().calls, 1);
        assert_eq!(monitors.stats("stopped").unwrap().calls, 1);
        assert_eq!(monitors.names(), vec!["scoped", "stopped"]);
    }

    #[test]
    fn unknown_monitor_has_no_stats() {
        let monitors = MonitorFactory::new();
        assert!(monitors.stats("nothing").is_none());
        assert!(MonitorStats::default().average().is_none());
    }

    #[test]
    fn short_type_name_strips_path_and_generics() {
        assert_eq!(short_type_name::<Recording>(), "Recording");
        assert_eq!(short_type_name::<Vec<Recording>>(), "Vec");
        assert_eq!(short_type_name::<Arc<Recording>>(), "Recording");
        assert_eq!(short_type_name::<&Recording>(), "Recording");
    }
}
