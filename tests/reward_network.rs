//! End-to-end reward flow over the JSON file store.

use std::fs;
use std::sync::Arc;

use rewards_rs::cache::BlockingRestaurantCache;
use rewards_rs::error::RewardsError;
use rewards_rs::lifecycle::LifecycleGroup;
use rewards_rs::models::{
    Account, AccountNumber, Dining, MerchantNumber, MonetaryAmount, NaiveDate, Percentage,
    RestaurantRow,
};
use rewards_rs::monitor::{MonitorFactory, Monitored};
use rewards_rs::repository::{RestaurantLookup, StorageAccounts, StorageRewards};
use rewards_rs::reward_network::RewardNetwork;
use rewards_rs::storage::{BlockingStorage, FileStorage};
use rust_decimal_macros::dec;

fn seed(storage: &FileStorage) {
    storage
        .upsert_restaurant_rows(vec![
            RestaurantRow::new("1234567890", "Pizza Bob's", "0.08").with_policy("A"),
            RestaurantRow::new("0987654321", "Burger Barn", "0.10").with_policy("N"),
        ])
        .unwrap();
    let mut account = Account::new(AccountNumber::from("123456789"), "Keith and Keri Donald");
    account.add_credit_card("1234123412341234");
    account
        .add_beneficiary_with_allocation("Annabelle", Percentage::parse("50%").unwrap())
        .unwrap();
    account
        .add_beneficiary_with_allocation("Corgan", Percentage::parse("50%").unwrap())
        .unwrap();
    storage.upsert_accounts(vec![account]).unwrap();
}

fn dining(merchant: &str) -> Dining {
    Dining::new(
        MonetaryAmount::new(dec!(100.00)),
        "1234123412341234".to_owned(),
        MerchantNumber::from(merchant),
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
    )
}

#[test]
fn reward_for_dining_splits_between_beneficiaries() {
    let dir = tempfile::tempdir().unwrap();
    let storage = Arc::new(FileStorage::new(dir.path().to_path_buf()).unwrap());
    seed(&storage);

    let cache = Arc::new(BlockingRestaurantCache::new(Arc::clone(&storage)));
    let lifecycle = LifecycleGroup::new().with(Arc::clone(&cache));
    lifecycle.init_all().unwrap();
    assert!(cache.is_populated());

    let monitors = Arc::new(MonitorFactory::new());
    let network = RewardNetwork::new(
        Monitored::new(
            StorageAccounts::new(Arc::clone(&storage)),
            Arc::clone(&monitors),
        ),
        Monitored::new(Arc::clone(&cache), Arc::clone(&monitors)),
        Monitored::new(
            StorageRewards::open(Arc::clone(&storage)).unwrap(),
            Arc::clone(&monitors),
        ),
    );

    let confirmation = network.reward_account_for(&dining("1234567890")).unwrap();

    let contribution = &confirmation.contribution;
    assert_eq!(contribution.account_number.as_inner(), "123456789");
    assert_eq!(contribution.amount.to_string(), "8.00");
    assert_eq!(contribution.distributions.len(), 2);
    for name in ["Annabelle", "Corgan"] {
        let distribution = contribution.distribution(name).unwrap();
        assert_eq!(distribution.amount.to_string(), "4.00");
        assert_eq!(distribution.percentage.to_string(), "50%");
    }
    assert_eq!(confirmation.confirmation_number.as_inner(), "1");

    let stats = monitors.stats("StorageRewards.record_reward").unwrap();
    assert_eq!(stats.calls, 1);

    lifecycle.shutdown_all().unwrap();
    assert!(!cache.is_populated());
    assert!(cache.find_by_merchant_number("1234567890").unwrap_err().is_not_found());
}

#[test]
fn savings_and_rewards_survive_reopening_the_store() {
    let dir = tempfile::tempdir().unwrap();
    {
        let storage = Arc::new(FileStorage::new(dir.path().to_path_buf()).unwrap());
        seed(&storage);
        let cache = BlockingRestaurantCache::new(Arc::clone(&storage));
        cache.populate().unwrap();
        let network = RewardNetwork::new(
            StorageAccounts::new(Arc::clone(&storage)),
            cache,
            StorageRewards::open(Arc::clone(&storage)).unwrap(),
        );
        let _first = network.reward_account_for(&dining("1234567890")).unwrap();
        let skipped = network.reward_account_for(&dining("0987654321")).unwrap();
        assert!(skipped.contribution.amount.is_zero());
    }

    let reopened = Arc::new(FileStorage::new(dir.path().to_path_buf()).unwrap());
    let accounts = reopened.accounts().unwrap();
    assert_eq!(
        accounts[0].beneficiary("Annabelle").unwrap().savings,
        MonetaryAmount::new(dec!(4.00))
    );
    let rewards = reopened.rewards().unwrap();
    assert_eq!(rewards.len(), 2);

    let ledger = StorageRewards::open(Arc::clone(&reopened)).unwrap();
    let cache = BlockingRestaurantCache::new(Arc::clone(&reopened));
    cache.populate().unwrap();
    let network = RewardNetwork::new(StorageAccounts::new(Arc::clone(&reopened)), cache, ledger);
    let third = network.reward_account_for(&dining("1234567890")).unwrap();
    assert_eq!(third.confirmation_number.as_inner(), "3");
    assert_eq!(
        third.contribution.distribution("Corgan").unwrap().total_savings,
        MonetaryAmount::new(dec!(8.00))
    );
}

#[test]
fn bad_restaurant_row_fails_startup() {
    let dir = tempfile::tempdir().unwrap();
    let storage = Arc::new(FileStorage::new(dir.path().to_path_buf()).unwrap());
    seed(&storage);
    storage
        .upsert_restaurant_rows(vec![
            RestaurantRow::new("5555555555", "Mystery Diner", "0.05").with_policy("Q"),
        ])
        .unwrap();

    let cache = Arc::new(BlockingRestaurantCache::new(Arc::clone(&storage)));
    let lifecycle = LifecycleGroup::new().with(Arc::clone(&cache));
    let err = lifecycle.init_all().unwrap_err();

    assert!(err.to_string().contains("5555555555"));
    assert!(!cache.is_populated());
}

#[test]
fn failed_reward_write_keeps_no_savings() {
    let dir = tempfile::tempdir().unwrap();
    let storage = Arc::new(FileStorage::new(dir.path().to_path_buf()).unwrap());
    seed(&storage);
    // A directory in the way of the temporary rewards file makes the write fail.
    fs::create_dir(dir.path().join("rewards.json.tmp")).unwrap();

    let cache = BlockingRestaurantCache::new(Arc::clone(&storage));
    cache.populate().unwrap();
    let network = RewardNetwork::new(
        StorageAccounts::new(Arc::clone(&storage)),
        cache,
        StorageRewards::open(Arc::clone(&storage)).unwrap(),
    );

    let err = network.reward_account_for(&dining("1234567890")).unwrap_err();

    assert!(matches!(err, RewardsError::DataAccess(_)));
    assert!(storage.rewards().unwrap().is_empty());
    let accounts = storage.accounts().unwrap();
    assert!(accounts[0].beneficiaries.iter().all(|b| b.savings.is_zero()));
}

#[test]
fn concurrent_dinings_on_one_account_keep_every_credit() {
    let dir = tempfile::tempdir().unwrap();
    let storage = Arc::new(FileStorage::new(dir.path().to_path_buf()).unwrap());
    storage
        .upsert_restaurant_rows(vec![
            RestaurantRow::new("1234567890", "Pizza Bob's", "0.08").with_policy("A"),
        ])
        .unwrap();
    let mut account = Account::new(AccountNumber::from("123456789"), "Keith and Keri Donald");
    account.add_credit_card("1234123412341234");
    account.add_beneficiary("Annabelle").unwrap();
    storage.upsert_accounts(vec![account]).unwrap();

    let cache = BlockingRestaurantCache::new(Arc::clone(&storage));
    cache.populate().unwrap();
    let network = RewardNetwork::new(
        StorageAccounts::new(Arc::clone(&storage)),
        cache,
        StorageRewards::open(Arc::clone(&storage)).unwrap(),
    );

    std::thread::scope(|scope| {
        for _ in 0..4 {
            let _worker = scope.spawn(|| {
                for _ in 0..10 {
                    let _confirmation = network.reward_account_for(&dining("1234567890")).unwrap();
                }
            });
        }
    });

    let rewards = storage.rewards().unwrap();
    assert_eq!(rewards.len(), 40);
    let mut numbers: Vec<&str> = rewards
        .iter()
        .map(|reward| reward.confirmation_number.as_inner())
        .collect();
    numbers.sort_unstable();
    numbers.dedup();
    assert_eq!(numbers.len(), 40);
    assert_eq!(
        storage.accounts().unwrap()[0].beneficiary("Annabelle").unwrap().savings,
        MonetaryAmount::new(dec!(320.00))
    );
}
