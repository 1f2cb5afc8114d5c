//! SQLite storage backend.
//!
//! Restaurants live in `T_RESTAURANT` with the column layout the cache
//! expects. Accounts are split over `T_ACCOUNT`, `T_ACCOUNT_CREDIT_CARD` and
//! `T_ACCOUNT_BENEFICIARY`; rewards are appended to `T_REWARD`.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use chrono::NaiveDate;
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, Row, TransactionBehavior, params};

use super::{credit_account, data_access_error, lock_poison_error};
use crate::error::Result;
use crate::models::{
    Account, AccountContribution, AccountNumber, ConfirmationNumber, Dining, Distribution,
    MerchantNumber, MonetaryAmount, Percentage, RestaurantRow, RewardConfirmation,
};

/// SQL statements used by [`SqliteStorage`].
mod schema {
    /// Creates every table if missing.
    pub(super) const CREATE_TABLES: &str = "
        CREATE TABLE IF NOT EXISTS T_RESTAURANT (
            MERCHANT_NUMBER TEXT PRIMARY KEY,
            NAME TEXT NOT NULL,
            BENEFIT_PERCENTAGE TEXT NOT NULL,
            BENEFIT_AVAILABILITY_POLICY TEXT
        );
        CREATE TABLE IF NOT EXISTS T_ACCOUNT (
            NUMBER TEXT PRIMARY KEY,
            NAME TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS T_ACCOUNT_CREDIT_CARD (
            ACCOUNT_NUMBER TEXT NOT NULL REFERENCES T_ACCOUNT (NUMBER),
            NUMBER TEXT NOT NULL,
            POSITION INTEGER NOT NULL,
            PRIMARY KEY (ACCOUNT_NUMBER, NUMBER)
        );
        CREATE TABLE IF NOT EXISTS T_ACCOUNT_BENEFICIARY (
            ACCOUNT_NUMBER TEXT NOT NULL REFERENCES T_ACCOUNT (NUMBER),
            NAME TEXT NOT NULL,
            ALLOCATION_PERCENTAGE TEXT NOT NULL,
            SAVINGS TEXT NOT NULL,
            POSITION INTEGER NOT NULL,
            PRIMARY KEY (ACCOUNT_NUMBER, NAME)
        );
        CREATE TABLE IF NOT EXISTS T_REWARD (
            ID INTEGER PRIMARY KEY AUTOINCREMENT,
            CONFIRMATION_NUMBER TEXT NOT NULL UNIQUE,
            ACCOUNT_NUMBER TEXT NOT NULL,
            REWARD_AMOUNT TEXT NOT NULL,
            DINING_AMOUNT TEXT NOT NULL,
            DINING_CREDIT_CARD TEXT NOT NULL,
            DINING_MERCHANT_NUMBER TEXT NOT NULL,
            DINING_DATE TEXT NOT NULL,
            DISTRIBUTIONS TEXT NOT NULL
        );
    ";

    /// Selects every restaurant row.
    pub(super) const SELECT_RESTAURANTS: &str = "select MERCHANT_NUMBER, NAME, BENEFIT_PERCENTAGE, BENEFIT_AVAILABILITY_POLICY from T_RESTAURANT";

    /// Selects one restaurant row by merchant number.
    pub(super) const SELECT_RESTAURANT_BY_MERCHANT_NUMBER: &str = "select MERCHANT_NUMBER, NAME, BENEFIT_PERCENTAGE, BENEFIT_AVAILABILITY_POLICY from T_RESTAURANT where MERCHANT_NUMBER = ?1";

    /// Inserts or updates a restaurant row.
    pub(super) const UPSERT_RESTAURANT: &str = "
        INSERT INTO T_RESTAURANT (MERCHANT_NUMBER, NAME, BENEFIT_PERCENTAGE, BENEFIT_AVAILABILITY_POLICY)
        VALUES (?1, ?2, ?3, ?4)
        ON CONFLICT (MERCHANT_NUMBER) DO UPDATE SET
            NAME = excluded.NAME,
            BENEFIT_PERCENTAGE = excluded.BENEFIT_PERCENTAGE,
            BENEFIT_AVAILABILITY_POLICY = excluded.BENEFIT_AVAILABILITY_POLICY";

    /// Selects every account header.
    pub(super) const SELECT_ACCOUNTS: &str = "SELECT NUMBER, NAME FROM T_ACCOUNT ORDER BY rowid";

    /// Selects every credit card, grouped by account.
    pub(super) const SELECT_CREDIT_CARDS: &str =
        "SELECT ACCOUNT_NUMBER, NUMBER FROM T_ACCOUNT_CREDIT_CARD ORDER BY ACCOUNT_NUMBER, POSITION";

    /// Selects every beneficiary, grouped by account.
    pub(super) const SELECT_BENEFICIARIES: &str = "SELECT ACCOUNT_NUMBER, NAME, ALLOCATION_PERCENTAGE, SAVINGS FROM T_ACCOUNT_BENEFICIARY ORDER BY ACCOUNT_NUMBER, POSITION";

    /// Inserts or renames an account header.
    pub(super) const UPSERT_ACCOUNT: &str = "
        INSERT INTO T_ACCOUNT (NUMBER, NAME) VALUES (?1, ?2)
        ON CONFLICT (NUMBER) DO UPDATE SET NAME = excluded.NAME";

    /// Drops the credit cards of one account.
    pub(super) const DELETE_CREDIT_CARDS: &str =
        "DELETE FROM T_ACCOUNT_CREDIT_CARD WHERE ACCOUNT_NUMBER = ?1";

    /// Drops the beneficiaries of one account.
    pub(super) const DELETE_BENEFICIARIES: &str =
        "DELETE FROM T_ACCOUNT_BENEFICIARY WHERE ACCOUNT_NUMBER = ?1";

    /// Inserts one credit card.
    pub(super) const INSERT_CREDIT_CARD: &str =
        "INSERT INTO T_ACCOUNT_CREDIT_CARD (ACCOUNT_NUMBER, NUMBER, POSITION) VALUES (?1, ?2, ?3)";

    /// Inserts one beneficiary.
    pub(super) const INSERT_BENEFICIARY: &str = "INSERT INTO T_ACCOUNT_BENEFICIARY (ACCOUNT_NUMBER, NAME, ALLOCATION_PERCENTAGE, SAVINGS, POSITION) VALUES (?1, ?2, ?3, ?4, ?5)";

    /// Selects every reward, oldest first.
    pub(super) const SELECT_REWARDS: &str = "SELECT CONFIRMATION_NUMBER, ACCOUNT_NUMBER, REWARD_AMOUNT, DINING_AMOUNT, DINING_CREDIT_CARD, DINING_MERCHANT_NUMBER, DINING_DATE, DISTRIBUTIONS FROM T_REWARD ORDER BY ID";

    /// Appends one reward.
    pub(super) const INSERT_REWARD: &str = "INSERT INTO T_REWARD (CONFIRMATION_NUMBER, ACCOUNT_NUMBER, REWARD_AMOUNT, DINING_AMOUNT, DINING_CREDIT_CARD, DINING_MERCHANT_NUMBER, DINING_DATE, DISTRIBUTIONS) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)";

    /// Empties every table.
    pub(super) const DELETE_ALL: &str = "
        DELETE FROM T_REWARD;
        DELETE FROM T_ACCOUNT_BENEFICIARY;
        DELETE FROM T_ACCOUNT_CREDIT_CARD;
        DELETE FROM T_ACCOUNT;
        DELETE FROM T_RESTAURANT;
    ";
}

/// Date format of the `DINING_DATE` column.
const DATE_FORMAT: &str = "%Y-%m-%d";

/// SQLite-backed storage.
///
/// A single connection is shared behind a [`Mutex`]; statements are
/// prepared per call and finalized when they go out of scope. Multi-row
/// writes run inside one transaction.
#[derive(Debug)]
pub struct SqliteStorage {
    /// Connection guarded for thread-safe access.
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    /// Opens (or creates) a database file and ensures the schema exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or the schema
    /// cannot be created.
    #[inline]
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path.as_ref()).map_err(data_access_error)?;
        tracing::debug!(path = %path.as_ref().display(), "opened sqlite storage");
        Self::with_schema(conn)
    }

    /// Opens a private in-memory database.
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be created.
    #[inline]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(data_access_error)?;
        Self::with_schema(conn)
    }

    /// Creates the tables on a fresh connection.
    fn with_schema(conn: Connection) -> Result<Self> {
        conn.execute_batch(schema::CREATE_TABLES)
            .map_err(data_access_error)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Acquires the connection and applies a closure.
    fn with_conn<R, F: FnOnce(&mut Connection) -> Result<R>>(&self, op: F) -> Result<R> {
        let mut conn = self.conn.lock().map_err(|err| lock_poison_error(&err))?;
        op(&mut conn)
    }

    /// Reads every account together with its cards and beneficiaries.
    fn load_accounts(conn: &Connection) -> Result<Vec<Account>> {
        let mut accounts = {
            let mut stmt = conn.prepare(schema::SELECT_ACCOUNTS).map_err(data_access_error)?;
            let mapped = stmt
                .query_map([], |row| {
                    Ok(Account::new(
                        AccountNumber::new(row.get(0)?),
                        row.get::<_, String>(1)?,
                    ))
                })
                .map_err(data_access_error)?;
            mapped
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(data_access_error)?
        };
        let index: HashMap<String, usize> = accounts
            .iter()
            .enumerate()
            .map(|(idx, account)| (account.number.as_inner().to_owned(), idx))
            .collect();

        let cards: Vec<(String, String)> = {
            let mut stmt = conn
                .prepare(schema::SELECT_CREDIT_CARDS)
                .map_err(data_access_error)?;
            let mapped = stmt
                .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
                .map_err(data_access_error)?;
            mapped
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(data_access_error)?
        };
        for (owner, card) in cards {
            if let Some(account) = index.get(&owner).and_then(|&idx| accounts.get_mut(idx)) {
                account.add_credit_card(card);
            }
        }

        let beneficiaries: Vec<(String, String, String, String)> = {
            let mut stmt = conn
                .prepare(schema::SELECT_BENEFICIARIES)
                .map_err(data_access_error)?;
            let mapped = stmt
                .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)))
                .map_err(data_access_error)?;
            mapped
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(data_access_error)?
        };
        for (owner, name, allocation, savings) in beneficiaries {
            if let Some(account) = index.get(&owner).and_then(|&idx| accounts.get_mut(idx)) {
                account.add_beneficiary_with_allocation(name.as_str(), Percentage::parse(&allocation)?)?;
                if let Some(added) = account.beneficiaries.last_mut() {
                    added.savings = MonetaryAmount::parse(&savings)?;
                }
            }
        }
        Ok(accounts)
    }

    /// Replaces the stored state of the given accounts.
    ///
    /// Runs inside the caller's transaction.
    fn write_accounts(tx: &Connection, items: &[Account]) -> Result<()> {
        for account in items {
            let number = account.number.as_inner();
            let _changed = tx
                .execute(schema::UPSERT_ACCOUNT, params![number, account.name])
                .map_err(data_access_error)?;
            let _removed = tx
                .execute(schema::DELETE_CREDIT_CARDS, params![number])
                .map_err(data_access_error)?;
            let _removed = tx
                .execute(schema::DELETE_BENEFICIARIES, params![number])
                .map_err(data_access_error)?;
            for (position, card) in (0_i64..).zip(&account.credit_cards) {
                let _inserted = tx
                    .execute(schema::INSERT_CREDIT_CARD, params![number, card, position])
                    .map_err(data_access_error)?;
            }
            for (position, beneficiary) in (0_i64..).zip(&account.beneficiaries) {
                let _inserted = tx
                    .execute(
                        schema::INSERT_BENEFICIARY,
                        params![
                            number,
                            beneficiary.name,
                            beneficiary.allocation_percentage.as_decimal().to_string(),
                            beneficiary.savings.to_string(),
                            position
                        ],
                    )
                    .map_err(data_access_error)?;
            }
        }
        Ok(())
    }

    /// Appends one reward row.
    fn write_reward(conn: &Connection, reward: &RewardConfirmation) -> Result<()> {
        let distributions = serde_json::to_string(&reward.contribution.distributions)?;
        let _inserted = conn
            .execute(
                schema::INSERT_REWARD,
                params![
                    reward.confirmation_number.as_inner(),
                    reward.contribution.account_number.as_inner(),
                    reward.contribution.amount.to_string(),
                    reward.dining.amount.to_string(),
                    reward.dining.credit_card_number,
                    reward.dining.merchant_number.as_inner(),
                    reward.dining.date.format(DATE_FORMAT).to_string(),
                    distributions
                ],
            )
            .map_err(data_access_error)?;
        Ok(())
    }

    /// Reads every stored reward.
    fn load_rewards(conn: &Connection) -> Result<Vec<RewardConfirmation>> {
        let raw = {
            let mut stmt = conn.prepare(schema::SELECT_REWARDS).map_err(data_access_error)?;
            let mapped = stmt
                .query_map([], row_to_raw_reward)
                .map_err(data_access_error)?;
            mapped
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(data_access_error)?
        };
        raw.into_iter().map(RawReward::into_confirmation).collect()
    }
}

/// Reward columns before parsing.
#[derive(Debug)]
struct RawReward {
    /// `CONFIRMATION_NUMBER` column.
    confirmation_number: String,
    /// `ACCOUNT_NUMBER` column.
    account_number: String,
    /// `REWARD_AMOUNT` column.
    reward_amount: String,
    /// `DINING_AMOUNT` column.
    dining_amount: String,
    /// `DINING_CREDIT_CARD` column.
    dining_credit_card: String,
    /// `DINING_MERCHANT_NUMBER` column.
    dining_merchant_number: String,
    /// `DINING_DATE` column.
    dining_date: String,
    /// `DISTRIBUTIONS` column (JSON array).
    distributions: String,
}

impl RawReward {
    /// Parses the stored columns into a confirmation.
    fn into_confirmation(self) -> Result<RewardConfirmation> {
        let date =
            NaiveDate::parse_from_str(&self.dining_date, DATE_FORMAT).map_err(data_access_error)?;
        let distributions: Vec<Distribution> = serde_json::from_str(&self.distributions)?;
        Ok(RewardConfirmation {
            confirmation_number: ConfirmationNumber::new(self.confirmation_number),
            contribution: AccountContribution {
                account_number: AccountNumber::new(self.account_number),
                amount: MonetaryAmount::parse(&self.reward_amount)?,
                distributions,
            },
            dining: Dining::new(
                MonetaryAmount::parse(&self.dining_amount)?,
                self.dining_credit_card,
                MerchantNumber::new(self.dining_merchant_number),
                date,
            ),
        })
    }
}

/// Reads a `T_REWARD` row.
fn row_to_raw_reward(row: &Row<'_>) -> rusqlite::Result<RawReward> {
    Ok(RawReward {
        confirmation_number: row.get(0)?,
        account_number: row.get(1)?,
        reward_amount: row.get(2)?,
        dining_amount: row.get(3)?,
        dining_credit_card: row.get(4)?,
        dining_merchant_number: row.get(5)?,
        dining_date: row.get(6)?,
        distributions: row.get(7)?,
    })
}

/// Reads a `T_RESTAURANT` row.
///
/// `BENEFIT_PERCENTAGE` is accepted with any column affinity and handed on
/// as text; parsing it is the mapper's job.
fn row_to_restaurant(row: &Row<'_>) -> rusqlite::Result<RestaurantRow> {
    Ok(RestaurantRow {
        merchant_number: row.get(0)?,
        name: row.get(1)?,
        benefit_percentage: value_to_text(row.get(2)?),
        benefit_availability_policy: row.get(3)?,
    })
}

/// Renders a dynamically typed column as text.
fn value_to_text(value: Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Integer(int) => int.to_string(),
        Value::Real(real) => real.to_string(),
        Value::Text(text) => text,
        Value::Blob(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
    }
}

// ── BlockingStorage implementation ──────────────────────────────────────

impl super::BlockingStorage for SqliteStorage {
    #[inline]
    fn restaurant_rows(&self) -> Result<Vec<RestaurantRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(schema::SELECT_RESTAURANTS)
                .map_err(data_access_error)?;
            let mapped = stmt
                .query_map([], row_to_restaurant)
                .map_err(data_access_error)?;
            let rows = mapped
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(data_access_error)?;
            Ok(rows)
        })
    }

    #[inline]
    fn restaurant_row(&self, merchant_number: &str) -> Result<Option<RestaurantRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                schema::SELECT_RESTAURANT_BY_MERCHANT_NUMBER,
                [merchant_number],
                row_to_restaurant,
            )
            .optional()
            .map_err(data_access_error)
        })
    }

    #[inline]
    fn upsert_restaurant_rows(&self, items: Vec<RestaurantRow>) -> Result<()> {
        if items.is_empty() {
            return Ok(());
        }
        self.with_conn(|conn| {
            let tx = conn.transaction().map_err(data_access_error)?;
            for row in &items {
                let _changed = tx
                    .execute(
                        schema::UPSERT_RESTAURANT,
                        params![
                            row.merchant_number,
                            row.name,
                            row.benefit_percentage,
                            row.benefit_availability_policy
                        ],
                    )
                    .map_err(data_access_error)?;
            }
            tx.commit().map_err(data_access_error)
        })
    }

    #[inline]
    fn accounts(&self) -> Result<Vec<Account>> {
        self.with_conn(|conn| Self::load_accounts(conn))
    }

    #[inline]
    fn upsert_accounts(&self, items: Vec<Account>) -> Result<()> {
        if items.is_empty() {
            return Ok(());
        }
        self.with_conn(|conn| {
            let tx = conn.transaction().map_err(data_access_error)?;
            Self::write_accounts(&tx, &items)?;
            tx.commit().map_err(data_access_error)
        })
    }

    #[inline]
    fn rewards(&self) -> Result<Vec<RewardConfirmation>> {
        self.with_conn(|conn| Self::load_rewards(conn))
    }

    #[inline]
    fn insert_reward(&self, reward: RewardConfirmation) -> Result<()> {
        self.with_conn(|conn| Self::write_reward(conn, &reward))
    }

    #[inline]
    fn record_reward(
        &self,
        account_number: &AccountNumber,
        benefit: MonetaryAmount,
        confirmation_number: ConfirmationNumber,
        dining: &Dining,
    ) -> Result<RewardConfirmation> {
        self.with_conn(|conn| {
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(data_access_error)?;
            let mut accounts = Self::load_accounts(&tx)?;
            let (credited, reward) = credit_account(
                &mut accounts,
                account_number,
                benefit,
                confirmation_number,
                dining,
            )?;
            Self::write_accounts(&tx, &[credited])?;
            Self::write_reward(&tx, &reward)?;
            tx.commit().map_err(data_access_error)?;
            Ok(reward)
        })
    }

    #[inline]
    fn clear(&self) -> Result<()> {
        self.with_conn(|conn| conn.execute_batch(schema::DELETE_ALL).map_err(data_access_error))
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;
    use crate::error::RewardsError;
    use crate::storage::BlockingStorage;

    fn pizza_bobs() -> RestaurantRow {
        RestaurantRow::new("1234567890", "Pizza Bob's", "0.08").with_policy("A")
    }

    fn test_account() -> Account {
        let mut account = Account::new(AccountNumber::from("123456789"), "Keith and Keri Donald");
        account.add_credit_card("1234123412341234");
        account
            .add_beneficiary_with_allocation("Annabelle", Percentage::parse("50%").unwrap())
            .unwrap();
        account
            .add_beneficiary_with_allocation("Corgan", Percentage::parse("50%").unwrap())
            .unwrap();
        account
    }

    #[test]
    fn restaurant_rows_roundtrip() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        let plain = RestaurantRow::new("0987654321", "Burger Barn", "0.05");
        storage
            .upsert_restaurant_rows(vec![pizza_bobs(), plain.clone()])
            .unwrap();

        let mut rows = storage.restaurant_rows().unwrap();
        rows.sort_by(|a, b| a.merchant_number.cmp(&b.merchant_number));
        assert_eq!(rows, vec![plain, pizza_bobs()]);
    }

    #[test]
    fn parameterized_select_by_merchant_number() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        storage.upsert_restaurant_rows(vec![pizza_bobs()]).unwrap();
        assert_eq!(storage.restaurant_row("1234567890").unwrap(), Some(pizza_bobs()));
        assert!(storage.restaurant_row("0000000000").unwrap().is_none());
    }

    #[test]
    fn numeric_percentage_column_is_read_as_text() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        storage
            .with_conn(|conn| {
                conn.execute_batch(
                    "INSERT INTO T_RESTAURANT VALUES ('1111111111', 'Numeric', 0.25, 'A')",
                )
                .map_err(data_access_error)
            })
            .unwrap();
        let row = storage.restaurant_row("1111111111").unwrap().unwrap();
        assert_eq!(row.benefit_percentage, "0.25");
        assert_eq!(
            row.into_restaurant().unwrap().benefit_percentage.as_decimal(),
            dec!(0.25)
        );
    }

    #[test]
    fn upsert_updates_existing_restaurant() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        storage.upsert_restaurant_rows(vec![pizza_bobs()]).unwrap();
        storage
            .upsert_restaurant_rows(vec![
                RestaurantRow::new("1234567890", "Pizza Bob's", "0.10").with_policy("N"),
            ])
            .unwrap();
        let rows = storage.restaurant_rows().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].benefit_availability_policy.as_deref(), Some("N"));
    }

    #[test]
    fn accounts_roundtrip_with_savings() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        let mut account = test_account();
        let _contribution = account
            .make_contribution(MonetaryAmount::new(dec!(8)))
            .unwrap();
        storage.upsert_accounts(vec![account.clone()]).unwrap();

        let accounts = storage.accounts().unwrap();
        assert_eq!(accounts, vec![account]);
    }

    #[test]
    fn rewards_roundtrip() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        let mut account = test_account();
        let contribution = account
            .make_contribution(MonetaryAmount::new(dec!(8)))
            .unwrap();
        let reward = RewardConfirmation {
            confirmation_number: ConfirmationNumber::from("1"),
            contribution,
            dining: Dining::new(
                MonetaryAmount::new(dec!(100)),
                "1234123412341234".to_owned(),
                MerchantNumber::from("1234567890"),
                NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            ),
        };
        storage.insert_reward(reward.clone()).unwrap();
        assert_eq!(storage.rewards().unwrap(), vec![reward]);
    }

    #[test]
    fn clear_empties_all_tables() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        storage.upsert_restaurant_rows(vec![pizza_bobs()]).unwrap();
        storage.upsert_accounts(vec![test_account()]).unwrap();
        storage.clear().unwrap();
        assert!(storage.restaurant_rows().unwrap().is_empty());
        assert!(storage.accounts().unwrap().is_empty());
    }

    #[test]
    fn file_database_persists_between_opens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rewards.db");
        {
            let storage = SqliteStorage::open(&path).unwrap();
            storage.upsert_restaurant_rows(vec![pizza_bobs()]).unwrap();
        }
        let reopened = SqliteStorage::open(&path).unwrap();
        assert_eq!(reopened.restaurant_rows().unwrap(), vec![pizza_bobs()]);
    }

    fn dining() -> Dining {
        Dining::new(
            MonetaryAmount::new(dec!(100)),
            "1234123412341234".to_owned(),
            MerchantNumber::from("1234567890"),
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        )
    }

    #[test]
    fn record_reward_commits_savings_and_reward() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        storage.upsert_accounts(vec![test_account()]).unwrap();

        let reward = storage
            .record_reward(
                &AccountNumber::from("123456789"),
                MonetaryAmount::new(dec!(8)),
                ConfirmationNumber::from("1"),
                &dining(),
            )
            .unwrap();

        assert_eq!(storage.rewards().unwrap(), vec![reward]);
        let stored = storage.accounts().unwrap();
        assert_eq!(
            stored[0].beneficiary("Corgan").unwrap().savings,
            MonetaryAmount::new(dec!(4))
        );
        assert_eq!(stored[0].credit_cards, vec!["1234123412341234".to_owned()]);
    }

    #[test]
    fn failed_reward_insert_rolls_back_savings() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        storage.upsert_accounts(vec![test_account()]).unwrap();
        storage
            .with_conn(|conn| conn.execute_batch("DROP TABLE T_REWARD").map_err(data_access_error))
            .unwrap();

        let err = storage
            .record_reward(
                &AccountNumber::from("123456789"),
                MonetaryAmount::new(dec!(8)),
                ConfirmationNumber::from("1"),
                &dining(),
            )
            .unwrap_err();

        assert!(matches!(err, RewardsError::DataAccess(_)));
        let stored = storage.accounts().unwrap();
        assert!(stored[0].beneficiaries.iter().all(|b| b.savings.is_zero()));
    }

    #[test]
    fn missing_table_is_data_access_error() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        storage
            .with_conn(|conn| {
                conn.execute_batch("DROP TABLE T_RESTAURANT")
                    .map_err(data_access_error)
            })
            .unwrap();
        let err = storage.restaurant_rows().unwrap_err();
        assert!(matches!(err, RewardsError::DataAccess(_)));
    }
}
