//! CLI binary for seeding and exercising a local reward network.

use std::io::{self, Write as _};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color, Table};
use owo_colors::OwoColorize;
use rewards_rs::cache::BlockingRestaurantCache;
use rewards_rs::error::RewardsError;
use rewards_rs::lifecycle::LifecycleGroup;
use rewards_rs::models::{
    Account, AccountNumber, Dining, Percentage, Restaurant, RestaurantRow, RewardConfirmation,
};
use rewards_rs::monitor::{MonitorFactory, Monitored};
use rewards_rs::repository::{RestaurantLookup, StorageAccounts, StorageRewards};
use rewards_rs::reward_network::RewardNetwork;
#[cfg(feature = "storage-sqlite")]
use rewards_rs::storage::SqliteStorage;
use rewards_rs::storage::{BlockingStorage, FileStorage};

/// Environment variable naming a SQLite database to use instead of JSON
/// files.
const SQLITE_ENV: &str = "REWARDS_SQLITE";

/// Reward network CLI: seed, inspect and dine.
#[derive(Debug, Parser)]
#[command(name = "rewards", version, about)]
struct Cli {
    /// Override the JSON storage directory (default: XDG data dir).
    #[arg(long, global = true, value_name = "DIR")]
    data_dir: Option<PathBuf>,
    /// Use a SQLite database instead of JSON files.
    #[arg(long, global = true, value_name = "PATH")]
    sqlite: Option<PathBuf>,
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
enum Command {
    /// Load sample restaurants and accounts into storage.
    Seed,
    /// Populate the restaurant cache and list every restaurant.
    Restaurants,
    /// Look up one restaurant by merchant number.
    Restaurant {
        /// Merchant number to look up.
        merchant_number: String,
    },
    /// List accounts with their beneficiaries.
    Accounts,
    /// Reward the account charged for a dining event dated today.
    Dine {
        /// Bill amount, e.g. `100.00`.
        #[arg(long)]
        amount: String,
        /// Credit card the bill was charged to.
        #[arg(long)]
        card: String,
        /// Merchant number of the restaurant.
        #[arg(long)]
        merchant: String,
    },
    /// List recorded reward confirmations.
    Rewards,
    /// Remove everything from storage.
    Clear,
}

/// Reads the SQLite path from the environment.
fn sqlite_from_env() -> Option<PathBuf> {
    std::env::var_os(SQLITE_ENV)
        .filter(|val| !val.is_empty())
        .map(PathBuf::from)
}

/// Prints an error with context and returns a failure exit code.
fn report(context: &str, err: &RewardsError) -> io::Result<ExitCode> {
    writeln!(
        io::stderr().lock(),
        "{} {context}: {err}",
        "error:".red().bold()
    )?;
    Ok(ExitCode::FAILURE)
}

/// Runs the CLI, returning an appropriate exit code.
fn run() -> io::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let _dotenv = dotenvy::dotenv();

    let cli = Cli::parse();

    match cli.sqlite.or_else(sqlite_from_env) {
        Some(path) => dispatch_sqlite(&path, cli.command),
        None => match create_storage(cli.data_dir) {
            Ok(storage) => dispatch(&Arc::new(storage), cli.command),
            Err(err) => report("failed to initialize storage", &err),
        },
    }
}

/// Creates the JSON storage backend, using `data_dir` if provided or the
/// default XDG data directory otherwise.
fn create_storage(data_dir: Option<PathBuf>) -> rewards_rs::error::Result<FileStorage> {
    let dir = match data_dir {
        Some(dir) => dir,
        None => FileStorage::default_dir()?,
    };
    FileStorage::new(dir)
}

/// Opens the SQLite backend and dispatches.
#[cfg(feature = "storage-sqlite")]
fn dispatch_sqlite(path: &Path, command: Command) -> io::Result<ExitCode> {
    match SqliteStorage::open(path) {
        Ok(storage) => dispatch(&Arc::new(storage), command),
        Err(err) => report("failed to open sqlite database", &err),
    }
}

/// Rejects `--sqlite` when the backend is not compiled in.
#[cfg(not(feature = "storage-sqlite"))]
fn dispatch_sqlite(path: &Path, _command: Command) -> io::Result<ExitCode> {
    writeln!(
        io::stderr().lock(),
        "{} cannot open {}: built without the {} feature",
        "error:".red().bold(),
        path.display(),
        "storage-sqlite".bold()
    )?;
    Ok(ExitCode::FAILURE)
}

/// Dispatches to the appropriate subcommand handler.
fn dispatch<S: BlockingStorage + 'static>(
    storage: &Arc<S>,
    command: Command,
) -> io::Result<ExitCode> {
    match command {
        Command::Seed => cmd_seed(&*storage),
        Command::Restaurants => cmd_restaurants(storage),
        Command::Restaurant { merchant_number } => cmd_restaurant(storage, &merchant_number),
        Command::Accounts => cmd_accounts(&**storage),
        Command::Dine {
            amount,
            card,
            merchant,
        } => cmd_dine(storage, &amount, &card, &merchant),
        Command::Rewards => cmd_rewards(&**storage),
        Command::Clear => cmd_clear(&**storage),
    }
}

// ── Sample data ──────────────────────────────────────────────────────

/// Sample restaurant rows.
fn sample_restaurants() -> Vec<RestaurantRow> {
    vec![
        RestaurantRow::new("1234567890", "Pizza Bob's", "0.08").with_policy("A"),
        RestaurantRow::new("1234567891", "Nona's Trattoria", "0.06").with_policy("A"),
        RestaurantRow::new("1234567892", "Harbor Grill", "5%"),
        RestaurantRow::new("0987654321", "Burger Barn", "0.10").with_policy("N"),
    ]
}

/// Sample accounts.
fn sample_accounts() -> rewards_rs::error::Result<Vec<Account>> {
    let mut donald = Account::new(AccountNumber::from("123456789"), "Keith and Keri Donald");
    donald.add_credit_card("1234123412341234");
    donald.add_beneficiary_with_allocation("Annabelle", Percentage::parse("50%")?)?;
    donald.add_beneficiary_with_allocation("Corgan", Percentage::parse("50%")?)?;

    let mut adams = Account::new(AccountNumber::from("123456001"), "Dollie R. Adams");
    adams.add_credit_card("1234123412340001");
    adams.add_beneficiary("Jack")?;

    Ok(vec![donald, adams])
}

/// Writes the sample data into `storage`.
fn seed<S: BlockingStorage>(storage: &S) -> rewards_rs::error::Result<(usize, usize)> {
    let restaurants = sample_restaurants();
    let accounts = sample_accounts()?;
    let counts = (restaurants.len(), accounts.len());
    storage.upsert_restaurant_rows(restaurants)?;
    storage.upsert_accounts(accounts)?;
    Ok(counts)
}

/// Populates a restaurant cache over `storage`.
fn populated_cache<S: BlockingStorage>(
    storage: &Arc<S>,
) -> rewards_rs::error::Result<BlockingRestaurantCache<Arc<S>>> {
    let cache = BlockingRestaurantCache::new(Arc::clone(storage));
    cache.populate()?;
    Ok(cache)
}

/// Runs one dining event through a monitored reward network.
///
/// The restaurant cache is initialized and shut down through a
/// [`LifecycleGroup`]. Everything that can fail before the reward runs is
/// opened ahead of initialization, so every initialized component is shut
/// down again. Timings are collected in the returned factory.
fn dine<S: BlockingStorage + 'static>(
    storage: &Arc<S>,
    dining: &Dining,
) -> rewards_rs::error::Result<(RewardConfirmation, Arc<MonitorFactory>)> {
    let monitors = Arc::new(MonitorFactory::new());
    let ledger = Monitored::new(
        StorageRewards::open(Arc::clone(storage))?,
        Arc::clone(&monitors),
    );
    let cache = Arc::new(BlockingRestaurantCache::new(Arc::clone(storage)));
    let lifecycle = LifecycleGroup::new().with(Arc::clone(&cache));
    lifecycle.init_all()?;

    let network = RewardNetwork::new(
        Monitored::new(
            StorageAccounts::new(Arc::clone(storage)),
            Arc::clone(&monitors),
        ),
        Monitored::new(cache, Arc::clone(&monitors)),
        ledger,
    );
    let rewarded = network.reward_account_for(dining);
    let stopped = lifecycle.shutdown_all();
    let confirmation = rewarded?;
    stopped?;
    Ok((confirmation, monitors))
}

// ── Commands ─────────────────────────────────────────────────────────

/// Executes the `seed` subcommand.
fn cmd_seed<S: BlockingStorage>(storage: &S) -> io::Result<ExitCode> {
    match seed(storage) {
        Ok((restaurants, accounts)) => {
            writeln!(
                io::stdout().lock(),
                "{} {}",
                "Seeded".green().bold(),
                format_args!("{restaurants} restaurants, {accounts} accounts").dimmed()
            )?;
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => report("failed to seed storage", &err),
    }
}

/// Executes the `restaurants` subcommand.
fn cmd_restaurants<S: BlockingStorage>(storage: &Arc<S>) -> io::Result<ExitCode> {
    match populated_cache(storage) {
        Ok(cache) => {
            let restaurants = cache.restaurants();
            print_restaurants_table(&restaurants)?;
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => report("failed to populate restaurant cache", &err),
    }
}

/// Executes the `restaurant` subcommand.
fn cmd_restaurant<S: BlockingStorage>(
    storage: &Arc<S>,
    merchant_number: &str,
) -> io::Result<ExitCode> {
    let found =
        populated_cache(storage).and_then(|cache| cache.find_by_merchant_number(merchant_number));
    match found {
        Ok(restaurant) => {
            print_restaurants_table(&[restaurant])?;
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => report("restaurant lookup failed", &err),
    }
}

/// Executes the `accounts` subcommand.
fn cmd_accounts<S: BlockingStorage>(storage: &S) -> io::Result<ExitCode> {
    match storage.accounts() {
        Ok(accounts) => {
            print_accounts_table(&accounts)?;
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => report("failed to read accounts", &err),
    }
}

/// Executes the `dine` subcommand.
fn cmd_dine<S: BlockingStorage + 'static>(
    storage: &Arc<S>,
    amount: &str,
    card: &str,
    merchant: &str,
) -> io::Result<ExitCode> {
    let dining = match Dining::create(amount, card, merchant) {
        Ok(dining) => dining,
        Err(err) => return report("invalid dining", &err),
    };
    match dine(storage, &dining) {
        Ok((confirmation, monitors)) => {
            print_confirmation(&confirmation)?;
            print_monitor_stats(&monitors)?;
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => report("reward failed", &err),
    }
}

/// Executes the `rewards` subcommand.
fn cmd_rewards<S: BlockingStorage>(storage: &S) -> io::Result<ExitCode> {
    match storage.rewards() {
        Ok(rewards) => {
            print_rewards_table(&rewards)?;
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => report("failed to read rewards", &err),
    }
}

/// Executes the `clear` subcommand.
fn cmd_clear<S: BlockingStorage>(storage: &S) -> io::Result<ExitCode> {
    match storage.clear() {
        Ok(()) => {
            writeln!(io::stdout().lock(), "{}", "Storage cleared.".green().bold())?;
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => report("failed to clear storage", &err),
    }
}

// ── Output formatting ────────────────────────────────────────────────

/// Creates a table with the shared preset and a cyan header.
fn new_table(header: &[&str]) -> Table {
    let mut table = Table::new();
    _ = table.load_preset(UTF8_FULL);
    _ = table.set_header(
        header
            .iter()
            .map(|title| Cell::new(title).fg(Color::Cyan))
            .collect::<Vec<_>>(),
    );
    table
}

/// Prints restaurants in a table.
fn print_restaurants_table(restaurants: &[Arc<Restaurant>]) -> io::Result<()> {
    let mut out = io::stdout().lock();
    if restaurants.is_empty() {
        writeln!(out, "{}", "No restaurants found.".dimmed())?;
        return Ok(());
    }

    let mut table = new_table(&["Merchant", "Name", "Benefit", "Policy"]);
    for restaurant in restaurants {
        _ = table.add_row(vec![
            Cell::new(&restaurant.merchant_number),
            Cell::new(&restaurant.name),
            Cell::new(restaurant.benefit_percentage),
            Cell::new(restaurant.benefit_availability_policy),
        ]);
    }

    writeln!(
        out,
        "{} {}",
        "Restaurants".green().bold(),
        format_args!("({})", restaurants.len()).dimmed()
    )?;
    writeln!(out)?;
    writeln!(out, "{table}")?;
    Ok(())
}

/// Prints accounts and their beneficiaries in a table.
fn print_accounts_table(accounts: &[Account]) -> io::Result<()> {
    let mut out = io::stdout().lock();
    if accounts.is_empty() {
        writeln!(out, "{}", "No accounts found.".dimmed())?;
        return Ok(());
    }

    let mut table = new_table(&["Number", "Name", "Cards", "Beneficiaries", "Valid"]);
    for account in accounts {
        let beneficiaries: Vec<String> = account
            .beneficiaries
            .iter()
            .map(|b| format!("{} {} ({})", b.name, b.allocation_percentage, b.savings))
            .collect();
        let valid_cell = if account.is_valid() {
            Cell::new("yes").fg(Color::Green)
        } else {
            Cell::new("no").fg(Color::Red)
        };
        _ = table.add_row(vec![
            Cell::new(&account.number),
            Cell::new(&account.name),
            Cell::new(account.credit_cards.join("\n")),
            Cell::new(beneficiaries.join("\n")),
            valid_cell,
        ]);
    }

    writeln!(
        out,
        "{} {}",
        "Accounts".green().bold(),
        format_args!("({})", accounts.len()).dimmed()
    )?;
    writeln!(out)?;
    writeln!(out, "{table}")?;
    Ok(())
}

/// Prints recorded rewards in a table.
fn print_rewards_table(rewards: &[RewardConfirmation]) -> io::Result<()> {
    let mut out = io::stdout().lock();
    if rewards.is_empty() {
        writeln!(out, "{}", "No rewards recorded.".dimmed())?;
        return Ok(());
    }

    let mut table = new_table(&["Confirmation", "Date", "Account", "Merchant", "Bill", "Reward"]);
    for reward in rewards {
        let reward_cell = if reward.contribution.amount.is_zero() {
            Cell::new(reward.contribution.amount).fg(Color::DarkGrey)
        } else {
            Cell::new(reward.contribution.amount).fg(Color::Green)
        };
        _ = table.add_row(vec![
            Cell::new(&reward.confirmation_number),
            Cell::new(reward.dining.date),
            Cell::new(&reward.contribution.account_number),
            Cell::new(&reward.dining.merchant_number),
            Cell::new(reward.dining.amount),
            reward_cell,
        ]);
    }

    writeln!(
        out,
        "{} {}",
        "Rewards".green().bold(),
        format_args!("({})", rewards.len()).dimmed()
    )?;
    writeln!(out)?;
    writeln!(out, "{table}")?;
    Ok(())
}

/// Prints one confirmation with its distributions.
fn print_confirmation(confirmation: &RewardConfirmation) -> io::Result<()> {
    let mut out = io::stdout().lock();
    let contribution = &confirmation.contribution;
    writeln!(
        out,
        "{} {}",
        "Reward confirmed!".green().bold(),
        format_args!("(confirmation {})", confirmation.confirmation_number).dimmed()
    )?;
    writeln!(
        out,
        "  {} {} to account {}",
        "Contribution:".bold(),
        contribution.amount,
        contribution.account_number
    )?;
    writeln!(out)?;

    let mut table = new_table(&["Beneficiary", "Share", "Amount", "Total savings"]);
    for distribution in &contribution.distributions {
        _ = table.add_row(vec![
            Cell::new(&distribution.beneficiary),
            Cell::new(distribution.percentage),
            Cell::new(distribution.amount).fg(Color::Green),
            Cell::new(distribution.total_savings),
        ]);
    }
    writeln!(out, "{table}")?;
    Ok(())
}

/// Prints the timings collected while rewarding.
fn print_monitor_stats(monitors: &MonitorFactory) -> io::Result<()> {
    let names = monitors.names();
    if names.is_empty() {
        return Ok(());
    }
    let mut out = io::stdout().lock();
    writeln!(out)?;
    let mut table = new_table(&["Monitor", "Calls", "Total (us)"]);
    for name in names {
        if let Some(stats) = monitors.stats(&name) {
            _ = table.add_row(vec![
                Cell::new(name),
                Cell::new(stats.calls),
                Cell::new(stats.total.as_micros()),
            ]);
        }
    }
    writeln!(out, "{table}")?;
    Ok(())
}

/// Entry point.
fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => {
            // stderr itself may be gone; nothing left to report to.
            let _ignored = writeln!(io::stderr(), "fatal I/O error: {err}");
            ExitCode::FAILURE
        }
    }
}
