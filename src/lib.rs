//! Dining reward network with a cached restaurant repository.
//!
//! Members dine at network restaurants with a registered credit card; a
//! share of the bill is contributed to the member's account and split
//! across its beneficiaries. Restaurants are reference data: the
//! [`cache`] module loads them once from a row store, serves lookups from
//! memory, and drops them at shutdown.
//!
//! # Layout
//!
//! - [`models`]: accounts, restaurants, dining events, money types.
//! - [`storage`]: async and blocking row stores (in-memory, JSON files,
//!   SQLite).
//! - [`cache`]: the populate/find/clear restaurant cache.
//! - [`repository`]: lookup traits and storage-backed repositories.
//! - [`reward_network`]: the reward calculation.
//! - [`monitor`]: logging and timing decorator for repositories.
//! - [`lifecycle`]: explicit init/shutdown orchestration.
//!
//! # Feature flags
//!
//! | Feature          | Default | Description                                   |
//! |------------------|---------|-----------------------------------------------|
//! | `async`          | yes     | Async [`storage::Storage`] and cache          |
//! | `blocking`       | yes     | Blocking storage, cache and repositories      |
//! | `storage-file`   | yes     | JSON file storage backend                     |
//! | `storage-sqlite` | no      | SQLite storage backend (blocking only)        |
//! | `cli`            | yes     | `rewards` command-line tool                   |

pub mod cache;
pub mod error;
pub mod lifecycle;
pub mod models;
pub mod monitor;
pub mod repository;
pub mod reward_network;
pub mod storage;
