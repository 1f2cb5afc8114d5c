//! Cached restaurant repository.
//!
//! The cache loads every restaurant row once via `populate`, keeps the
//! mapped [`Restaurant`]s in an immutable map keyed by merchant number, and
//! answers lookups from memory until `clear` is called. The populated map
//! is published with an atomic pointer swap, so lookups never block and a
//! failed population leaves the previous state in place.
//!
//! Lookups go through [`RestaurantLookup`](crate::repository::RestaurantLookup).
//! Two flavours are generated from one definition:
//! [`RestaurantCache`] over an async [`Storage`](crate::storage::Storage) and
//! [`BlockingRestaurantCache`] over a
//! [`BlockingStorage`](crate::storage::BlockingStorage).

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwapOption;

use crate::error::{Result, RewardsError};
use crate::models::{MerchantNumber, Restaurant, RestaurantRow};

/// Restaurants keyed by merchant number.
type RestaurantMap = HashMap<MerchantNumber, Arc<Restaurant>>;

/// Entity name used in lookup errors.
const RESTAURANT: &str = "restaurant";

/// Atomically published restaurant map.
///
/// `None` means unpopulated. The map itself is never mutated once built.
#[derive(Debug, Default)]
struct RestaurantIndex {
    /// Current map, swapped as a whole.
    entries: ArcSwapOption<RestaurantMap>,
}

impl RestaurantIndex {
    /// Maps every row and builds a fresh map; last duplicate wins.
    fn build(rows: Vec<RestaurantRow>) -> Result<RestaurantMap> {
        let mut map = RestaurantMap::with_capacity(rows.len());
        for row in rows {
            let restaurant = row.into_restaurant()?;
            let key = restaurant.merchant_number.clone();
            if let Some(previous) = map.insert(key, Arc::new(restaurant)) {
                tracing::warn!(
                    merchant_number = %previous.merchant_number,
                    "duplicate merchant number, keeping the last row"
                );
            }
        }
        Ok(map)
    }

    /// Publishes a fully built map.
    fn install(&self, map: RestaurantMap) {
        self.entries.store(Some(Arc::new(map)));
    }

    /// Drops the published map.
    fn clear(&self) {
        self.entries.store(None);
    }

    /// Looks up a restaurant in the published map.
    fn find(&self, merchant_number: &str) -> Result<Arc<Restaurant>> {
        let entries = self.entries.load();
        let Some(map) = entries.as_deref() else {
            tracing::debug!(merchant_number, "lookup against unpopulated restaurant cache");
            return Err(RewardsError::not_found(RESTAURANT, merchant_number));
        };
        map.get(merchant_number)
            .map(Arc::clone)
            .ok_or_else(|| RewardsError::not_found(RESTAURANT, merchant_number))
    }

    /// Returns `true` once a map has been published.
    fn is_populated(&self) -> bool {
        self.entries.load().is_some()
    }

    /// Number of cached restaurants.
    fn len(&self) -> usize {
        self.entries.load().as_deref().map_or(0, HashMap::len)
    }

    /// Snapshot of all cached restaurants sorted by merchant number.
    fn snapshot(&self) -> Vec<Arc<Restaurant>> {
        let entries = self.entries.load();
        let mut restaurants: Vec<Arc<Restaurant>> = entries
            .as_deref()
            .map(|map| map.values().map(Arc::clone).collect())
            .unwrap_or_default();
        restaurants.sort_by(|a, b| a.merchant_number.cmp(&b.merchant_number));
        restaurants
    }
}

/// Generates a restaurant cache (async or blocking).
macro_rules! define_restaurant_cache {
    (
        cache_name: $cache:ident,
        storage_trait: $storage_trait:ident,
        cache_doc: $cache_doc:expr,
        $(async_kw: $async_kw:tt,)?
        $(await_kw: $await_ext:tt,)?
    ) => {
        #[doc = $cache_doc]
        #[derive(Debug)]
        pub struct $cache<S: $storage_trait> {
            /// Row source read during population.
            storage: S,
            /// Published restaurant map.
            index: RestaurantIndex,
        }

        impl<S: $storage_trait> $cache<S> {
            /// Creates an unpopulated cache over the given storage.
            #[inline]
            #[must_use]
            pub fn new(storage: S) -> Self {
                Self {
                    storage,
                    index: RestaurantIndex::default(),
                }
            }

            /// Returns the underlying storage.
            #[inline]
            #[must_use]
            pub const fn storage(&self) -> &S {
                &self.storage
            }

            /// Loads every restaurant row and replaces the cached map.
            ///
            /// Exactly one bulk read is issued. All rows are mapped before
            /// anything is published; when a merchant number repeats, the
            /// last row wins.
            ///
            /// # Errors
            ///
            /// Returns [`DataAccess`](crate::error::RewardsError::DataAccess)
            /// if the bulk read fails and
            /// [`Mapping`](crate::error::RewardsError::Mapping) if any row
            /// cannot be mapped. The cache is left untouched in both cases.
            #[tracing::instrument(skip_all)]
            pub $($async_kw)? fn populate(&self) -> Result<()> {
                tracing::debug!("loading restaurant rows");
                let rows = self.storage.restaurant_rows() $( .$await_ext )? ?;
                let total_rows = rows.len();
                let map = RestaurantIndex::build(rows)?;
                tracing::debug!(rows = total_rows, restaurants = map.len(), "restaurant cache populated");
                self.index.install(map);
                Ok(())
            }

            /// Discards every cached restaurant. Idempotent.
            #[inline]
            pub fn clear(&self) {
                tracing::debug!("clearing restaurant cache");
                self.index.clear();
            }

            /// Returns `true` once [`populate`](Self::populate) has succeeded
            /// and the cache has not been cleared since.
            #[inline]
            #[must_use]
            pub fn is_populated(&self) -> bool {
                self.index.is_populated()
            }

            /// Number of cached restaurants.
            #[inline]
            #[must_use]
            pub fn len(&self) -> usize {
                self.index.len()
            }

            /// Returns `true` if no restaurant is cached.
            #[inline]
            #[must_use]
            pub fn is_empty(&self) -> bool {
                self.len() == 0
            }

            /// Returns every cached restaurant, sorted by merchant number.
            #[inline]
            #[must_use]
            pub fn restaurants(&self) -> Vec<Arc<Restaurant>> {
                self.index.snapshot()
            }
        }

        impl<S: $storage_trait> RestaurantLookup for $cache<S> {
            #[inline]
            fn find_by_merchant_number(&self, merchant_number: &str) -> Result<Arc<Restaurant>> {
                self.index.find(merchant_number)
            }
        }
    };
}

#[cfg(feature = "async")]
mod async_cache {
    //! Async restaurant cache.

    use std::sync::Arc;

    use super::RestaurantIndex;
    use crate::error::Result;
    use crate::models::Restaurant;
    use crate::repository::RestaurantLookup;
    use crate::storage::Storage;

    define_restaurant_cache! {
        cache_name: RestaurantCache,
        storage_trait: Storage,
        cache_doc: "Restaurant cache populated from an async [`Storage`].\n\nLookups are synchronous and served from memory; only [`RestaurantCache::populate`] awaits the backing store.",
        async_kw: async,
        await_kw: await,
    }
}

#[cfg(feature = "blocking")]
mod blocking_cache {
    //! Blocking restaurant cache.

    use std::sync::Arc;

    use super::RestaurantIndex;
    use crate::error::Result;
    use crate::lifecycle::Lifecycle;
    use crate::models::Restaurant;
    use crate::repository::RestaurantLookup;
    use crate::storage::BlockingStorage;

    define_restaurant_cache! {
        cache_name: BlockingRestaurantCache,
        storage_trait: BlockingStorage,
        cache_doc: "Restaurant cache populated from a [`BlockingStorage`].\n\nImplements [`Lifecycle`]: `init` populates, `shutdown` clears.",
    }

    impl<S: BlockingStorage> Lifecycle for BlockingRestaurantCache<S> {
        #[inline]
        fn name(&self) -> &'static str {
            "restaurant-cache"
        }

        #[inline]
        fn init(&self) -> Result<()> {
            self.populate()
        }

        #[inline]
        fn shutdown(&self) -> Result<()> {
            self.clear();
            Ok(())
        }
    }
}

#[cfg(feature = "async")]
pub use async_cache::RestaurantCache;
#[cfg(feature = "blocking")]
pub use blocking_cache::BlockingRestaurantCache;
