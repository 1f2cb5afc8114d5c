//! Error types for the rewards library.

use core::fmt::Display;

/// All errors that can occur when using the reward network.
#[derive(Debug, thiserror::Error)]
pub enum RewardsError {
    /// No entity exists for the given key, or the cache holding it has not
    /// been populated.
    #[error("{entity} not found: {key}")]
    NotFound {
        /// Kind of entity that was looked up.
        entity: &'static str,
        /// Key used for the lookup.
        key: String,
    },

    /// The backing store failed to read or write.
    #[error("data access error: {0}")]
    DataAccess(Box<dyn core::error::Error + Send + Sync>),

    /// A restaurant row could not be mapped to a [`crate::models::Restaurant`].
    #[error("cannot map restaurant {merchant_number:?}: {reason}")]
    Mapping {
        /// Merchant number of the offending row.
        merchant_number: String,
        /// Human-readable description of the mapping failure.
        reason: String,
    },

    /// JSON serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A monetary amount could not be parsed.
    #[error("invalid monetary amount: {0}")]
    InvalidAmount(String),

    /// A percentage could not be parsed or lies outside `[0, 1]`.
    #[error("invalid percentage: {0}")]
    InvalidPercentage(String),

    /// The account is not in a state that allows the requested operation.
    #[error("invalid account: {0}")]
    InvalidAccount(String),

    /// Removing the beneficiary would require rebalancing the remaining
    /// allocations, which is not supported.
    #[error("removing beneficiary {beneficiary:?} requires rebalancing allocations")]
    RebalanceUnsupported {
        /// Name of the beneficiary that could not be removed.
        beneficiary: String,
    },
}

impl RewardsError {
    /// Builds a [`RewardsError::NotFound`] for the given entity kind and key.
    pub(crate) fn not_found<K: Display>(entity: &'static str, key: K) -> Self {
        Self::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    /// Builds a [`RewardsError::Mapping`] for the given merchant number.
    pub(crate) fn mapping<M: Into<String>, R: Display>(merchant_number: M, reason: R) -> Self {
        Self::Mapping {
            merchant_number: merchant_number.into(),
            reason: reason.to_string(),
        }
    }

    /// Returns `true` if this is a [`RewardsError::NotFound`].
    #[inline]
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(*self, Self::NotFound { .. })
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = core::result::Result<T, RewardsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_from_serde_json() {
        let serde_err = serde_json::from_str::<String>("not json").unwrap_err();
        let err = RewardsError::from(serde_err);
        assert!(matches!(err, RewardsError::Serialization(_)));
        assert!(err.to_string().contains("serialization error"));
    }

    #[test]
    fn data_access_display_includes_source() {
        let inner = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let err = RewardsError::DataAccess(Box::new(inner));
        let msg = err.to_string();
        assert!(msg.contains("data access error"));
        assert!(msg.contains("file missing"));
    }

    #[test]
    fn not_found_display() {
        let err = RewardsError::not_found("restaurant", "0000000000");
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "restaurant not found: 0000000000");
    }

    #[test]
    fn mapping_display() {
        let err = RewardsError::mapping("1234567890", "not a supported policy code \"X\"");
        assert!(!err.is_not_found());
        let msg = err.to_string();
        assert!(msg.contains("1234567890"));
        assert!(msg.contains("policy code"));
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<RewardsError>();
    }
}
