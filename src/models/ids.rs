//! Newtype wrappers for entity identifiers.
//!
//! These prevent accidentally mixing up merchant, account, and confirmation
//! numbers at compile time.

use serde::{Deserialize, Serialize};

/// Macro to define a newtype ID wrapping a `String` inner type.
macro_rules! define_string_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier from the given string.
            #[inline]
            #[must_use]
            pub const fn new(value: String) -> Self {
                Self(value)
            }

            /// Returns a reference to the inner string.
            #[inline]
            #[must_use]
            pub fn as_inner(&self) -> &str {
                &self.0
            }

            /// Consumes the wrapper and returns the inner string.
            #[inline]
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl core::fmt::Display for $name {
            #[inline]
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<String> for $name {
            #[inline]
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            #[inline]
            fn from(value: &str) -> Self {
                Self(value.to_owned())
            }
        }

        impl core::borrow::Borrow<str> for $name {
            #[inline]
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

define_string_id! {
    /// Unique identifier of a restaurant in the reward network.
    MerchantNumber
}

define_string_id! {
    /// Unique identifier of a member account.
    AccountNumber
}

define_string_id! {
    /// Identifier handed back when a reward has been recorded.
    ConfirmationNumber
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn merchant_number_serde_is_transparent() {
        let id = MerchantNumber::new("1234567890".to_owned());
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, r#""1234567890""#);
        let back: MerchantNumber = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn display_and_into_inner() {
        let id = AccountNumber::from("123456789");
        assert_eq!(id.to_string(), "123456789");
        assert_eq!(id.as_inner(), "123456789");
        assert_eq!(id.into_inner(), "123456789");
    }

    #[test]
    fn borrow_allows_str_lookup() {
        let mut map = HashMap::new();
        let _old = map.insert(MerchantNumber::from("1234567890"), 1_u8);
        assert_eq!(map.get("1234567890"), Some(&1_u8));
        assert_eq!(map.get("0000000000"), None);
    }
}
