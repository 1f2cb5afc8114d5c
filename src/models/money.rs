//! Decimal value types for monetary amounts and percentages.

use core::fmt;
use core::iter::Sum;
use core::ops::{Add, AddAssign, Mul};
use core::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::error::{Result, RewardsError};

/// Number of fractional digits kept by a [`MonetaryAmount`].
const MONEY_SCALE: u32 = 2;

/// An amount of money, always held with two fractional digits.
///
/// Values are rounded half-to-even whenever they are constructed or result
/// from arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "Decimal", into = "Decimal")]
pub struct MonetaryAmount(Decimal);

impl MonetaryAmount {
    /// Creates an amount from a decimal, rounding to two fractional digits.
    #[inline]
    #[must_use]
    pub fn new(value: Decimal) -> Self {
        let mut rounded = value.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointNearestEven);
        rounded.rescale(MONEY_SCALE);
        Self(rounded)
    }

    /// Returns a zero amount.
    #[inline]
    #[must_use]
    pub fn zero() -> Self {
        Self::new(Decimal::ZERO)
    }

    /// Parses an amount such as `"100.00"`.
    ///
    /// # Errors
    ///
    /// Returns [`RewardsError::InvalidAmount`] if the string is not a
    /// decimal number.
    #[inline]
    pub fn parse(raw: &str) -> Result<Self> {
        Decimal::from_str(raw.trim())
            .map(Self::new)
            .map_err(|err| RewardsError::InvalidAmount(format!("{raw:?}: {err}")))
    }

    /// Returns the underlying decimal value.
    #[inline]
    #[must_use]
    pub const fn as_decimal(&self) -> Decimal {
        self.0
    }

    /// Returns `true` if the amount is zero.
    #[inline]
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Returns `true` if the amount is below zero.
    #[inline]
    #[must_use]
    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }
}

impl Default for MonetaryAmount {
    #[inline]
    fn default() -> Self {
        Self::zero()
    }
}

impl From<Decimal> for MonetaryAmount {
    #[inline]
    fn from(value: Decimal) -> Self {
        Self::new(value)
    }
}

impl From<MonetaryAmount> for Decimal {
    #[inline]
    fn from(value: MonetaryAmount) -> Self {
        value.0
    }
}

impl FromStr for MonetaryAmount {
    type Err = RewardsError;

    #[inline]
    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for MonetaryAmount {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl Add for MonetaryAmount {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self::new(self.0 + rhs.0)
    }
}

impl AddAssign for MonetaryAmount {
    #[inline]
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sum for MonetaryAmount {
    #[inline]
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::zero(), Add::add)
    }
}

impl Mul<Percentage> for MonetaryAmount {
    type Output = Self;

    #[inline]
    fn mul(self, rhs: Percentage) -> Self {
        Self::new(self.0 * rhs.0)
    }
}

/// A fraction in the closed range `[0, 1]`.
///
/// Parses either a plain fraction (`"0.08"`) or a percent string (`"8%"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Percentage(Decimal);

impl Percentage {
    /// Creates a percentage from a fraction.
    ///
    /// # Errors
    ///
    /// Returns [`RewardsError::InvalidPercentage`] if `value` lies outside
    /// `[0, 1]`.
    #[inline]
    pub fn new(value: Decimal) -> Result<Self> {
        if value < Decimal::ZERO || value > Decimal::ONE {
            return Err(RewardsError::InvalidPercentage(format!(
                "{value} is outside [0, 1]"
            )));
        }
        Ok(Self(value.normalize()))
    }

    /// Returns 0%.
    #[inline]
    #[must_use]
    pub const fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    /// Returns 100%.
    #[inline]
    #[must_use]
    pub const fn one() -> Self {
        Self(Decimal::ONE)
    }

    /// Parses `"0.08"` or `"8%"`.
    ///
    /// # Errors
    ///
    /// Returns [`RewardsError::InvalidPercentage`] if the string is not a
    /// decimal number or the value lies outside `[0, 1]`.
    #[inline]
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        let (number, scale) = trimmed
            .strip_suffix('%')
            .map_or((trimmed, Decimal::ONE), |percent| {
                (percent.trim_end(), Decimal::ONE_HUNDRED)
            });
        let value = Decimal::from_str(number)
            .map_err(|err| RewardsError::InvalidPercentage(format!("{raw:?}: {err}")))?;
        Self::new(value / scale)
    }

    /// Returns the underlying fraction.
    #[inline]
    #[must_use]
    pub const fn as_decimal(&self) -> Decimal {
        self.0
    }

    /// Returns `true` if the percentage is zero.
    #[inline]
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

impl TryFrom<Decimal> for Percentage {
    type Error = RewardsError;

    #[inline]
    fn try_from(value: Decimal) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Percentage> for Decimal {
    #[inline]
    fn from(value: Percentage) -> Self {
        value.0
    }
}

impl FromStr for Percentage {
    type Err = RewardsError;

    #[inline]
    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Percentage {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", (self.0 * Decimal::ONE_HUNDRED).normalize())
    }
}
