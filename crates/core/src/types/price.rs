//! Peso amounts using decimal arithmetic.
//!
//! The store sells in a single currency (Philippine peso), so a price is
//! just a decimal amount with peso formatting attached.

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, Mul};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Currency symbol prefixed to every displayed amount.
pub const CURRENCY_SYMBOL: &str = "₱";

/// A monetary amount in pesos.
///
/// Deserializes from either a JSON number or a decimal string, matching
/// whatever the backend sends.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Price(Decimal);

impl Price {
    /// The zero amount.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Create a new price.
    #[must_use]
    pub const fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    /// Create a price from centavos (`1999` is `₱ 19.99`).
    #[must_use]
    pub fn from_centavos(centavos: i64) -> Self {
        Self(Decimal::new(centavos, 2))
    }

    /// Get the decimal amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Price of `quantity` units.
    #[must_use]
    pub fn times(self, quantity: u32) -> Self {
        Self(self.0 * Decimal::from(quantity))
    }

    /// Format for display with thousands separators, e.g. `₱ 1,234.50`.
    #[must_use]
    pub fn display(&self) -> String {
        format!("{CURRENCY_SYMBOL} {}", group_thousands(self.0))
    }
}

/// Render `amount` with two decimals and comma-grouped whole part.
fn group_thousands(amount: Decimal) -> String {
    let rounded = format!("{:.2}", amount.round_dp(2));
    let (sign, unsigned) = rounded
        .strip_prefix('-')
        .map_or(("", rounded.as_str()), |rest| ("-", rest));
    let (whole, fraction) = unsigned.split_once('.').unwrap_or((unsigned, "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    format!("{sign}{grouped}.{fraction}")
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display())
    }
}

impl From<Decimal> for Price {
    fn from(amount: Decimal) -> Self {
        Self(amount)
    }
}

impl Add for Price {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl Mul<u32> for Price {
    type Output = Self;

    fn mul(self, quantity: u32) -> Self {
        self.times(quantity)
    }
}

impl Sum for Price {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_display_groups_thousands() {
        assert_eq!(Price::from_centavos(123_456_789).display(), "₱ 1,234,567.89");
        assert_eq!(Price::from_centavos(100_000).display(), "₱ 1,000.00");
        assert_eq!(Price::from_centavos(99_900).display(), "₱ 999.00");
        assert_eq!(Price::ZERO.display(), "₱ 0.00");
    }

    #[test]
    fn test_display_pads_whole_numbers() {
        assert_eq!(Price::new(Decimal::from(2000)).display(), "₱ 2,000.00");
    }

    #[test]
    fn test_times_and_sum() {
        let price = Price::new(Decimal::from(1000));
        assert_eq!(price.times(2), Price::new(Decimal::from(2000)));

        let total: Price = [price, price * 3].into_iter().sum();
        assert_eq!(total, Price::new(Decimal::from(4000)));
    }

    #[test]
    fn test_deserializes_numbers_and_strings() {
        let from_number: Price = serde_json::from_str("1499.5").unwrap();
        let from_string: Price = serde_json::from_str("\"1499.50\"").unwrap();
        assert_eq!(from_number, from_string);
    }
}
