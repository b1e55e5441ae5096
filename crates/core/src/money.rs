//! Monetary amounts.
//!
//! Amounts are held in the smallest currency unit (e.g. cents) so arithmetic stays
//! exact. The store uses a single currency; no conversion happens here.

use serde::{Deserialize, Serialize};

/// Non-negative amount in minor units.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(u64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub const fn from_minor(minor: u64) -> Self {
        Self(minor)
    }

    pub const fn minor(self) -> u64 {
        self.0
    }

    /// Unit price times quantity, saturating on overflow.
    pub fn times(self, quantity: u32) -> Money {
        Money(self.0.saturating_mul(u64::from(quantity)))
    }

    pub fn saturating_add(self, other: Money) -> Money {
        Money(self.0.saturating_add(other.0))
    }
}

impl core::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::ZERO, Money::saturating_add)
    }
}

impl core::fmt::Display for Money {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_totals_sum_exactly() {
        let lines = [Money::from_minor(1999).times(2), Money::from_minor(500).times(1)];
        let total: Money = lines.into_iter().sum();
        assert_eq!(total, Money::from_minor(4498));
        assert_eq!(total.to_string(), "44.98");
    }

    #[test]
    fn arithmetic_saturates() {
        assert_eq!(Money::from_minor(u64::MAX).times(2), Money::from_minor(u64::MAX));
    }
}
