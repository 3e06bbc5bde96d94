//! Monetary amounts in the chain's smallest unit.

use std::fmt;
use std::iter::Sum;

use serde::{Deserialize, Serialize};

/// The number of smallest units in one coin.
pub const COIN: i64 = 100_000_000;

/// A ceiling on any plausible single value on this chain, in smallest units.
///
/// Used to reject shielded-flow scalars decoded from misaligned bytes before
/// they can poison supply accounting.
pub const MAX_PLAUSIBLE_SUPPLY: i64 = 1_000_000_000 * COIN;

/// A monetary amount in smallest units (1 coin = 10^8 units).
///
/// Amounts decoded from transaction outputs and shielded-flow fields are
/// signed: `value_balance` is negative when funds enter the shielded pool.
#[derive(
    Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize,
)]
pub struct Amount(i64);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub const fn from_units(units: i64) -> Amount {
        Amount(units)
    }

    pub const fn from_coins(coins: i64) -> Amount {
        Amount(coins * COIN)
    }

    /// The raw value in smallest units.
    pub const fn units(self) -> i64 {
        self.0
    }

    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }

    pub fn checked_sub(self, other: Amount) -> Option<Amount> {
        self.0.checked_sub(other.0).map(Amount)
    }

    pub fn saturating_add(self, other: Amount) -> Amount {
        Amount(self.0.saturating_add(other.0))
    }

    pub fn saturating_sub(self, other: Amount) -> Amount {
        Amount(self.0.saturating_sub(other.0))
    }

    pub fn abs(self) -> Amount {
        Amount(self.0.saturating_abs())
    }

    /// Whether the magnitude is at or below [`MAX_PLAUSIBLE_SUPPLY`].
    pub fn is_plausible(self) -> bool {
        self.0.saturating_abs() <= MAX_PLAUSIBLE_SUPPLY
    }
}

impl Sum<Amount> for Amount {
    fn sum<I: Iterator<Item = Amount>>(iter: I) -> Amount {
        iter.fold(Amount::ZERO, Amount::saturating_add)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let magnitude = self.0.unsigned_abs();
        write!(
            f,
            "{}{}.{:08}",
            sign,
            magnitude / COIN as u64,
            magnitude % COIN as u64
        )
    }
}
