//! Fixed-point price type for the hot path.
//!
//! [`Price`] stores a value as a signed count of ticks, where one tick is
//! `10^-4` (four decimal places). `Price::from_ticks(1_000_050)` represents
//! `100.0050`. All comparisons and arithmetic stay in integer space;
//! [`Price::to_f64`] exists for logging and limit math off the hot path.
//!
//! A price of zero doubles as the market-order sentinel: a triggered stop
//! order carries `Price::ZERO`, meaning "no limit".

use std::fmt;
use std::ops::{Add, Neg, Sub};

use serde::{Deserialize, Serialize};

/// Number of decimal places in a [`Price`] tick.
pub const PRICE_DECIMALS: u32 = 4;

/// Ticks per whole currency unit: `10^PRICE_DECIMALS`.
pub const TICKS_PER_UNIT: i64 = 10_000;

/// Fixed-point price: a signed count of `10^-4` ticks.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct Price(i64);

impl Price {
    /// The zero price, also used as the market-order sentinel.
    pub const ZERO: Price = Price(0);

    /// Create a price from a raw tick count.
    #[inline]
    pub const fn from_ticks(ticks: i64) -> Self {
        Self(ticks)
    }

    /// Create a price from a whole number of currency units.
    #[inline]
    pub const fn from_units(units: i64) -> Self {
        Self(units * TICKS_PER_UNIT)
    }

    /// Returns the raw tick count.
    #[inline]
    pub const fn ticks(&self) -> i64 {
        self.0
    }

    /// Returns `true` if this price is zero (the market sentinel).
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Returns the absolute value.
    #[inline]
    pub const fn abs(&self) -> Self {
        Self(self.0.abs())
    }

    /// Convert to `f64`. **Not for hot-path use** — intended for logging,
    /// exposure math, and display only.
    #[inline]
    pub fn to_f64(&self) -> f64 {
        self.0 as f64 / TICKS_PER_UNIT as f64
    }

    /// Convert an `f64` to the nearest tick.
    ///
    /// Floating-point conversion is inherently imprecise; provided for
    /// configuration and tests, not the quote path.
    #[inline]
    pub fn from_f64(value: f64) -> Self {
        Self((value * TICKS_PER_UNIT as f64).round() as i64)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / TICKS_PER_UNIT;
        let frac = (self.0 % TICKS_PER_UNIT).abs();
        let sign = if self.0 < 0 && whole == 0 { "-" } else { "" };
        write!(
            f,
            "{}{}.{:0>width$}",
            sign,
            whole,
            frac,
            width = PRICE_DECIMALS as usize
        )
    }
}

impl Add for Price {
    type Output = Self;

    /// Add two prices. Panics on overflow.
    #[inline]
    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0.checked_add(rhs.0).expect("Price::add overflow"))
    }
}

impl Sub for Price {
    type Output = Self;

    /// Subtract two prices. Panics on overflow.
    #[inline]
    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0.checked_sub(rhs.0).expect("Price::sub overflow"))
    }
}

impl Neg for Price {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self::Output {
        Self(-self.0)
    }
}
