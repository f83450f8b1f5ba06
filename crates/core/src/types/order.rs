//! Order-related types: symbols, sides, quantities, ids, and the order
//! lifecycle record.

use std::fmt;
use std::ops::{Add, Neg, Sub};

use serde::{Deserialize, Serialize};

use super::price::Price;
use super::timestamp::Timestamp;

/// Instrument symbol (e.g., "BTCUSDT").
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(pub String);

impl Symbol {
    /// Create a new symbol.
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Returns the symbol as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Order side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    /// Buy / long.
    Buy,
    /// Sell / short.
    Sell,
}

impl Side {
    /// Signed direction: `+1` for buys, `-1` for sells.
    #[inline]
    pub const fn sign(&self) -> i64 {
        match self {
            Side::Buy => 1,
            Side::Sell => -1,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "Buy"),
            Side::Sell => write!(f, "Sell"),
        }
    }
}

/// Signed quantity in whole instrument units.
///
/// Negative values express short positions in ledger arithmetic; orders and
/// quotes always carry non-negative quantities.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct Qty(pub i64);

impl Qty {
    /// The zero quantity.
    pub const ZERO: Qty = Qty(0);

    /// Returns the raw unit count.
    #[inline]
    pub const fn units(&self) -> i64 {
        self.0
    }

    /// Returns `true` if this quantity is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Returns the absolute value.
    #[inline]
    pub const fn abs(&self) -> Self {
        Self(self.0.abs())
    }
}

impl fmt::Display for Qty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Add for Qty {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Qty {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl Neg for Qty {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self::Output {
        Self(-self.0)
    }
}

/// Internal order identifier, unique for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub u64);

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OID-{}", self.0)
    }
}

/// Order lifecycle status.
///
/// `New` is the only non-terminal state this core distinguishes; fills and
/// cancels are reported back by the execution collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    /// Created by a trigger, not yet (or just) handed to execution.
    New,
    /// Fully executed; terminal.
    Filled,
    /// Withdrawn before execution; terminal.
    Cancelled,
    /// Refused by the risk gate; terminal, never dispatched.
    Rejected,
}

impl OrderStatus {
    /// Returns `true` if this status is terminal.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::New)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderStatus::New => write!(f, "New"),
            OrderStatus::Filled => write!(f, "Filled"),
            OrderStatus::Cancelled => write!(f, "Cancelled"),
            OrderStatus::Rejected => write!(f, "Rejected"),
        }
    }
}

/// A concrete buy/sell instruction ready for execution.
///
/// Created by a conditional order on trigger; after the dispatch stage hands
/// it to the execution gateway the core never mutates it again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Internal order identifier.
    pub id: OrderId,
    /// Instrument symbol.
    pub symbol: Symbol,
    /// Buy or sell.
    pub side: Side,
    /// Quantity in whole units (non-negative).
    pub qty: Qty,
    /// Limit price; [`Price::ZERO`] means market.
    pub price: Price,
    /// Timestamp of the quote that triggered this order.
    pub timestamp: Timestamp,
    /// Lifecycle status.
    pub status: OrderStatus,
}

impl Order {
    /// Returns `true` if this is a market order (zero price sentinel).
    #[inline]
    pub fn is_market(&self) -> bool {
        self.price.is_zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol() {
        let s = Symbol::new("BTCUSDT");
        assert_eq!(format!("{}", s), "BTCUSDT");
        assert_eq!(s.as_str(), "BTCUSDT");
        assert_eq!(s, Symbol::new(String::from("BTCUSDT")));
    }

    #[test]
    fn test_side_sign() {
        assert_eq!(Side::Buy.sign(), 1);
        assert_eq!(Side::Sell.sign(), -1);
    }

    #[test]
    fn test_side_display() {
        assert_eq!(format!("{}", Side::Buy), "Buy");
        assert_eq!(format!("{}", Side::Sell), "Sell");
    }

    #[test]
    fn test_qty_arithmetic() {
        assert_eq!(Qty(3) + Qty(4), Qty(7));
        assert_eq!(Qty(3) - Qty(4), Qty(-1));
        assert_eq!(-Qty(5), Qty(-5));
        assert_eq!(Qty(-5).abs(), Qty(5));
        assert!(Qty::ZERO.is_zero());
    }

    #[test]
    fn test_order_id_display() {
        assert_eq!(format!("{}", OrderId(42)), "OID-42");
    }

    #[test]
    fn test_status_terminal() {
        assert!(!OrderStatus::New.is_terminal());
        assert!(OrderStatus::Filled.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
        assert!(OrderStatus::Rejected.is_terminal());
    }

    #[test]
    fn test_is_market() {
        let mut order = Order {
            id: OrderId(1),
            symbol: Symbol::new("X"),
            side: Side::Sell,
            qty: Qty(10),
            price: Price::ZERO,
            timestamp: Timestamp(0),
            status: OrderStatus::New,
        };
        assert!(order.is_market());
        order.price = Price::from_units(50);
        assert!(!order.is_market());
    }
}
