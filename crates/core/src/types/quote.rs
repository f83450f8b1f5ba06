//! Top-of-book quote: the canonical market data unit flowing through the
//! pipeline.

use serde::{Deserialize, Serialize};

use super::order::{Qty, Symbol};
use super::price::Price;
use super::timestamp::Timestamp;

/// A snapshot of best bid/ask price and size for one symbol at a point in
/// time. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    /// Instrument symbol.
    pub symbol: Symbol,
    /// Best bid price.
    pub bid: Price,
    /// Best ask price.
    pub ask: Price,
    /// Quantity available at the best bid.
    pub bid_size: Qty,
    /// Quantity available at the best ask.
    pub ask_size: Qty,
    /// Monotonic nanosecond timestamp.
    pub timestamp: Timestamp,
}

impl Quote {
    /// Mid-price `(bid + ask) / 2`, truncating to the tick grid.
    pub fn mid(&self) -> Price {
        Price::from_ticks((self.bid.ticks() + self.ask.ticks()) / 2)
    }

    /// Spread `ask - bid`.
    pub fn spread(&self) -> Price {
        self.ask - self.bid
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Quote {
        Quote {
            symbol: Symbol::new("BTCUSDT"),
            bid: Price::from_units(100),
            ask: Price::from_ticks(1_000_100),
            bid_size: Qty(5),
            ask_size: Qty(7),
            timestamp: Timestamp::from_millis(1_706_000_000_000),
        }
    }

    #[test]
    fn test_mid() {
        assert_eq!(sample().mid(), Price::from_ticks(1_000_050));
    }

    #[test]
    fn test_spread() {
        assert_eq!(sample().spread(), Price::from_ticks(100));
    }
}
