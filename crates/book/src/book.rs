//! Price-level book maintenance for one symbol.
//!
//! The book is driven by top-of-book [`Quote`]s from a single writer thread
//! (the market-data stage). Bids are stored with [`std::cmp::Reverse`] keys
//! so that iteration over the underlying [`BTreeMap`] yields prices in
//! descending order (highest bid first); asks use natural ordering (lowest
//! ask first). Both ladders are therefore sorted at every point a caller
//! can observe them.
//!
//! Each successful [`OrderBook::apply`] ends by publishing the new best
//! bid/ask through the book's [`TopOfBook`] cell, which is the only part of
//! the book other threads may read.

use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::sync::Arc;

use qx_core::types::{OrderId, Price, Qty, Quote, Side, Symbol, Timestamp};

use crate::top::{TopOfBook, TopSnapshot};

/// Errors raised while validating an incoming quote.
///
/// A failed quote is skipped; the book stays at its last-known-good state.
#[derive(Debug, thiserror::Error)]
pub enum BookError {
    /// The quote's timestamp is older than the last applied quote.
    #[error("stale quote: received ts {received}, last was {last}")]
    StaleQuote {
        received: Timestamp,
        last: Timestamp,
    },
    /// Bid above ask by more than the configured tolerance.
    #[error("crossed quote: bid {bid} > ask {ask} beyond tolerance")]
    CrossedQuote { bid: Price, ask: Price },
}

/// An aggregated quantity available at one price on one side of the book.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceLevel {
    /// Level price.
    pub price: Price,
    /// Aggregate quantity at this price.
    pub qty: Qty,
    /// Contributing order ids, in arrival order. Top-of-book quotes carry
    /// no per-order attribution and leave this empty; depth feeds that do
    /// attribute size use [`attach`](PriceLevel::attach) /
    /// [`detach`](PriceLevel::detach).
    pub orders: Vec<OrderId>,
}

impl PriceLevel {
    /// Create a level with no order attribution.
    pub fn new(price: Price, qty: Qty) -> Self {
        Self {
            price,
            qty,
            orders: Vec::new(),
        }
    }

    /// Record an order as contributing to this level.
    pub fn attach(&mut self, id: OrderId) {
        self.orders.push(id);
    }

    /// Remove an order's contribution record. Returns `true` if it was
    /// present.
    pub fn detach(&mut self, id: OrderId) -> bool {
        match self.orders.iter().position(|&o| o == id) {
            Some(idx) => {
                self.orders.remove(idx);
                true
            }
            None => false,
        }
    }
}

/// Per-symbol order book: sorted price-level ladders plus an atomically
/// published top-of-book snapshot.
///
/// Single-writer discipline: only one thread calls [`apply`](Self::apply);
/// other threads read through the handle returned by [`top`](Self::top).
pub struct OrderBook {
    symbol: Symbol,
    /// Bid levels: `Reverse(price) -> level`. Highest bid iterates first.
    bids: BTreeMap<Reverse<Price>, PriceLevel>,
    /// Ask levels: `price -> level`. Lowest ask iterates first.
    asks: BTreeMap<Price, PriceLevel>,
    top: Arc<TopOfBook>,
    last_quote_ts: Option<Timestamp>,
    max_crossed_ticks: i64,
}

impl OrderBook {
    /// Create an empty book with zero crossed-quote tolerance.
    pub fn new(symbol: Symbol) -> Self {
        Self::with_crossed_tolerance(symbol, 0)
    }

    /// Create an empty book that tolerates the bid sitting up to
    /// `max_crossed_ticks` above the ask before a quote is rejected.
    pub fn with_crossed_tolerance(symbol: Symbol, max_crossed_ticks: i64) -> Self {
        Self {
            symbol,
            bids: BTreeMap::new(),
            asks: BTreeMap::new(),
            top: Arc::new(TopOfBook::new()),
            last_quote_ts: None,
            max_crossed_ticks,
        }
    }

    /// The symbol this book represents.
    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    /// Apply a quote to the book.
    ///
    /// Validation happens before any mutation, so a rejected quote leaves
    /// the book (and the published snapshot) untouched:
    /// - a timestamp older than the last applied quote is
    ///   [`BookError::StaleQuote`];
    /// - a bid above the ask beyond the configured tolerance is
    ///   [`BookError::CrossedQuote`].
    ///
    /// On each side the level at the quoted price is inserted or updated
    /// with the quoted size (zero size removes it), and levels better than
    /// the new best are dropped as stale. The new top of book is then
    /// published as one unit.
    pub fn apply(&mut self, quote: &Quote) -> Result<(), BookError> {
        if let Some(last) = self.last_quote_ts {
            if quote.timestamp < last {
                tracing::debug!(
                    symbol = %self.symbol,
                    received = quote.timestamp.as_nanos(),
                    last = last.as_nanos(),
                    "dropping stale quote"
                );
                return Err(BookError::StaleQuote {
                    received: quote.timestamp,
                    last,
                });
            }
        }

        let both_sides = !quote.bid_size.is_zero() && !quote.ask_size.is_zero();
        if both_sides && quote.bid.ticks() - quote.ask.ticks() > self.max_crossed_ticks {
            return Err(BookError::CrossedQuote {
                bid: quote.bid,
                ask: quote.ask,
            });
        }

        // Bid side: anything above the new best bid is stale.
        if quote.bid_size.is_zero() {
            self.bids.remove(&Reverse(quote.bid));
        } else {
            while let Some((&Reverse(best), _)) = self.bids.first_key_value() {
                if best > quote.bid {
                    self.bids.pop_first();
                } else {
                    break;
                }
            }
            self.bids
                .entry(Reverse(quote.bid))
                .and_modify(|level| level.qty = quote.bid_size)
                .or_insert_with(|| PriceLevel::new(quote.bid, quote.bid_size));
        }

        // Ask side: anything below the new best ask is stale.
        if quote.ask_size.is_zero() {
            self.asks.remove(&quote.ask);
        } else {
            while let Some((&best, _)) = self.asks.first_key_value() {
                if best < quote.ask {
                    self.asks.pop_first();
                } else {
                    break;
                }
            }
            self.asks
                .entry(quote.ask)
                .and_modify(|level| level.qty = quote.ask_size)
                .or_insert_with(|| PriceLevel::new(quote.ask, quote.ask_size));
        }

        self.last_quote_ts = Some(quote.timestamp);
        self.publish_top(quote.timestamp);
        Ok(())
    }

    /// Publish the current best bid/ask as a single snapshot.
    fn publish_top(&self, timestamp: Timestamp) {
        let (bid, bid_size) = match self.best_bid() {
            Some(level) => (level.price, level.qty),
            None => (Price::ZERO, Qty::ZERO),
        };
        let (ask, ask_size) = match self.best_ask() {
            Some(level) => (level.price, level.qty),
            None => (Price::ZERO, Qty::ZERO),
        };
        self.top.publish(&TopSnapshot {
            bid,
            bid_size,
            ask,
            ask_size,
            timestamp,
        });
    }

    /// Returns the highest bid level, if any. Writer-side view.
    pub fn best_bid(&self) -> Option<&PriceLevel> {
        self.bids.first_key_value().map(|(_, level)| level)
    }

    /// Returns the lowest ask level, if any. Writer-side view.
    pub fn best_ask(&self) -> Option<&PriceLevel> {
        self.asks.first_key_value().map(|(_, level)| level)
    }

    /// Top N bid levels, highest price first.
    pub fn bid_depth(&self, levels: usize) -> Vec<(Price, Qty)> {
        self.bids
            .values()
            .take(levels)
            .map(|l| (l.price, l.qty))
            .collect()
    }

    /// Top N ask levels, lowest price first.
    pub fn ask_depth(&self, levels: usize) -> Vec<(Price, Qty)> {
        self.asks
            .values()
            .take(levels)
            .map(|l| (l.price, l.qty))
            .collect()
    }

    /// Returns `(bid_level_count, ask_level_count)`.
    pub fn level_count(&self) -> (usize, usize) {
        (self.bids.len(), self.asks.len())
    }

    /// Record an order as contributing to the level at `price`, for feeds
    /// that carry per-order attribution. Returns `false` if no such level
    /// exists.
    pub fn attach_order(&mut self, side: Side, price: Price, id: OrderId) -> bool {
        let level = match side {
            Side::Buy => self.bids.get_mut(&Reverse(price)),
            Side::Sell => self.asks.get_mut(&price),
        };
        match level {
            Some(level) => {
                level.attach(id);
                true
            }
            None => false,
        }
    }

    /// A cheaply cloneable handle to the published top of book, safe to
    /// hand to reader threads.
    pub fn top(&self) -> Arc<TopOfBook> {
        Arc::clone(&self.top)
    }

    /// The latest published consistent top-of-book pair, or `None` before
    /// the first applied quote. Safe from any thread via [`top`](Self::top).
    pub fn snapshot(&self) -> Option<TopSnapshot> {
        self.top.read()
    }
}


#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    fn arb_quotes() -> impl Strategy<Value = Vec<(i64, i64, i64, i64)>> {
        // (bid ticks, bid size, spread ticks, ask size); spread >= 0 keeps
        // quotes uncrossed so every apply succeeds.
        proptest::collection::vec(
            (
                900_000i64..1_100_000,
                1i64..1000,
                0i64..500,
                1i64..1000,
            ),
            1..60,
        )
    }

    proptest! {
        // Ladders stay sorted (bids descending, asks ascending) and the
        // best levels agree with the published snapshot after any valid
        // quote sequence.
        #[test]
        fn ladders_stay_sorted(quotes in arb_quotes()) {
            let mut book = OrderBook::new(Symbol::new("BTCUSDT"));

            for (i, &(bid, bid_size, spread, ask_size)) in quotes.iter().enumerate() {
                let q = Quote {
                    symbol: Symbol::new("BTCUSDT"),
                    bid: Price::from_ticks(bid),
                    ask: Price::from_ticks(bid + spread),
                    bid_size: Qty(bid_size),
                    ask_size: Qty(ask_size),
                    timestamp: Timestamp(i as u64 + 1),
                };
                book.apply(&q).unwrap();

                let bids = book.bid_depth(usize::MAX);
                let asks = book.ask_depth(usize::MAX);
                prop_assert!(bids.windows(2).all(|w| w[0].0 > w[1].0));
                prop_assert!(asks.windows(2).all(|w| w[0].0 < w[1].0));

                let snap = book.snapshot().unwrap();
                prop_assert_eq!(
                    snap.best_bid().map(|(p, _)| p),
                    book.best_bid().map(|l| l.price)
                );
                prop_assert_eq!(
                    snap.best_ask().map(|(p, _)| p),
                    book.best_ask().map(|l| l.price)
                );
            }
        }
    }
}
