//! Atomically published top-of-book snapshot.
//!
//! [`TopOfBook`] is a seqlock cell: the book's writer thread publishes the
//! best bid/ask as one unit, and reader threads retry until they observe a
//! stable version. A reader can therefore never pair a bid from one book
//! update with an ask from a different one, and readers impose no cost on
//! the writer (no lock, no reader stall on the quote path).
//!
//! Protocol: `version` is bumped to an odd value before the field stores
//! and to the next even value after them. Readers load the version with
//! `Acquire`, read the fields, then re-check the version behind an
//! `Acquire` fence; an odd or changed version means a write was in flight
//! and the read retries.

use std::sync::atomic::{fence, AtomicI64, AtomicU64, Ordering};

use qx_core::types::{Price, Qty, Timestamp};

/// A consistent top-of-book pair, always taken from a single book update.
///
/// An empty side is encoded as a zero size; use [`TopSnapshot::best_bid`] /
/// [`TopSnapshot::best_ask`] for the `Option` view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TopSnapshot {
    /// Best bid price (meaningless when `bid_size` is zero).
    pub bid: Price,
    /// Size at the best bid; zero means the bid side is empty.
    pub bid_size: Qty,
    /// Best ask price (meaningless when `ask_size` is zero).
    pub ask: Price,
    /// Size at the best ask; zero means the ask side is empty.
    pub ask_size: Qty,
    /// Timestamp of the quote that produced this snapshot.
    pub timestamp: Timestamp,
}

impl TopSnapshot {
    /// Best bid as `(price, size)`, or `None` if the bid side is empty.
    pub fn best_bid(&self) -> Option<(Price, Qty)> {
        (!self.bid_size.is_zero()).then_some((self.bid, self.bid_size))
    }

    /// Best ask as `(price, size)`, or `None` if the ask side is empty.
    pub fn best_ask(&self) -> Option<(Price, Qty)> {
        (!self.ask_size.is_zero()).then_some((self.ask, self.ask_size))
    }
}

/// Seqlock-published top-of-book cell.
///
/// Exactly one thread may call [`publish`](TopOfBook::publish) (the book's
/// writer); any number of threads may call [`read`](TopOfBook::read).
#[derive(Debug, Default)]
pub struct TopOfBook {
    /// Even = stable, odd = write in flight, 0 = never published.
    version: AtomicU64,
    bid_ticks: AtomicI64,
    bid_units: AtomicI64,
    ask_ticks: AtomicI64,
    ask_units: AtomicI64,
    ts_nanos: AtomicU64,
}

impl TopOfBook {
    /// Create a cell with no published snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a new snapshot. Writer-side only.
    pub fn publish(&self, snap: &TopSnapshot) {
        let v = self.version.load(Ordering::Relaxed);
        self.version.store(v.wrapping_add(1), Ordering::Relaxed);
        fence(Ordering::Release);

        self.bid_ticks.store(snap.bid.ticks(), Ordering::Relaxed);
        self.bid_units.store(snap.bid_size.units(), Ordering::Relaxed);
        self.ask_ticks.store(snap.ask.ticks(), Ordering::Relaxed);
        self.ask_units.store(snap.ask_size.units(), Ordering::Relaxed);
        self.ts_nanos.store(snap.timestamp.as_nanos(), Ordering::Relaxed);

        self.version.store(v.wrapping_add(2), Ordering::Release);
    }

    /// Read the latest stable snapshot, retrying across in-flight writes.
    ///
    /// Returns `None` until the first publish.
    pub fn read(&self) -> Option<TopSnapshot> {
        loop {
            let v1 = self.version.load(Ordering::Acquire);
            if v1 == 0 {
                return None;
            }
            if v1 & 1 == 1 {
                std::hint::spin_loop();
                continue;
            }

            let snap = TopSnapshot {
                bid: Price::from_ticks(self.bid_ticks.load(Ordering::Relaxed)),
                bid_size: Qty(self.bid_units.load(Ordering::Relaxed)),
                ask: Price::from_ticks(self.ask_ticks.load(Ordering::Relaxed)),
                ask_size: Qty(self.ask_units.load(Ordering::Relaxed)),
                timestamp: Timestamp(self.ts_nanos.load(Ordering::Relaxed)),
            };

            fence(Ordering::Acquire);
            if self.version.load(Ordering::Relaxed) == v1 {
                return Some(snap);
            }
            std::hint::spin_loop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn snap(bid_ticks: i64, ask_ticks: i64, size: i64, ts: u64) -> TopSnapshot {
        TopSnapshot {
            bid: Price::from_ticks(bid_ticks),
            bid_size: Qty(size),
            ask: Price::from_ticks(ask_ticks),
            ask_size: Qty(size),
            timestamp: Timestamp(ts),
        }
    }

    #[test]
    fn test_unpublished_reads_none() {
        let top = TopOfBook::new();
        assert_eq!(top.read(), None);
    }

    #[test]
    fn test_publish_then_read() {
        let top = TopOfBook::new();
        let s = snap(1_000_000, 1_000_100, 5, 7);
        top.publish(&s);
        assert_eq!(top.read(), Some(s));
    }

    #[test]
    fn test_latest_publish_wins() {
        let top = TopOfBook::new();
        top.publish(&snap(1, 2, 1, 1));
        let s = snap(1_000_000, 1_000_100, 5, 7);
        top.publish(&s);
        assert_eq!(top.read(), Some(s));
    }

    #[test]
    fn test_empty_side_encoding() {
        let top = TopOfBook::new();
        let mut s = snap(1_000_000, 1_000_100, 5, 7);
        s.ask_size = Qty::ZERO;
        top.publish(&s);
        let got = top.read().unwrap();
        assert!(got.best_bid().is_some());
        assert!(got.best_ask().is_none());
    }

    // One writer publishing (bid, bid + 1 tick) pairs, several readers
    // asserting the pair is never torn.
    #[test]
    fn test_concurrent_readers_never_observe_torn_pair() {
        const WRITES: i64 = 50_000;
        const READERS: usize = 4;

        let top = Arc::new(TopOfBook::new());

        std::thread::scope(|s| {
            for _ in 0..READERS {
                let top = Arc::clone(&top);
                s.spawn(move || {
                    let mut last_ts = 0u64;
                    for _ in 0..200_000 {
                        if let Some(got) = top.read() {
                            assert_eq!(
                                got.ask.ticks() - got.bid.ticks(),
                                1,
                                "torn bid/ask pair: {:?}",
                                got
                            );
                            assert_eq!(got.bid_size, got.ask_size);
                            // Published timestamps only move forward.
                            assert!(got.timestamp.as_nanos() >= last_ts);
                            last_ts = got.timestamp.as_nanos();
                        }
                    }
                });
            }

            let top = Arc::clone(&top);
            s.spawn(move || {
                for i in 0..WRITES {
                    top.publish(&snap(1_000_000 + i, 1_000_001 + i, i + 1, i as u64 + 1));
                }
            });
        });
    }
}
