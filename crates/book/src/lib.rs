//! # qx-book
//!
//! Per-symbol order book: sorted bid/ask price-level ladders owned by a
//! single writer thread, plus an atomically published top-of-book snapshot
//! that any thread can read without ever observing a half-applied update.

pub mod book;
pub mod top;

pub use book::{BookError, OrderBook, PriceLevel};
pub use top::{TopOfBook, TopSnapshot};
