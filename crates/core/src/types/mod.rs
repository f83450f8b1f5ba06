//! Core types for the QX pipeline.
//!
//! Everything here is designed for the hot path: prices are fixed-point
//! integers, quantities are plain signed units, timestamps are raw monotonic
//! nanoseconds, and allocation is limited to `Symbol` construction.

pub mod order;
pub mod price;
pub mod quote;
pub mod timestamp;

// Re-export primary types for convenient access via `qx_core::types::*`.
pub use order::{Order, OrderId, OrderStatus, Qty, Side, Symbol};
pub use price::Price;
pub use quote::Quote;
pub use timestamp::Timestamp;
