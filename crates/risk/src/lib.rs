//! # qx-risk
//!
//! Pre-trade risk gate. Every order must pass
//! [`RiskGate::check_and_reserve`](gate::RiskGate::check_and_reserve) before
//! it may be dispatched: the gate owns the position ledger, serializes all
//! reads and writes per symbol, and commits the reservation in the same
//! step as the check so there is no window for two orders to both pass
//! against the same headroom.

pub mod gate;

pub use gate::{RiskGate, RiskReject, SymbolLimits};
