//! Collaborator seams: execution egress and observability egress.
//!
//! The pipeline core stops at these traits. The execution gateway is the
//! only call on the pipeline that may block; the dispatch stage invokes it
//! while holding no book or ledger state. The status sink is fire-and-
//! forget — the core never depends on it succeeding or returning anything.

use serde::Serialize;

use qx_core::types::{Order, OrderId, OrderStatus, Symbol, Timestamp};

/// External execution collaborator (broker/exchange adapter).
///
/// Ownership of the order passes with the call; the core never mutates an
/// order after `submit` and never retries a failed network submission —
/// that is the collaborator's responsibility. The core only distinguishes
/// "risk-rejected" (never sent) from "dispatched" (sent once).
pub trait ExecutionGateway: Send {
    /// Hand one accepted order to the venue.
    fn submit(&mut self, order: Order);
}

/// A status transition record for the observability collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusEvent {
    /// Order the transition belongs to.
    pub order_id: OrderId,
    /// Instrument symbol.
    pub symbol: Symbol,
    /// New status.
    pub status: OrderStatus,
    /// When the transition happened.
    pub timestamp: Timestamp,
}

/// External metrics/logging collaborator.
pub trait StatusSink: Send + Sync {
    /// Report one status transition. Must not panic; the core ignores the
    /// outcome.
    fn publish(&self, event: &StatusEvent);
}

/// A sink that discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl StatusSink for NullSink {
    fn publish(&self, _event: &StatusEvent) {}
}

/// A gateway that logs each dispatched order; used by the demo binary.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogGateway;

impl ExecutionGateway for LogGateway {
    fn submit(&mut self, order: Order) {
        tracing::info!(
            order_id = %order.id,
            symbol = %order.symbol,
            side = %order.side,
            qty = %order.qty,
            price = %order.price,
            market = order.is_market(),
            "order dispatched"
        );
    }
}
