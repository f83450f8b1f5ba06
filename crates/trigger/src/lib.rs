//! # qx-trigger
//!
//! Conditional-order state machine. A [`ConditionalOrder`] is a standing
//! instruction (limit, stop, or stop-limit) that watches the quote stream
//! for its symbol and emits exactly one concrete [`Order`] when its trigger
//! condition is met.
//!
//! The order types are a tagged variant rather than a trait-object
//! hierarchy: [`evaluate`](ConditionalOrder::evaluate) switches on the tag,
//! which keeps the per-quote hot path free of virtual dispatch and lets the
//! compiler check the match for exhaustiveness.
//!
//! Concurrency contract: each instance is owned by one evaluator thread and
//! fed quotes for its own symbol in non-decreasing timestamp order. All
//! transitions below are single-threaded consequences of that ownership.

use serde::{Deserialize, Serialize};

use qx_core::types::{Order, OrderId, OrderStatus, Price, Qty, Quote, Side, Symbol, Timestamp};

/// Trigger parameters, tagged by order type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerKind {
    /// Fires when the market reaches the limit price or better.
    Limit {
        /// Limit price carried onto the emitted order.
        limit: Price,
    },
    /// Fires when the market moves through the stop price; emits a market
    /// order.
    Stop {
        /// Stop price.
        stop: Price,
    },
    /// Two-phase: arms on the stop condition, then fires on the limit
    /// condition.
    StopLimit {
        /// Stop price (arming condition).
        stop: Price,
        /// Limit price (firing condition and emitted order price).
        limit: Price,
        /// Set once when the stop condition is first satisfied; never
        /// cleared.
        armed: bool,
    },
}

/// Lifecycle state of a conditional order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerState {
    /// Watching the quote stream.
    Pending,
    /// Fired exactly once; terminal.
    Triggered,
    /// Cancelled before firing; terminal.
    Dead,
}

impl TriggerState {
    /// Returns `true` if no further evaluation can change this order.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// Outcome of evaluating one quote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerResult {
    /// Condition not met; nothing happened.
    NoAction,
    /// A stop-limit order's stop condition was just satisfied. No order is
    /// emitted on the arming quote itself; the limit condition is watched
    /// from the next quote on.
    Armed,
    /// The trigger fired: exactly one concrete order, ready for risk and
    /// dispatch.
    Fire(Order),
}

/// A standing conditional instruction for one symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionalOrder {
    /// Identifier inherited by the emitted order.
    pub id: OrderId,
    /// Symbol whose quotes this order watches.
    pub symbol: Symbol,
    /// Side of the emitted order.
    pub side: Side,
    /// Quantity of the emitted order.
    pub qty: Qty,
    /// When the instruction was submitted.
    pub submitted_at: Timestamp,
    /// Trigger parameters.
    pub kind: TriggerKind,
    state: TriggerState,
}

impl ConditionalOrder {
    /// A limit order: buy at `limit` or better / sell at `limit` or better.
    pub fn limit(
        id: OrderId,
        symbol: Symbol,
        side: Side,
        qty: Qty,
        limit: Price,
        submitted_at: Timestamp,
    ) -> Self {
        Self {
            id,
            symbol,
            side,
            qty,
            submitted_at,
            kind: TriggerKind::Limit { limit },
            state: TriggerState::Pending,
        }
    }

    /// A stop order: becomes a market order once the market moves through
    /// `stop`.
    pub fn stop(
        id: OrderId,
        symbol: Symbol,
        side: Side,
        qty: Qty,
        stop: Price,
        submitted_at: Timestamp,
    ) -> Self {
        Self {
            id,
            symbol,
            side,
            qty,
            submitted_at,
            kind: TriggerKind::Stop { stop },
            state: TriggerState::Pending,
        }
    }

    /// A stop-limit order: arms at `stop`, then fires as a limit order at
    /// `limit`.
    pub fn stop_limit(
        id: OrderId,
        symbol: Symbol,
        side: Side,
        qty: Qty,
        stop: Price,
        limit: Price,
        submitted_at: Timestamp,
    ) -> Self {
        Self {
            id,
            symbol,
            side,
            qty,
            submitted_at,
            kind: TriggerKind::StopLimit {
                stop,
                limit,
                armed: false,
            },
            state: TriggerState::Pending,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> TriggerState {
        self.state
    }

    /// Returns `true` while the order still watches the quote stream.
    pub fn is_live(&self) -> bool {
        !self.state.is_terminal()
    }

    /// Cancel the instruction. Terminal; evaluation becomes a no-op.
    /// Cancelling an already-terminal order does nothing.
    pub fn cancel(&mut self) {
        if self.state == TriggerState::Pending {
            self.state = TriggerState::Dead;
        }
    }

    /// Evaluate one quote.
    ///
    /// Emits at most one order over the whole lifetime of the instruction:
    /// the transition to [`TriggerState::Triggered`] happens exactly once,
    /// and evaluation in a terminal state returns
    /// [`TriggerResult::NoAction`]. For stop-limit orders the arming
    /// transition is equally one-shot — repeated quotes that keep the stop
    /// condition true do not re-arm, and `armed` is never cleared.
    pub fn evaluate(&mut self, quote: &Quote) -> TriggerResult {
        if self.state.is_terminal() {
            return TriggerResult::NoAction;
        }
        debug_assert_eq!(self.symbol, quote.symbol);

        match self.kind {
            TriggerKind::Limit { limit } => {
                if limit_satisfied(self.side, quote, limit) {
                    self.fire(limit, quote.timestamp)
                } else {
                    TriggerResult::NoAction
                }
            }
            TriggerKind::Stop { stop } => {
                if stop_satisfied(self.side, quote, stop) {
                    self.fire(Price::ZERO, quote.timestamp)
                } else {
                    TriggerResult::NoAction
                }
            }
            TriggerKind::StopLimit {
                stop,
                limit,
                ref mut armed,
            } => {
                if !*armed {
                    if stop_satisfied(self.side, quote, stop) {
                        *armed = true;
                        tracing::debug!(order_id = %self.id, stop = %stop, "stop-limit armed");
                        return TriggerResult::Armed;
                    }
                    return TriggerResult::NoAction;
                }
                if limit_satisfied(self.side, quote, limit) {
                    self.fire(limit, quote.timestamp)
                } else {
                    TriggerResult::NoAction
                }
            }
        }
    }

    /// Transition to `Triggered` and build the emitted order.
    fn fire(&mut self, price: Price, timestamp: Timestamp) -> TriggerResult {
        self.state = TriggerState::Triggered;
        TriggerResult::Fire(Order {
            id: self.id,
            symbol: self.symbol.clone(),
            side: self.side,
            qty: self.qty,
            price,
            timestamp,
            status: OrderStatus::New,
        })
    }
}

/// Limit condition: buy when the ask has come down to the limit, sell when
/// the bid has come up to it.
#[inline]
fn limit_satisfied(side: Side, quote: &Quote, limit: Price) -> bool {
    match side {
        Side::Buy => quote.ask <= limit,
        Side::Sell => quote.bid >= limit,
    }
}

/// Stop condition: buy when the ask has risen through the stop, sell when
/// the bid has fallen through it.
#[inline]
fn stop_satisfied(side: Side, quote: &Quote, stop: Price) -> bool {
    match side {
        Side::Buy => quote.ask >= stop,
        Side::Sell => quote.bid <= stop,
    }
}
