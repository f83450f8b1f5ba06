//! Stage worker loops.
//!
//! Each stage runs on its own dedicated OS thread in a tight poll loop over
//! its inbound ring. A loop "suspends" only by coming up empty on
//! [`try_pop`](qx_transport::Consumer::try_pop) and snoozing a bounded
//! backoff — there is no yield point inside a single item's processing, and
//! the stop token is observed only between poll attempts. After stop is
//! signalled a stage keeps draining until its ring is empty, so no item
//! that reached the ring is abandoned.
//!
//! No error arising from one item ever breaks the loop: malformed and
//! unknown-symbol quotes are logged, counted, and skipped; rejected orders
//! surface as status events.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam::utils::Backoff;

use qx_book::OrderBook;
use qx_core::types::{Order, OrderStatus, Quote, Symbol, Timestamp};
use qx_risk::RiskGate;
use qx_transport::{Consumer, Full, Producer};
use qx_trigger::{ConditionalOrder, TriggerResult};

use crate::gateway::{ExecutionGateway, StatusEvent, StatusSink};
use crate::metrics::PipelineMetrics;

/// Shared cooperative stop flag.
///
/// Stages check it between poll attempts; in-flight item processing is
/// never interrupted.
#[derive(Debug, Clone, Default)]
pub struct StopToken(Arc<AtomicBool>);

impl StopToken {
    /// Create a token in the running state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal stop. Idempotent.
    pub fn stop(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Returns `true` once stop has been signalled.
    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Market-data stage: drains the quote ring, maintains the books, fans
/// quotes out to the conditional orders registered for the symbol, and
/// forwards fired orders to the dispatch ring.
///
/// Registration is append-only before the pipeline starts; this stage owns
/// the evaluator map outright for the whole run, which is what guarantees
/// each evaluator sees one quote at a time in per-symbol timestamp order.
pub(crate) struct MarketDataStage {
    pub(crate) rx: Consumer<Quote>,
    pub(crate) books: HashMap<Symbol, OrderBook>,
    pub(crate) watchers: HashMap<Symbol, Vec<ConditionalOrder>>,
    pub(crate) order_tx: Producer<Order>,
    pub(crate) sink: Arc<dyn StatusSink>,
    pub(crate) metrics: Arc<PipelineMetrics>,
    pub(crate) stop: StopToken,
    pub(crate) dispatch_retry_limit: u32,
}

impl MarketDataStage {
    /// Poll loop. Runs until stop is signalled and the ring is drained.
    pub(crate) fn run(mut self) {
        tracing::info!("market data stage started");
        let backoff = Backoff::new();
        loop {
            match self.rx.try_pop() {
                Some(quote) => {
                    self.process(&quote);
                    backoff.reset();
                }
                None => {
                    if self.stop.is_stopped() {
                        break;
                    }
                    backoff.snooze();
                }
            }
        }
        tracing::info!("market data stage stopped");
    }

    fn process(&mut self, quote: &Quote) {
        let Some(book) = self.books.get_mut(&quote.symbol) else {
            tracing::warn!(symbol = %quote.symbol, "quote for unknown symbol dropped");
            self.metrics.incr_quotes_unknown_symbol();
            return;
        };

        // A quote the book refuses is not shown to the evaluators either:
        // that keeps the per-symbol timestamp-order guarantee they rely on.
        if let Err(err) = book.apply(quote) {
            tracing::warn!(symbol = %quote.symbol, error = %err, "quote skipped");
            self.metrics.incr_quotes_malformed();
            return;
        }
        self.metrics.incr_quotes_applied();

        let Some(watchers) = self.watchers.get_mut(&quote.symbol) else {
            return;
        };

        let mut fired: Vec<Order> = Vec::new();
        for watcher in watchers.iter_mut() {
            match watcher.evaluate(quote) {
                TriggerResult::NoAction => {}
                TriggerResult::Armed => {
                    tracing::debug!(order_id = %watcher.id, "conditional order armed");
                }
                TriggerResult::Fire(order) => fired.push(order),
            }
        }
        if !fired.is_empty() {
            watchers.retain(|w| w.is_live());
        }

        for order in fired {
            self.forward(order);
        }
    }

    /// Push a fired order to the dispatch ring, retrying a bounded number
    /// of times. A ring that stays full surfaces the order as `Cancelled`
    /// plus a metric — never a silent loss, never an unbounded stall of the
    /// quote path.
    fn forward(&mut self, order: Order) {
        self.metrics.incr_orders_triggered();
        self.sink.publish(&StatusEvent {
            order_id: order.id,
            symbol: order.symbol.clone(),
            status: OrderStatus::New,
            timestamp: order.timestamp,
        });

        let mut item = order;
        let backoff = Backoff::new();
        for _ in 0..self.dispatch_retry_limit {
            match self.order_tx.try_push(item) {
                Ok(()) => return,
                Err(Full(back)) => {
                    item = back;
                    backoff.snooze();
                }
            }
        }

        tracing::error!(
            order_id = %item.id,
            symbol = %item.symbol,
            "dispatch ring full after bounded retry; cancelling order"
        );
        self.metrics.incr_orders_overflowed();
        self.sink.publish(&StatusEvent {
            order_id: item.id,
            symbol: item.symbol.clone(),
            status: OrderStatus::Cancelled,
            timestamp: Timestamp::now(),
        });
    }
}

/// Dispatch stage: drains the order ring, gates each order on risk, and
/// hands accepted orders to the execution collaborator.
pub(crate) struct OrderDispatchStage {
    pub(crate) rx: Consumer<Order>,
    pub(crate) gate: Arc<RiskGate>,
    pub(crate) gateway: Box<dyn ExecutionGateway>,
    pub(crate) sink: Arc<dyn StatusSink>,
    pub(crate) metrics: Arc<PipelineMetrics>,
    pub(crate) stop: StopToken,
}

impl OrderDispatchStage {
    /// Poll loop. Runs until stop is signalled and the ring is drained.
    pub(crate) fn run(mut self) {
        tracing::info!("order dispatch stage started");
        let backoff = Backoff::new();
        loop {
            match self.rx.try_pop() {
                Some(order) => {
                    self.process(order);
                    backoff.reset();
                }
                None => {
                    if self.stop.is_stopped() {
                        break;
                    }
                    backoff.snooze();
                }
            }
        }
        tracing::info!("order dispatch stage stopped");
    }

    fn process(&mut self, order: Order) {
        match self.gate.check_and_reserve(&order) {
            Ok(()) => {
                self.metrics.incr_orders_dispatched();
                tracing::debug!(order_id = %order.id, symbol = %order.symbol, "order accepted");
                // The gateway may block; no book or ledger state is held
                // here.
                self.gateway.submit(order);
            }
            Err(reject) => {
                self.metrics.incr_orders_rejected();
                tracing::warn!(
                    order_id = %order.id,
                    symbol = %order.symbol,
                    reason = %reject,
                    "order rejected by risk gate"
                );
                let mut order = order;
                order.status = OrderStatus::Rejected;
                self.sink.publish(&StatusEvent {
                    order_id: order.id,
                    symbol: order.symbol.clone(),
                    status: order.status,
                    timestamp: Timestamp::now(),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_token_starts_running() {
        let token = StopToken::new();
        assert!(!token.is_stopped());
    }

    #[test]
    fn test_stop_token_visible_through_clones() {
        let token = StopToken::new();
        let other = token.clone();
        token.stop();
        assert!(other.is_stopped());
        // Idempotent.
        other.stop();
        assert!(token.is_stopped());
    }

    #[test]
    fn test_stop_token_cross_thread() {
        let token = StopToken::new();
        let seen = token.clone();
        let handle = std::thread::spawn(move || {
            let backoff = Backoff::new();
            while !seen.is_stopped() {
                backoff.snooze();
            }
            true
        });
        token.stop();
        assert!(handle.join().unwrap());
    }
}
