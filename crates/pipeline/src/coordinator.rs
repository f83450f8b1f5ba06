//! Pipeline construction and lifecycle.
//!
//! [`PipelineBuilder`] validates the configuration, accepts the append-only
//! set of conditional orders, and constructs every channel, book, and the
//! risk gate **before** any thread starts. [`PipelineBuilder::start`] then
//! spawns one named thread per stage and returns the running [`Pipeline`]
//! together with the single [`QuoteFeed`] producer handle.
//!
//! Shutdown is an ordered two-phase drain: the market stage is stopped and
//! joined first (it drains every quote still in its ring, forwarding any
//! fires), then the dispatch stage (which drains every forwarded order
//! through the risk gate and gateway). No item that reached a ring is
//! abandoned mid-flight.

use std::collections::HashMap;
use std::sync::Arc;
use std::thread::JoinHandle;

use qx_book::OrderBook;
use qx_core::config::PipelineConfig;
use qx_core::types::{Order, Qty, Quote, Symbol};
use qx_risk::{RiskGate, SymbolLimits};
use qx_transport::{channel, Full, Producer};
use qx_trigger::ConditionalOrder;

use crate::gateway::{ExecutionGateway, StatusSink};
use crate::metrics::{MetricsSnapshot, PipelineMetrics};
use crate::stages::{MarketDataStage, OrderDispatchStage, StopToken};

/// Errors raised while assembling a pipeline. All of them occur before any
/// worker thread exists.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// A conditional order references a symbol the pipeline is not
    /// configured for.
    #[error("cannot register order for unconfigured symbol: {0}")]
    UnknownSymbol(Symbol),
    /// The configuration failed validation.
    #[error(transparent)]
    InvalidConfig(#[from] anyhow::Error),
    /// A stage thread could not be spawned.
    #[error("failed to spawn stage thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Assembles a [`Pipeline`].
///
/// Conditional-order registration happens here and only here: once
/// [`start`](Self::start) hands the evaluator set to the market-data
/// thread it is owned outright for the whole run, so there are no
/// registration races to reason about.
pub struct PipelineBuilder {
    config: PipelineConfig,
    symbols: Vec<Symbol>,
    watchers: HashMap<Symbol, Vec<ConditionalOrder>>,
}

impl PipelineBuilder {
    /// Validate `config` and begin assembling a pipeline.
    pub fn new(config: PipelineConfig) -> Result<Self, BuildError> {
        config.validate()?;
        let symbols: Vec<Symbol> = config
            .market_data
            .symbols
            .iter()
            .map(|s| Symbol::new(s.as_str()))
            .collect();
        let watchers = symbols.iter().map(|s| (s.clone(), Vec::new())).collect();
        Ok(Self {
            config,
            symbols,
            watchers,
        })
    }

    /// Register a conditional order. Append-only, setup-phase only.
    pub fn register(&mut self, order: ConditionalOrder) -> Result<(), BuildError> {
        match self.watchers.get_mut(&order.symbol) {
            Some(list) => {
                list.push(order);
                Ok(())
            }
            None => Err(BuildError::UnknownSymbol(order.symbol.clone())),
        }
    }

    /// Construct all shared state, spawn the stage threads, and return the
    /// running pipeline plus its one quote producer handle.
    pub fn start(
        self,
        gateway: Box<dyn ExecutionGateway>,
        sink: Arc<dyn StatusSink>,
    ) -> Result<(Pipeline, QuoteFeed), BuildError> {
        let metrics = Arc::new(PipelineMetrics::new());

        // Everything the threads touch is built before either spawns.
        let books: HashMap<Symbol, OrderBook> = self
            .symbols
            .iter()
            .map(|s| {
                (
                    s.clone(),
                    OrderBook::with_crossed_tolerance(s.clone(), self.config.book.max_crossed_ticks),
                )
            })
            .collect();

        let limits: HashMap<Symbol, SymbolLimits> = self
            .symbols
            .iter()
            .map(|s| {
                let (max_position, max_dollar_exposure) = self.config.risk.resolve(s.as_str());
                (
                    s.clone(),
                    SymbolLimits {
                        max_position,
                        max_dollar_exposure,
                    },
                )
            })
            .collect();
        let gate = Arc::new(RiskGate::new(limits));

        let (quote_tx, quote_rx) = channel::<Quote>(self.config.channels.quote_capacity);
        let (order_tx, order_rx) = channel::<Order>(self.config.channels.order_capacity);

        let market_stop = StopToken::new();
        let dispatch_stop = StopToken::new();

        let market = MarketDataStage {
            rx: quote_rx,
            books,
            watchers: self.watchers,
            order_tx,
            sink: Arc::clone(&sink),
            metrics: Arc::clone(&metrics),
            stop: market_stop.clone(),
            dispatch_retry_limit: self.config.channels.dispatch_retry_limit,
        };

        let dispatch = OrderDispatchStage {
            rx: order_rx,
            gate: Arc::clone(&gate),
            gateway,
            sink,
            metrics: Arc::clone(&metrics),
            stop: dispatch_stop.clone(),
        };

        let market_handle = std::thread::Builder::new()
            .name("qx-market-data".into())
            .spawn(move || market.run())?;
        let dispatch_handle = std::thread::Builder::new()
            .name("qx-dispatch".into())
            .spawn(move || dispatch.run())?;

        tracing::info!(
            symbols = ?self.config.market_data.symbols,
            quote_capacity = self.config.channels.quote_capacity,
            order_capacity = self.config.channels.order_capacity,
            "pipeline started"
        );

        let pipeline = Pipeline {
            market: Some(market_handle),
            dispatch: Some(dispatch_handle),
            market_stop,
            dispatch_stop,
            metrics: Arc::clone(&metrics),
            gate,
        };
        let feed = QuoteFeed {
            tx: quote_tx,
            metrics,
        };
        Ok((pipeline, feed))
    }
}

/// A running pipeline: owns the stage threads and the shared state handles.
pub struct Pipeline {
    market: Option<JoinHandle<()>>,
    dispatch: Option<JoinHandle<()>>,
    market_stop: StopToken,
    dispatch_stop: StopToken,
    metrics: Arc<PipelineMetrics>,
    gate: Arc<RiskGate>,
}

impl Pipeline {
    /// Begin assembling a pipeline from a validated configuration.
    pub fn builder(config: PipelineConfig) -> Result<PipelineBuilder, BuildError> {
        PipelineBuilder::new(config)
    }

    /// Point-in-time counters.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Net position committed by the risk gate for `symbol`.
    pub fn position(&self, symbol: &Symbol) -> Qty {
        self.gate.position(symbol)
    }

    /// All non-flat positions committed by the risk gate.
    pub fn positions(&self) -> Vec<(Symbol, Qty)> {
        self.gate.positions()
    }

    /// Stop both stages in dependency order and join them, then report the
    /// final counters and positions.
    ///
    /// The market stage is joined before dispatch is told to stop, so every
    /// order it forwarded during its drain is still consumed, risk-checked,
    /// and dispatched (or rejected) before the dispatch thread exits.
    pub fn shutdown(mut self) -> PipelineReport {
        self.stop_and_join();
        PipelineReport {
            metrics: self.metrics.snapshot(),
            positions: self.gate.positions(),
        }
    }

    fn stop_and_join(&mut self) {
        self.market_stop.stop();
        if let Some(handle) = self.market.take() {
            if handle.join().is_err() {
                tracing::error!("market data stage panicked");
            }
        }
        self.dispatch_stop.stop();
        if let Some(handle) = self.dispatch.take() {
            if handle.join().is_err() {
                tracing::error!("order dispatch stage panicked");
            }
        }
        tracing::info!("pipeline stopped");
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        // Safety net for pipelines dropped without an explicit shutdown.
        self.stop_and_join();
    }
}

/// Final state reported by [`Pipeline::shutdown`].
#[derive(Debug, Clone, serde::Serialize)]
pub struct PipelineReport {
    /// Counter totals over the pipeline's lifetime.
    pub metrics: MetricsSnapshot,
    /// Non-flat net positions committed by the risk gate.
    pub positions: Vec<(Symbol, Qty)>,
}

/// Push-style market data ingress. Exactly one feed thread may own this.
///
/// Backpressure policy: when the quote ring is full the incoming quote is
/// dropped and counted (`quotes_dropped`) — the next quote for the symbol
/// supersedes it, and stalling the feed thread would push latency upstream
/// into ingestion.
pub struct QuoteFeed {
    tx: Producer<Quote>,
    metrics: Arc<PipelineMetrics>,
}

impl QuoteFeed {
    /// Offer one quote to the pipeline. Returns `false` if it was dropped
    /// by the backpressure policy.
    pub fn on_quote(&mut self, quote: Quote) -> bool {
        match self.tx.try_push(quote) {
            Ok(()) => {
                self.metrics.incr_quotes_ingested();
                true
            }
            Err(Full(quote)) => {
                self.metrics.incr_quotes_dropped();
                tracing::debug!(symbol = %quote.symbol, "quote ring full; quote dropped");
                false
            }
        }
    }
}
