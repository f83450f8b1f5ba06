//! Position and exposure limit enforcement.
//!
//! The ledger is a `DashMap` keyed by symbol: holding an entry guard
//! serializes every check-and-commit for that symbol, while distinct
//! symbols proceed on their own shards. This is the one intended point of
//! lock contention in the pipeline, kept as narrow as the sharding allows.

use std::collections::HashMap;

use dashmap::DashMap;

use qx_core::types::{Order, Qty, Symbol};

/// Configured limits for one symbol.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolLimits {
    /// Maximum absolute net position, in units.
    pub max_position: i64,
    /// Maximum order notional (`price × qty`); `None` disables the check.
    /// Market orders carry no price and are exempt.
    pub max_dollar_exposure: Option<f64>,
}

/// Reason an order was refused. A rejection is a terminal order status,
/// not an exception: the gate reports it and the pipeline keeps running.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RiskReject {
    /// The order references a symbol with no configured limits.
    #[error("unknown symbol: {0}")]
    UnknownSymbol(Symbol),
    /// The resulting net position would exceed the configured maximum.
    #[error(
        "position limit on {symbol}: current {current}, order would result in {resulting}, limit {limit}"
    )]
    PositionLimit {
        symbol: Symbol,
        current: i64,
        resulting: i64,
        limit: i64,
    },
    /// The order notional exceeds the configured maximum.
    #[error("exposure limit on {symbol}: notional {notional:.2} > limit {limit:.2}")]
    ExposureLimit {
        symbol: Symbol,
        notional: f64,
        limit: f64,
    },
}

/// The risk gate: configured limits plus the position ledger it protects.
///
/// The ledger is owned by the gate and never read by any other component
/// directly; [`position`](Self::position) exposes a point-in-time copy for
/// reporting.
pub struct RiskGate {
    limits: HashMap<Symbol, SymbolLimits>,
    /// Net position per symbol, in units. Positive = long.
    ledger: DashMap<Symbol, i64>,
}

impl RiskGate {
    /// Create a gate for the given per-symbol limits. The ledger starts
    /// flat.
    pub fn new(limits: HashMap<Symbol, SymbolLimits>) -> Self {
        Self {
            limits,
            ledger: DashMap::new(),
        }
    }

    /// Check the order against its symbol's limits and, on acceptance,
    /// commit the position update in the same serialized step.
    ///
    /// On rejection the ledger is left untouched and the caller must mark
    /// the order `Rejected` — never drop it silently. There is no separate
    /// release path: fill/cancel reconciliation against the venue is the
    /// execution collaborator's concern.
    ///
    /// All ledger accesses for one symbol are serialized by the entry
    /// guard; different symbols may be checked concurrently.
    pub fn check_and_reserve(&self, order: &Order) -> Result<(), RiskReject> {
        let limits = self
            .limits
            .get(&order.symbol)
            .ok_or_else(|| RiskReject::UnknownSymbol(order.symbol.clone()))?;

        // Notional check needs no ledger access.
        if let Some(limit) = limits.max_dollar_exposure {
            if !order.price.is_zero() {
                let notional = order.price.to_f64().abs() * order.qty.abs().units() as f64;
                if notional > limit {
                    return Err(RiskReject::ExposureLimit {
                        symbol: order.symbol.clone(),
                        notional,
                        limit,
                    });
                }
            }
        }

        // Entry guard held across check and commit: the serialization
        // point for this symbol.
        let mut entry = self.ledger.entry(order.symbol.clone()).or_insert(0);
        let current = *entry;
        let resulting = current + order.side.sign() * order.qty.abs().units();

        if resulting.abs() > limits.max_position {
            tracing::warn!(
                order_id = %order.id,
                symbol = %order.symbol,
                current,
                resulting,
                limit = limits.max_position,
                "order rejected: position limit"
            );
            return Err(RiskReject::PositionLimit {
                symbol: order.symbol.clone(),
                current,
                resulting,
                limit: limits.max_position,
            });
        }

        *entry = resulting;
        Ok(())
    }

    /// Current net position for `symbol`, in units. Zero if never traded.
    pub fn position(&self, symbol: &Symbol) -> Qty {
        Qty(self.ledger.get(symbol).map(|e| *e).unwrap_or(0))
    }

    /// Point-in-time copy of all non-flat positions.
    pub fn positions(&self) -> Vec<(Symbol, Qty)> {
        self.ledger
            .iter()
            .filter(|e| *e.value() != 0)
            .map(|e| (e.key().clone(), Qty(*e.value())))
            .collect()
    }

    /// Returns `true` if limits are configured for `symbol`.
    pub fn knows(&self, symbol: &Symbol) -> bool {
        self.limits.contains_key(symbol)
    }
}
