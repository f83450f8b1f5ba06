//! Layered configuration for the QX pipeline.
//!
//! Configuration is loaded in layers with increasing priority:
//! 1. Compiled-in defaults (conservative limits, modest channel capacities)
//! 2. TOML configuration file (if provided)
//! 3. Environment variable overrides (prefix `QX_PIPE_`, nested with `__`,
//!    e.g. `QX_PIPE_CHANNELS__QUOTE_CAPACITY=8192`)
//!
//! Loading validates the result and fails before any pipeline thread is
//! started: a zero channel capacity or an empty symbol list is an
//! unrecoverable misconfiguration, not a runtime condition.

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

// ── Default value functions ────────────────────────────────────────────

/// Default quote channel capacity: 4096 slots.
fn default_quote_capacity() -> usize {
    4096
}

/// Default order channel capacity: 1024 slots.
fn default_order_capacity() -> usize {
    1024
}

/// Default bounded-retry attempts when the order channel is full: 64.
fn default_dispatch_retry_limit() -> u32 {
    64
}

/// Default crossed-book tolerance: 0 ticks (any bid > ask is malformed).
fn default_max_crossed_ticks() -> i64 {
    0
}

// ── Configuration structs ──────────────────────────────────────────────

/// Top-level pipeline configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Market data subscription settings.
    pub market_data: MarketDataConfig,
    /// Inter-stage channel settings.
    pub channels: ChannelConfig,
    /// Order book validation settings.
    #[serde(default)]
    pub book: BookConfig,
    /// Risk limits.
    pub risk: RiskConfig,
}

/// Market data configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MarketDataConfig {
    /// Symbols the pipeline maintains books and evaluators for.
    pub symbols: Vec<String>,
}

/// Inter-stage channel configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ChannelConfig {
    /// Quote ring capacity (rounded up to a power of two).
    #[serde(default = "default_quote_capacity")]
    pub quote_capacity: usize,
    /// Order ring capacity (rounded up to a power of two).
    #[serde(default = "default_order_capacity")]
    pub order_capacity: usize,
    /// How many times the market-data stage retries a full order ring
    /// before surfacing the order as cancelled.
    #[serde(default = "default_dispatch_retry_limit")]
    pub dispatch_retry_limit: u32,
}

/// Order book validation configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct BookConfig {
    /// How far (in ticks) the bid may sit above the ask before a quote is
    /// treated as malformed and skipped.
    #[serde(default = "default_max_crossed_ticks")]
    pub max_crossed_ticks: i64,
}

impl Default for BookConfig {
    fn default() -> Self {
        Self {
            max_crossed_ticks: default_max_crossed_ticks(),
        }
    }
}

/// Risk limit configuration: workspace-wide defaults plus per-symbol
/// overrides.
#[derive(Debug, Clone, Deserialize)]
pub struct RiskConfig {
    /// Default maximum absolute net position, in units.
    pub max_position: i64,
    /// Default maximum order notional (`price × qty`) in currency units.
    /// `None` disables the exposure check.
    #[serde(default)]
    pub max_dollar_exposure: Option<f64>,
    /// Per-symbol overrides keyed by symbol name.
    #[serde(default)]
    pub symbols: HashMap<String, SymbolLimitOverride>,
}

/// Per-symbol overrides for [`RiskConfig`] defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SymbolLimitOverride {
    /// Override for the maximum absolute net position.
    #[serde(default)]
    pub max_position: Option<i64>,
    /// Override for the maximum order notional.
    #[serde(default)]
    pub max_dollar_exposure: Option<f64>,
}

impl RiskConfig {
    /// Resolve the effective `(max_position, max_dollar_exposure)` for one
    /// symbol, applying any override on top of the defaults.
    pub fn resolve(&self, symbol: &str) -> (i64, Option<f64>) {
        match self.symbols.get(symbol) {
            Some(ovr) => (
                ovr.max_position.unwrap_or(self.max_position),
                ovr.max_dollar_exposure.or(self.max_dollar_exposure),
            ),
            None => (self.max_position, self.max_dollar_exposure),
        }
    }
}

impl PipelineConfig {
    /// Load configuration using layered sources.
    ///
    /// 1. Compiled-in defaults.
    /// 2. TOML file at `config_path` (if `Some`).
    /// 3. Environment variable overrides with prefix `QX_PIPE_` and `__` as
    ///    the nesting separator (e.g. `QX_PIPE_RISK__MAX_POSITION=50`).
    pub fn load(config_path: Option<PathBuf>) -> Result<Self> {
        let mut builder = Config::builder()
            .set_default("market_data.symbols", vec!["BTCUSDT"])?
            .set_default("channels.quote_capacity", 4096i64)?
            .set_default("channels.order_capacity", 1024i64)?
            .set_default("channels.dispatch_retry_limit", 64i64)?
            .set_default("book.max_crossed_ticks", 0i64)?
            .set_default("risk.max_position", 100i64)?;

        if let Some(path) = config_path {
            let path_str = path.to_str().context("config path is not valid UTF-8")?;
            builder = builder.add_source(File::with_name(path_str).required(true));
        }

        // The prefix separator must be set explicitly to `_` because the
        // `config` crate defaults it to the nesting separator when one is
        // provided. Without this, `QX_PIPE_RISK__MAX_POSITION` would be
        // matched against prefix `qx_pipe__` instead of `qx_pipe_`.
        builder = builder.add_source(
            Environment::with_prefix("QX_PIPE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let cfg: PipelineConfig = builder
            .build()
            .context("failed to build configuration")?
            .try_deserialize()
            .context("failed to deserialize configuration")?;

        cfg.validate()?;
        Ok(cfg)
    }

    /// Validate configuration invariants.
    ///
    /// Called by [`load`](Self::load); also the entry point for
    /// programmatically constructed configs, so a zero capacity or empty
    /// symbol list fails before any pipeline thread is started.
    pub fn validate(&self) -> Result<()> {
        if self.market_data.symbols.is_empty() {
            bail!("market_data.symbols must name at least one symbol");
        }
        let mut seen = std::collections::HashSet::new();
        for sym in &self.market_data.symbols {
            if !seen.insert(sym.as_str()) {
                bail!("duplicate symbol in market_data.symbols: {sym}");
            }
        }
        if self.channels.quote_capacity == 0 {
            bail!("channels.quote_capacity must be non-zero");
        }
        if self.channels.order_capacity == 0 {
            bail!("channels.order_capacity must be non-zero");
        }
        if self.channels.dispatch_retry_limit == 0 {
            bail!("channels.dispatch_retry_limit must be at least 1");
        }
        if self.book.max_crossed_ticks < 0 {
            bail!("book.max_crossed_ticks must be non-negative");
        }
        for sym in &self.market_data.symbols {
            let (max_position, max_exposure) = self.risk.resolve(sym);
            if max_position <= 0 {
                bail!("risk.max_position for {sym} must be positive");
            }
            if let Some(exp) = max_exposure {
                if exp <= 0.0 {
                    bail!("risk.max_dollar_exposure for {sym} must be positive");
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Mutex;

    /// Global mutex to serialize tests that manipulate environment
    /// variables. Recovers from poisoned state so a panic in one test does
    /// not cascade to all others.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn lock_env() -> std::sync::MutexGuard<'static, ()> {
        ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn clear_env() {
        std::env::remove_var("QX_PIPE_RISK__MAX_POSITION");
        std::env::remove_var("QX_PIPE_CHANNELS__QUOTE_CAPACITY");
    }

    /// Create a temporary TOML config file and return its path.
    ///
    /// Uses a `.toml` suffix so the `config` crate auto-detects the format.
    fn write_temp_toml(content: &str) -> (tempfile::NamedTempFile, PathBuf) {
        let mut f = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .expect("create temp file");
        write!(f, "{}", content).expect("write temp file");
        let path = f.path().to_path_buf();
        (f, path)
    }

    #[test]
    fn test_load_defaults_only() {
        let _lock = lock_env();
        clear_env();

        let cfg = PipelineConfig::load(None).expect("load defaults");
        assert_eq!(cfg.market_data.symbols, vec!["BTCUSDT"]);
        assert_eq!(cfg.channels.quote_capacity, 4096);
        assert_eq!(cfg.channels.order_capacity, 1024);
        assert_eq!(cfg.channels.dispatch_retry_limit, 64);
        assert_eq!(cfg.book.max_crossed_ticks, 0);
        assert_eq!(cfg.risk.max_position, 100);
        assert!(cfg.risk.max_dollar_exposure.is_none());
    }

    #[test]
    fn test_load_from_toml() {
        let _lock = lock_env();
        clear_env();

        let toml_content = r#"
[market_data]
symbols = ["BTCUSDT", "ETHUSDT"]

[channels]
quote_capacity = 8192
order_capacity = 512

[book]
max_crossed_ticks = 2

[risk]
max_position = 250
max_dollar_exposure = 1000000.0

[risk.symbols.ETHUSDT]
max_position = 50
"#;
        let (_f, path) = write_temp_toml(toml_content);
        let cfg = PipelineConfig::load(Some(path)).expect("load from toml");

        assert_eq!(cfg.market_data.symbols, vec!["BTCUSDT", "ETHUSDT"]);
        assert_eq!(cfg.channels.quote_capacity, 8192);
        assert_eq!(cfg.book.max_crossed_ticks, 2);
        assert_eq!(cfg.risk.resolve("BTCUSDT"), (250, Some(1_000_000.0)));
        assert_eq!(cfg.risk.resolve("ETHUSDT"), (50, Some(1_000_000.0)));
    }

    #[test]
    fn test_env_var_overrides() {
        let _lock = lock_env();
        clear_env();
        std::env::set_var("QX_PIPE_RISK__MAX_POSITION", "42");

        let cfg = PipelineConfig::load(None).expect("load with env override");
        assert_eq!(cfg.risk.max_position, 42);

        std::env::remove_var("QX_PIPE_RISK__MAX_POSITION");
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let _lock = lock_env();
        clear_env();

        let (_f, path) = write_temp_toml(
            r#"
[market_data]
symbols = ["BTCUSDT"]

[channels]
quote_capacity = 0

[risk]
max_position = 100
"#,
        );
        let err = PipelineConfig::load(Some(path)).unwrap_err();
        assert!(format!("{err}").contains("quote_capacity"));
    }

    #[test]
    fn test_empty_symbols_rejected() {
        let _lock = lock_env();
        clear_env();

        let (_f, path) = write_temp_toml(
            r#"
[market_data]
symbols = []

[risk]
max_position = 100
"#,
        );
        assert!(PipelineConfig::load(Some(path)).is_err());
    }

    #[test]
    fn test_duplicate_symbols_rejected() {
        let _lock = lock_env();
        clear_env();

        let (_f, path) = write_temp_toml(
            r#"
[market_data]
symbols = ["BTCUSDT", "BTCUSDT"]

[risk]
max_position = 100
"#,
        );
        assert!(PipelineConfig::load(Some(path)).is_err());
    }

    #[test]
    fn test_nonpositive_override_rejected() {
        let _lock = lock_env();
        clear_env();

        let (_f, path) = write_temp_toml(
            r#"
[market_data]
symbols = ["BTCUSDT"]

[risk]
max_position = 100

[risk.symbols.BTCUSDT]
max_position = 0
"#,
        );
        assert!(PipelineConfig::load(Some(path)).is_err());
    }

    #[test]
    fn test_resolve_falls_back_to_defaults() {
        let risk = RiskConfig {
            max_position: 100,
            max_dollar_exposure: Some(5000.0),
            symbols: HashMap::from([(
                "ETHUSDT".to_string(),
                SymbolLimitOverride {
                    max_position: Some(10),
                    max_dollar_exposure: None,
                },
            )]),
        };
        assert_eq!(risk.resolve("BTCUSDT"), (100, Some(5000.0)));
        assert_eq!(risk.resolve("ETHUSDT"), (10, Some(5000.0)));
    }
}

