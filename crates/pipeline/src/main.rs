//! QX pipeline demo binary.
//!
//! Loads configuration, registers a small set of conditional orders per
//! configured symbol, replays a deterministic sawtooth quote stream through
//! the full pipeline, and prints the final metrics and positions as JSON.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use qx_core::config::PipelineConfig;
use qx_core::types::{OrderId, Price, Qty, Quote, Side, Symbol, Timestamp};
use qx_pipeline::{LogGateway, NullSink, Pipeline};
use qx_trigger::ConditionalOrder;

/// QX order-processing pipeline
#[derive(Parser, Debug)]
#[command(name = "qx-pipeline", about = "QX order-processing pipeline demo")]
struct Args {
    /// Path to TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of synthetic quotes to replay.
    #[arg(long, default_value_t = 2_000)]
    quotes: u64,

    /// Emit JSON logs instead of pretty logs.
    #[arg(long)]
    json_logs: bool,
}

/// Sawtooth around 100 units: bid walks -20..+19 units and wraps.
fn sawtooth_bid(i: u64) -> Price {
    let delta = (i % 40) as i64 - 20;
    Price::from_units(100 + delta)
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = PipelineConfig::load(args.config)?;

    qx_core::logging::init_tracing(args.json_logs);
    tracing::info!(
        symbols = ?config.market_data.symbols,
        quotes = args.quotes,
        "starting qx-pipeline"
    );

    let symbols: Vec<Symbol> = config
        .market_data
        .symbols
        .iter()
        .map(|s| Symbol::new(s.as_str()))
        .collect();

    let mut builder = Pipeline::builder(config)?;

    // A spread of order types per symbol so the replay exercises every
    // trigger path: the sawtooth crosses all three conditions.
    let mut next_id = 1u64;
    for symbol in &symbols {
        builder.register(ConditionalOrder::stop(
            OrderId(next_id),
            symbol.clone(),
            Side::Sell,
            Qty(10),
            Price::from_units(95),
            Timestamp(0),
        ))?;
        builder.register(ConditionalOrder::limit(
            OrderId(next_id + 1),
            symbol.clone(),
            Side::Buy,
            Qty(5),
            Price::from_units(97),
            Timestamp(0),
        ))?;
        builder.register(ConditionalOrder::stop_limit(
            OrderId(next_id + 2),
            symbol.clone(),
            Side::Buy,
            Qty(3),
            Price::from_units(105),
            Price::from_units(102),
            Timestamp(0),
        ))?;
        next_id += 3;
    }

    let (pipeline, mut feed) = builder.start(Box::new(LogGateway), Arc::new(NullSink))?;

    for i in 0..args.quotes {
        for symbol in &symbols {
            let bid = sawtooth_bid(i);
            let quote = Quote {
                symbol: symbol.clone(),
                bid,
                ask: bid + Price::from_ticks(1),
                bid_size: Qty(100),
                ask_size: Qty(100),
                timestamp: Timestamp(i + 1),
            };
            feed.on_quote(quote);
        }
    }

    let report = pipeline.shutdown();
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
