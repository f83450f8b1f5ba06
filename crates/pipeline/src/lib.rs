//! # qx-pipeline
//!
//! The concurrent order-processing pipeline: wiring, worker threads, and
//! lifecycle.
//!
//! Control flow: quote → [`QuoteFeed`](coordinator::QuoteFeed) → market-data
//! stage (book update + conditional-order fan-out) → triggered orders →
//! dispatch stage (risk gate → execution gateway). Each stage runs on its
//! own dedicated thread in a tight non-blocking poll loop; the stages are
//! connected by bounded SPSC rings and observe a shared stop token between
//! poll attempts, never mid-item.

pub mod coordinator;
pub mod gateway;
pub mod metrics;
pub mod stages;

pub use coordinator::{BuildError, Pipeline, PipelineBuilder, PipelineReport, QuoteFeed};
pub use gateway::{ExecutionGateway, LogGateway, NullSink, StatusEvent, StatusSink};
pub use metrics::{MetricsSnapshot, PipelineMetrics};
pub use stages::StopToken;
