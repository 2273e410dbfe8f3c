//! Prometheus metrics for scoring runs.
//!
//! # Metrics Exposed
//!
//! - `vqscore_frames_fed_total` - Frame pairs submitted to the job queue
//! - `vqscore_jobs_scored_total` - Frame pairs scored by the comparator
//! - `vqscore_jobs_in_flight` - Jobs held by workers and not yet scored
//! - `vqscore_queue_depth{queue}` - Items waiting in the job/result queue
//! - `vqscore_run_state` - Current orchestrator state
//! - `vqscore_score_total` - Final summed score (set once, on success)
//!
//! With the `metrics` feature the registry can be served over HTTP
//! while a run is in progress.

mod collector;
#[cfg(feature = "metrics")]
mod server;

pub use collector::{MetricsError, PipelineMetrics, Queue};
#[cfg(feature = "metrics")]
pub use server::{MetricsServer, MetricsServerConfig, ServerError};
