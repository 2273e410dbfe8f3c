//! Aggregator stage: sums per-frame scores.

use super::worker::Scored;
use super::Summary;
use crate::metrics::{PipelineMetrics, Queue};
use crossbeam_channel::Receiver;
use std::sync::Arc;

/// Running sum of per-frame scores.
///
/// Scores arrive in completion order, not frame order. The sum is
/// order-independent up to floating-point rounding.
#[derive(Debug, Default)]
pub(crate) struct Aggregator {
    total: f64,
    frames: u64,
}

impl Aggregator {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add(&mut self, score: f64) {
        self.total += score;
        self.frames += 1;
    }

    /// Consumes results until every worker has dropped its sender.
    ///
    /// Always drains the queue, even after an abort, so that no worker
    /// stays blocked on a full result queue.
    pub(crate) fn drain(
        mut self,
        results: Receiver<Scored>,
        metrics: Option<&Arc<PipelineMetrics>>,
    ) -> Summary {
        for scored in results.iter() {
            tracing::trace!(frame = scored.index, score = scored.score, "Score aggregated");
            self.add(scored.score);
            if let Some(metrics) = metrics {
                metrics.set_queue_depth(Queue::Results, results.len());
            }
        }
        self.finish()
    }

    pub(crate) fn finish(self) -> Summary {
        Summary {
            total: self.total,
            frames: self.frames,
        }
    }
}
