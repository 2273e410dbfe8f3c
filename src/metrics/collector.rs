//! Pipeline counters and gauges.

use crate::pipeline::RunState;
use prometheus::{Encoder, Gauge, IntCounter, IntGauge, IntGaugeVec, Opts, Registry, TextEncoder};
use thiserror::Error;

/// Errors that can occur during metrics operations.
#[derive(Debug, Error)]
pub enum MetricsError {
    /// Registering or encoding a metric failed.
    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),
}

/// Queue label values for [`PipelineMetrics::set_queue_depth`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Queue {
    /// Frame pairs waiting for a worker.
    Jobs,
    /// Scores waiting for the aggregator.
    Results,
}

impl Queue {
    fn label(self) -> &'static str {
        match self {
            Self::Jobs => "jobs",
            Self::Results => "results",
        }
    }
}

/// Prometheus registry for one scoring run.
///
/// All handles are internally reference counted and atomic, so the
/// registry can be shared by every stage through an `Arc`.
pub struct PipelineMetrics {
    registry: Registry,

    // Throughput
    frames_fed: IntCounter,
    jobs_scored: IntCounter,
    jobs_in_flight: IntGauge,
    queue_depth: IntGaugeVec,

    // Lifecycle
    run_state: IntGauge,
    score_total: Gauge,
}

impl PipelineMetrics {
    /// Creates a registry with all pipeline metrics registered.
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let frames_fed = IntCounter::new(
            "vqscore_frames_fed_total",
            "Frame pairs submitted to the job queue",
        )?;
        let jobs_scored = IntCounter::new(
            "vqscore_jobs_scored_total",
            "Frame pairs scored by the comparator",
        )?;
        let jobs_in_flight = IntGauge::new(
            "vqscore_jobs_in_flight",
            "Jobs dequeued by a worker and not yet scored",
        )?;
        let queue_depth = IntGaugeVec::new(
            Opts::new("vqscore_queue_depth", "Items waiting in a bounded queue"),
            &["queue"],
        )?;
        let run_state = IntGauge::new(
            "vqscore_run_state",
            "Orchestrator state (0=idle 1=validating 2=feeding 3=aggregating 4=done 5=aborted)",
        )?;
        let score_total = Gauge::new(
            "vqscore_score_total",
            "Sum of per-frame scores, published once the run is done",
        )?;

        registry.register(Box::new(frames_fed.clone()))?;
        registry.register(Box::new(jobs_scored.clone()))?;
        registry.register(Box::new(jobs_in_flight.clone()))?;
        registry.register(Box::new(queue_depth.clone()))?;
        registry.register(Box::new(run_state.clone()))?;
        registry.register(Box::new(score_total.clone()))?;

        Ok(Self {
            registry,
            frames_fed,
            jobs_scored,
            jobs_in_flight,
            queue_depth,
            run_state,
            score_total,
        })
    }

    /// Records a frame pair entering the job queue.
    pub fn frame_fed(&self) {
        self.frames_fed.inc();
    }

    /// Records a worker taking a job.
    pub fn job_started(&self) {
        self.jobs_in_flight.inc();
    }

    /// Records a worker finishing a job, successfully or not.
    pub fn job_finished(&self, scored: bool) {
        self.jobs_in_flight.dec();
        if scored {
            self.jobs_scored.inc();
        }
    }

    /// Records how many items wait in `queue`.
    pub fn set_queue_depth(&self, queue: Queue, depth: usize) {
        self.queue_depth
            .with_label_values(&[queue.label()])
            .set(depth as i64);
    }

    /// Records the orchestrator's current state.
    pub fn set_state(&self, state: RunState) {
        self.run_state.set(state.code());
    }

    /// Publishes the final score.
    pub fn publish_score(&self, total: f64) {
        self.score_total.set(total);
    }

    /// Returns the number of frame pairs fed so far.
    pub fn frames_fed(&self) -> u64 {
        self.frames_fed.get()
    }

    /// Returns the number of frame pairs scored so far.
    pub fn jobs_scored(&self) -> u64 {
        self.jobs_scored.get()
    }

    /// Returns the number of jobs currently held by workers.
    pub fn jobs_in_flight(&self) -> i64 {
        self.jobs_in_flight.get()
    }

    /// Returns the underlying Prometheus registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Encodes all metrics in Prometheus text format.
    pub fn encode(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

impl std::fmt::Debug for PipelineMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineMetrics")
            .field("frames_fed", &self.frames_fed.get())
            .field("jobs_scored", &self.jobs_scored.get())
            .field("jobs_in_flight", &self.jobs_in_flight.get())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_creation() {
        let metrics = PipelineMetrics::new();
        assert!(metrics.is_ok());
    }

    #[test]
    fn test_job_accounting() {
        let metrics = PipelineMetrics::new().unwrap();

        metrics.frame_fed();
        metrics.frame_fed();
        metrics.job_started();
        metrics.job_started();
        metrics.job_finished(true);
        assert_eq!(metrics.jobs_in_flight(), 1);

        metrics.job_finished(false);
        assert_eq!(metrics.frames_fed(), 2);
        assert_eq!(metrics.jobs_scored(), 1);
        assert_eq!(metrics.jobs_in_flight(), 0);
    }

    #[test]
    fn test_metrics_encode() {
        let metrics = PipelineMetrics::new().unwrap();
        metrics.set_queue_depth(Queue::Jobs, 2);
        metrics.set_state(RunState::Done);
        metrics.publish_score(12.5);

        let output = metrics.encode().unwrap();
        assert!(output.contains("vqscore_frames_fed_total 0"));
        assert!(output.contains("vqscore_queue_depth{queue=\"jobs\"} 2"));
        assert!(output.contains("vqscore_run_state 4"));
        assert!(output.contains("vqscore_score_total 12.5"));
    }
}
