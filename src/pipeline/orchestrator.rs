//! Wires the feeder, workers and aggregator together for one run.

use super::aggregator::Aggregator;
use super::error::FirstFailure;
use super::feeder::{FeedOutcome, Feeder};
use super::worker::Worker;
use super::{PipelineError, RunState, Summary};
use crate::cancel::CancelToken;
use crate::compare::Comparator;
use crate::config::{RunConfig, RunOptions};
use crate::metrics::PipelineMetrics;
use crate::source::{FrameSource, ResolutionProbe, Stream};
use crossbeam_channel::bounded;
use std::sync::Arc;
use std::thread;

/// Drives one scoring run through its lifecycle.
///
/// An orchestrator is single-use: after `Done` or `Aborted` every further
/// call fails with [`PipelineError::InvalidTransition`].
pub struct Orchestrator {
    state: RunState,
    cancel: CancelToken,
    metrics: Option<Arc<PipelineMetrics>>,
}

impl Orchestrator {
    /// Creates an idle orchestrator stopped by `cancel`.
    pub fn new(cancel: CancelToken) -> Self {
        Self {
            state: RunState::Idle,
            cancel,
            metrics: None,
        }
    }

    /// Reports progress and the final score to `metrics`.
    pub fn with_metrics(mut self, metrics: Arc<PipelineMetrics>) -> Self {
        metrics.set_state(self.state);
        self.metrics = Some(metrics);
        self
    }

    /// Returns the current lifecycle state.
    pub fn state(&self) -> RunState {
        self.state
    }

    /// Returns the token that stops this run.
    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Validates `options`, probing the inputs for their resolution when
    /// no explicit size was given.
    pub fn validate(
        &mut self,
        options: RunOptions,
        probe: &dyn ResolutionProbe,
    ) -> Result<RunConfig, PipelineError> {
        self.transition(RunState::Validating)?;
        options.validate(probe).map_err(|error| {
            self.abort();
            PipelineError::from(error)
        })
    }

    /// Scores every frame pair of `reference` against `distorted`.
    ///
    /// Returns the raw sum of per-frame scores. Any source, decode or
    /// comparison failure aborts the whole run; no partial score is
    /// ever returned.
    pub fn run<R, D, C>(
        &mut self,
        config: &RunConfig,
        reference: R,
        distorted: D,
        comparator: &C,
    ) -> Result<Summary, PipelineError>
    where
        R: FrameSource + Send,
        D: FrameSource + Send,
        C: Comparator + ?Sized,
    {
        self.transition(RunState::FeedingAndWorking)?;

        let expected = config.layout().frame_len();
        for (stream, got) in [
            (Stream::Reference, reference.frame_len()),
            (Stream::Distorted, distorted.frame_len()),
        ] {
            if got != expected {
                self.abort();
                return Err(PipelineError::Layout {
                    stream,
                    expected,
                    got,
                });
            }
        }

        tracing::info!(
            threads = config.threads(),
            queue_capacity = config.queue_capacity(),
            layout = ?config.layout(),
            "Starting scoring pipeline"
        );

        let failure = FirstFailure::new(self.cancel.clone());
        let (job_tx, job_rx) = bounded(config.queue_capacity());
        let (result_tx, result_rx) = bounded(config.queue_capacity());
        let cancel = self.cancel.clone();
        let metrics = self.metrics.clone();
        let layout = config.layout();
        let norm = config.pnorm();
        let failure_ref = &failure;

        let (outcome, summary) = thread::scope(|scope| {
            let feeder = Feeder::new(reference, distorted, job_tx, cancel.clone(), metrics.clone());
            let feeder = scope.spawn(move || match feeder.run() {
                Ok(outcome) => Some(outcome),
                Err(error) => {
                    failure_ref.record(error);
                    None
                }
            });

            let workers: Vec<_> = (0..config.threads())
                .map(|id| {
                    let worker = Worker::new(
                        id,
                        comparator,
                        layout,
                        norm,
                        job_rx.clone(),
                        result_tx.clone(),
                        cancel.clone(),
                        metrics.clone(),
                    );
                    scope.spawn(move || {
                        if let Err(error) = worker.run() {
                            failure_ref.record(error);
                        }
                    })
                })
                .collect();
            // Only the stages may hold queue ends, or the queues never close
            drop(job_rx);
            drop(result_tx);

            let aggregator_metrics = metrics.clone();
            let aggregator = scope
                .spawn(move || Aggregator::new().drain(result_rx, aggregator_metrics.as_ref()));

            let outcome = match feeder.join() {
                Ok(outcome) => outcome,
                Err(_) => {
                    failure_ref.record(PipelineError::StagePanicked("feeder"));
                    None
                }
            };
            for worker in workers {
                if worker.join().is_err() {
                    failure_ref.record(PipelineError::StagePanicked("worker"));
                }
            }
            if !cancel.is_cancelled() {
                // The transition cannot fail from FeedingAndWorking
                let _ = self.transition(RunState::Aggregating);
            }
            let summary = match aggregator.join() {
                Ok(summary) => Some(summary),
                Err(_) => {
                    failure_ref.record(PipelineError::StagePanicked("aggregator"));
                    None
                }
            };
            (outcome, summary)
        });

        if let Some(error) = failure.into_inner() {
            self.abort();
            return Err(error);
        }
        let summary = match (outcome, summary) {
            (Some(FeedOutcome::Exhausted(frames)), Some(summary)) if !self.cancel.is_cancelled() => {
                if summary.frames != frames {
                    tracing::warn!(
                        fed = frames,
                        scored = summary.frames,
                        "Scored frame count differs from fed count"
                    );
                }
                summary
            }
            _ => {
                self.abort();
                return Err(PipelineError::Cancelled);
            }
        };

        self.transition(RunState::Done)?;
        if let Some(metrics) = &self.metrics {
            metrics.publish_score(summary.total);
        }
        tracing::info!(
            frames = summary.frames,
            total = summary.total,
            "Scoring run complete"
        );
        Ok(summary)
    }

    fn transition(&mut self, next: RunState) -> Result<(), PipelineError> {
        if !self.state.can_transition(next) {
            return Err(PipelineError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        tracing::debug!(from = %self.state, to = %next, "Run state changed");
        self.state = next;
        if let Some(metrics) = &self.metrics {
            metrics.set_state(next);
        }
        Ok(())
    }

    /// Cancels the run and moves to `Aborted` unless already terminal.
    pub(crate) fn abort(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        self.cancel.cancel();
        // Cannot fail from a non-terminal state
        let _ = self.transition(RunState::Aborted);
    }
}
