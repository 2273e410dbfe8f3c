//! Feeder stage: pairs frames from both sources into jobs.

use super::{Job, PipelineError};
use crate::cancel::CancelToken;
use crate::metrics::{PipelineMetrics, Queue};
use crate::source::{FrameSource, Stream};
use crossbeam_channel::Sender;
use std::sync::Arc;

/// How the feeder stopped without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FeedOutcome {
    /// Both sources ended together after this many frame pairs.
    Exhausted(u64),
    /// The run was cancelled or every worker went away.
    Stopped(u64),
}

/// Reads both sources in lockstep and submits one job per frame pair.
///
/// Dropping the feeder closes the job queue.
pub(crate) struct Feeder<R, D> {
    reference: R,
    distorted: D,
    jobs: Sender<Job>,
    cancel: CancelToken,
    metrics: Option<Arc<PipelineMetrics>>,
}

impl<R: FrameSource, D: FrameSource> Feeder<R, D> {
    pub(crate) fn new(
        reference: R,
        distorted: D,
        jobs: Sender<Job>,
        cancel: CancelToken,
        metrics: Option<Arc<PipelineMetrics>>,
    ) -> Self {
        Self {
            reference,
            distorted,
            jobs,
            cancel,
            metrics,
        }
    }

    /// Feeds jobs until both sources end, the run is cancelled, or a
    /// source fails.
    ///
    /// Both sources are read on every step, even when the first read
    /// already failed, so that simultaneous failures are both reported.
    pub(crate) fn run(mut self) -> Result<FeedOutcome, PipelineError> {
        let mut index = 0u64;
        tracing::debug!("Feeder started");

        loop {
            if self.cancel.is_cancelled() {
                tracing::debug!(frames = index, "Feeder stopped by cancellation");
                return Ok(FeedOutcome::Stopped(index));
            }

            let reference = self.reference.next_frame();
            let distorted = self.distorted.next_frame();

            let (reference, distorted) = match (reference, distorted) {
                (Ok(Some(reference)), Ok(Some(distorted))) => (reference, distorted),
                (Ok(None), Ok(None)) => {
                    tracing::debug!(frames = index, "Both streams ended");
                    return Ok(FeedOutcome::Exhausted(index));
                }
                (Ok(None), Ok(Some(_))) => {
                    return Err(PipelineError::Desync {
                        frame: index,
                        ended: Stream::Reference,
                    })
                }
                (Ok(Some(_)), Ok(None)) => {
                    return Err(PipelineError::Desync {
                        frame: index,
                        ended: Stream::Distorted,
                    })
                }
                (Err(reference), Err(distorted)) => {
                    return Err(PipelineError::Sources {
                        frame: index,
                        reference,
                        distorted,
                    })
                }
                (Err(source), Ok(None)) => {
                    return Err(PipelineError::SourceAtEnd {
                        stream: Stream::Reference,
                        frame: index,
                        ended: Stream::Distorted,
                        source,
                    })
                }
                (Ok(None), Err(source)) => {
                    return Err(PipelineError::SourceAtEnd {
                        stream: Stream::Distorted,
                        frame: index,
                        ended: Stream::Reference,
                        source,
                    })
                }
                (Err(source), _) => {
                    return Err(PipelineError::Source {
                        stream: Stream::Reference,
                        frame: index,
                        source,
                    })
                }
                (_, Err(source)) => {
                    return Err(PipelineError::Source {
                        stream: Stream::Distorted,
                        frame: index,
                        source,
                    })
                }
            };

            let job = Job {
                index,
                reference,
                distorted,
            };
            // Blocks while the queue is full
            if self.jobs.send(job).is_err() {
                tracing::debug!(frames = index, "Job queue closed by workers");
                return Ok(FeedOutcome::Stopped(index));
            }
            if let Some(metrics) = &self.metrics {
                metrics.frame_fed();
                metrics.set_queue_depth(Queue::Jobs, self.jobs.len());
            }
            tracing::trace!(frame = index, "Job queued");
            index += 1;
        }
    }
}
