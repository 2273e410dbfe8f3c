//! Worker stage: scores jobs with the shared comparator.

use super::{Job, PipelineError};
use crate::cancel::CancelToken;
use crate::compare::Comparator;
use crate::metrics::{PipelineMetrics, Queue};
use crate::source::FrameLayout;
use crossbeam_channel::{Receiver, Sender};
use std::sync::Arc;

/// One scored frame pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Scored {
    pub(crate) index: u64,
    pub(crate) score: f64,
}

pub(crate) struct Worker<'a, C: ?Sized> {
    id: usize,
    comparator: &'a C,
    layout: &'a FrameLayout,
    norm: f32,
    jobs: Receiver<Job>,
    results: Sender<Scored>,
    cancel: CancelToken,
    metrics: Option<Arc<PipelineMetrics>>,
}

impl<'a, C: Comparator + ?Sized> Worker<'a, C> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        id: usize,
        comparator: &'a C,
        layout: &'a FrameLayout,
        norm: f32,
        jobs: Receiver<Job>,
        results: Sender<Scored>,
        cancel: CancelToken,
        metrics: Option<Arc<PipelineMetrics>>,
    ) -> Self {
        Self {
            id,
            comparator,
            layout,
            norm,
            jobs,
            results,
            cancel,
            metrics,
        }
    }

    /// Scores jobs until the job queue is closed and empty or the run is
    /// cancelled. Returns the number of jobs this worker scored.
    pub(crate) fn run(self) -> Result<usize, PipelineError> {
        let mut scored = 0usize;
        tracing::debug!(worker = self.id, "Worker started");

        loop {
            if self.cancel.is_cancelled() {
                break;
            }
            let job = match self.jobs.recv() {
                Ok(job) => job,
                Err(_) => break,
            };
            if let Some(metrics) = &self.metrics {
                metrics.set_queue_depth(Queue::Jobs, self.jobs.len());
            }
            // Jobs pulled after an abort are discarded unscored
            if self.cancel.is_cancelled() {
                break;
            }

            if let Some(metrics) = &self.metrics {
                metrics.job_started();
            }
            let result = self.comparator.compute(
                &job.reference,
                &job.distorted,
                self.layout,
                self.norm,
            );
            if let Some(metrics) = &self.metrics {
                metrics.job_finished(result.is_ok());
            }

            let score = result.map_err(|source| PipelineError::Compare {
                frame: job.index,
                source,
            })?;
            tracing::trace!(worker = self.id, frame = job.index, score, "Frame scored");

            if self
                .results
                .send(Scored {
                    index: job.index,
                    score,
                })
                .is_err()
            {
                break;
            }
            scored += 1;
            if let Some(metrics) = &self.metrics {
                metrics.set_queue_depth(Queue::Results, self.results.len());
            }
        }

        tracing::debug!(worker = self.id, scored, "Worker finished");
        Ok(scored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compare::CompareError;
    use crate::source::{FrameBuffer, PixelFormat};
    use crossbeam_channel::bounded;

    struct FirstByte;

    impl Comparator for FirstByte {
        fn compute(
            &self,
            reference: &FrameBuffer,
            _distorted: &FrameBuffer,
            _layout: &FrameLayout,
            _norm: f32,
        ) -> Result<f64, CompareError> {
            Ok(reference.as_bytes()[0] as f64)
        }
    }

    struct Broken;

    impl Comparator for Broken {
        fn compute(
            &self,
            _reference: &FrameBuffer,
            _distorted: &FrameBuffer,
            _layout: &FrameLayout,
            _norm: f32,
        ) -> Result<f64, CompareError> {
            Err(CompareError::Engine("out of memory".into()))
        }
    }

    fn job(index: u64) -> Job {
        Job {
            index,
            reference: FrameBuffer::new(vec![index as u8; 3]),
            distorted: FrameBuffer::new(vec![0u8; 3]),
        }
    }

    fn layout() -> FrameLayout {
        FrameLayout::new(1, 1, PixelFormat::RGB24)
    }

    #[test]
    fn test_scores_until_queue_closed() {
        let (job_tx, job_rx) = bounded(8);
        let (result_tx, result_rx) = bounded(8);
        for index in 0..4 {
            job_tx.send(job(index)).unwrap();
        }
        drop(job_tx);

        let layout = layout();
        let worker = Worker::new(0, &FirstByte, &layout, 3.0, job_rx, result_tx, CancelToken::new(), None);
        assert_eq!(worker.run().unwrap(), 4);

        let total: f64 = result_rx.iter().map(|scored| scored.score).sum();
        assert_eq!(total, 6.0);
    }

    #[test]
    fn test_compare_error_carries_frame_index() {
        let (job_tx, job_rx) = bounded(8);
        let (result_tx, _result_rx) = bounded(8);
        job_tx.send(job(5)).unwrap();
        drop(job_tx);

        let layout = layout();
        let worker = Worker::new(0, &Broken, &layout, 3.0, job_rx, result_tx, CancelToken::new(), None);
        assert!(matches!(
            worker.run(),
            Err(PipelineError::Compare { frame: 5, .. })
        ));
    }

    #[test]
    fn test_cancelled_worker_scores_nothing() {
        let (job_tx, job_rx) = bounded(8);
        let (result_tx, result_rx) = bounded(8);
        job_tx.send(job(0)).unwrap();

        let cancel = CancelToken::new();
        cancel.cancel();
        let layout = layout();
        let worker = Worker::new(0, &FirstByte, &layout, 3.0, job_rx, result_tx, cancel, None);
        assert_eq!(worker.run().unwrap(), 0);
        assert!(result_rx.try_recv().is_err());
    }

    #[test]
    fn test_metrics_track_scored_jobs() {
        let metrics = Arc::new(PipelineMetrics::new().unwrap());
        let (job_tx, job_rx) = bounded(8);
        let (result_tx, _result_rx) = bounded(8);
        for index in 0..3 {
            job_tx.send(job(index)).unwrap();
        }
        drop(job_tx);

        let layout = layout();
        let worker = Worker::new(
            0,
            &FirstByte,
            &layout,
            3.0,
            job_rx,
            result_tx,
            CancelToken::new(),
            Some(Arc::clone(&metrics)),
        );
        worker.run().unwrap();
        assert_eq!(metrics.jobs_scored(), 3);
        assert_eq!(metrics.jobs_in_flight(), 0);
    }
}
