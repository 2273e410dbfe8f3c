//! Parallel scoring pipeline.
//!
//! A run is three stages connected by two bounded queues:
//!
//! ```text
//! reference ─┐                  ┌─ worker ─┐
//!            ├─ feeder ─ jobs ─┼─ worker ─┼─ results ─ aggregator ─ total
//! distorted ─┘                  └─ worker ─┘
//! ```
//!
//! The feeder reads one frame from each video per step and blocks when
//! the job queue is full, so memory stays bounded no matter how long the
//! videos are. Workers score pairs in any order. The aggregator sums the
//! scores. The first fatal error cancels every stage and is the error the
//! run reports.

mod aggregator;
mod error;
mod feeder;
mod orchestrator;
mod state;
mod worker;

pub use error::PipelineError;
pub use orchestrator::Orchestrator;
pub use state::RunState;

use crate::cancel::CancelToken;
use crate::compare::PnormComparator;
use crate::config::RunOptions;
use crate::metrics::PipelineMetrics;
use crate::source::{FfmpegSource, FrameBuffer, ResolutionProbe, Stream};
use std::sync::Arc;

/// One unit of work: the `index`-th frame of both videos.
///
/// The index is diagnostic only; scores are summed without regard to it.
#[derive(Debug)]
pub struct Job {
    /// Zero-based frame position in both videos.
    pub index: u64,
    /// Frame from the reference video.
    pub reference: FrameBuffer,
    /// Frame from the distorted video.
    pub distorted: FrameBuffer,
}

/// Result of a successful run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Summary {
    /// Sum of every per-frame score.
    ///
    /// Deliberately not normalized by the frame count: this raw sum is the
    /// value the command line tool has always reported, so longer videos
    /// score higher for the same per-frame quality. Use [`Summary::mean`]
    /// for a length-independent value.
    pub total: f64,
    /// Number of frame pairs scored.
    pub frames: u64,
}

impl Summary {
    /// Average per-frame score, or `None` for empty videos.
    pub fn mean(&self) -> Option<f64> {
        if self.frames == 0 {
            None
        } else {
            Some(self.total / self.frames as f64)
        }
    }
}

/// Scores the distorted video against the reference video end to end.
///
/// Validates `options`, spawns one decoder per video and runs the
/// pipeline with the p-norm comparator. Decoders are killed when
/// `cancel` fires.
pub fn score_files(
    options: RunOptions,
    probe: &dyn ResolutionProbe,
    cancel: CancelToken,
    metrics: Option<Arc<PipelineMetrics>>,
) -> Result<Summary, PipelineError> {
    let mut orchestrator = Orchestrator::new(cancel.clone());
    if let Some(metrics) = metrics {
        orchestrator = orchestrator.with_metrics(metrics);
    }

    let config = orchestrator.validate(options, probe)?;
    let comparator = PnormComparator::new(config.intensity_target());

    let reference = FfmpegSource::open(config.source(), config.layout(), &cancel).map_err(|source| {
        orchestrator.abort();
        PipelineError::Open {
            stream: Stream::Reference,
            source,
        }
    })?;
    let distorted = FfmpegSource::open(config.distorted(), config.layout(), &cancel).map_err(|source| {
        orchestrator.abort();
        PipelineError::Open {
            stream: Stream::Distorted,
            source,
        }
    })?;

    orchestrator.run(&config, reference, distorted, &comparator)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{PixelFormat, SourceError};
    use std::path::{Path, PathBuf};

    struct FixedProbe;

    impl ResolutionProbe for FixedProbe {
        fn resolution(&self, _path: &Path) -> Result<(u32, u32), SourceError> {
            Ok((4, 4))
        }
    }

    #[test]
    fn test_mean() {
        let summary = Summary {
            total: 9.0,
            frames: 3,
        };
        assert_eq!(summary.mean(), Some(3.0));
    }

    #[test]
    fn test_missing_input_fails_before_decoding() {
        let options = RunOptions::new("/nonexistent/ref.mp4", "/nonexistent/dist.mp4");
        let result = score_files(options, &FixedProbe, CancelToken::new(), None);
        assert!(matches!(result, Err(PipelineError::Config(_))));
    }

    #[test]
    fn test_open_failure_aborts_run() {
        let existing = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("Cargo.toml");
        let mut options = RunOptions::new(existing.clone(), existing);
        // Row-aligned layouts have no ffmpeg pixel format
        options.pixel_format = PixelFormat {
            align: 64,
            ..PixelFormat::default()
        };
        let cancel = CancelToken::new();
        let metrics = Arc::new(PipelineMetrics::new().unwrap());

        let result = score_files(options, &FixedProbe, cancel.clone(), Some(Arc::clone(&metrics)));
        assert!(matches!(
            result,
            Err(PipelineError::Open {
                stream: Stream::Reference,
                source: SourceError::UnsupportedFormat(_)
            })
        ));
        assert!(cancel.is_cancelled());
        let code = RunState::Aborted.code();
        assert!(metrics
            .encode()
            .unwrap()
            .contains(&format!("vqscore_run_state {}\n", code)));
    }

    #[test]
    fn test_invalid_norm_fails_before_decoding() {
        let existing = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("Cargo.toml");
        let mut options = RunOptions::new(existing.clone(), existing);
        options.pnorm = -1.0;
        let result = score_files(options, &FixedProbe, CancelToken::new(), None);
        assert!(matches!(result, Err(PipelineError::Config(_))));
    }
}
