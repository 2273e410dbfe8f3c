//! Fatal pipeline errors.

use super::RunState;
use crate::cancel::CancelToken;
use crate::compare::CompareError;
use crate::config::ConfigError;
use crate::source::{SourceError, Stream};
use std::sync::Mutex;
use thiserror::Error;

/// Every way a run can end without a score.
///
/// Frame indices are zero-based positions in presentation order.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Options failed validation; nothing was decoded.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// A decoder could not be started.
    #[error("failed to open {stream} video: {source}")]
    Open {
        /// Stream whose decoder failed.
        stream: Stream,
        /// Underlying source failure.
        #[source]
        source: SourceError,
    },

    /// One video failed while the other delivered a frame.
    #[error("feeder: {stream} video failed at frame {frame}: {source}")]
    Source {
        /// Stream that failed.
        stream: Stream,
        /// Frame being read.
        frame: u64,
        /// Underlying source failure.
        #[source]
        source: SourceError,
    },

    /// Both videos failed on the same frame.
    #[error("feeder: both videos failed at frame {frame}: reference: {reference}; distorted: {distorted}")]
    Sources {
        /// Frame being read.
        frame: u64,
        /// Reference failure.
        reference: SourceError,
        /// Distorted failure.
        distorted: SourceError,
    },

    /// One video failed on the frame where the other ended.
    #[error("feeder: {stream} video failed at frame {frame} where the {ended} video ended: {source}")]
    SourceAtEnd {
        /// Stream that failed.
        stream: Stream,
        /// Frame being read.
        frame: u64,
        /// Stream that ended.
        ended: Stream,
        /// Underlying source failure.
        #[source]
        source: SourceError,
    },

    /// The videos have different frame counts.
    #[error("feeder: {ended} video ended after {frame} frames but the other video continues")]
    Desync {
        /// Complete frame pairs read before the end.
        frame: u64,
        /// Stream that ended first.
        ended: Stream,
    },

    /// The comparator rejected a frame pair.
    #[error("worker: comparison of frame {frame} failed: {source}")]
    Compare {
        /// Frame of the failing pair.
        frame: u64,
        /// Underlying comparator failure.
        #[source]
        source: CompareError,
    },

    /// A source's frame length disagrees with the validated layout.
    #[error("{stream} video produces {got}-byte frames, expected {expected}")]
    Layout {
        /// Offending stream.
        stream: Stream,
        /// Length the layout requires.
        expected: usize,
        /// Length the source produces.
        got: usize,
    },

    /// The run was cancelled from outside.
    #[error("run cancelled")]
    Cancelled,

    /// A stage thread panicked.
    #[error("{0} stage panicked")]
    StagePanicked(&'static str),

    /// The orchestrator was used out of order or reused.
    #[error("cannot move from {from} to {to}")]
    InvalidTransition {
        /// State at the time of the call.
        from: RunState,
        /// State the call required.
        to: RunState,
    },
}

/// Keeps the first fatal error of a run and cancels everything else.
///
/// Errors arriving after cancellation are consequences of the abort
/// (closed pipes, killed decoders) and are dropped.
pub(crate) struct FirstFailure {
    slot: Mutex<Option<PipelineError>>,
    cancel: CancelToken,
}

impl FirstFailure {
    pub(crate) fn new(cancel: CancelToken) -> Self {
        Self {
            slot: Mutex::new(None),
            cancel,
        }
    }

    /// Records `error` if it is the first one, then cancels the run.
    pub(crate) fn record(&self, error: PipelineError) {
        let mut slot = match self.slot.lock() {
            Ok(slot) => slot,
            Err(poisoned) => poisoned.into_inner(),
        };
        if slot.is_some() || self.cancel.is_cancelled() {
            tracing::debug!(error = %error, "Suppressed error after abort");
            return;
        }
        tracing::error!(error = %error, "Fatal pipeline error, aborting run");
        *slot = Some(error);
        drop(slot);
        self.cancel.cancel();
    }

    pub(crate) fn into_inner(self) -> Option<PipelineError> {
        match self.slot.into_inner() {
            Ok(error) => error,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_error_wins() {
        let cancel = CancelToken::new();
        let failure = FirstFailure::new(cancel.clone());

        failure.record(PipelineError::Desync {
            frame: 3,
            ended: Stream::Distorted,
        });
        failure.record(PipelineError::StagePanicked("worker"));

        assert!(cancel.is_cancelled());
        assert!(matches!(
            failure.into_inner(),
            Some(PipelineError::Desync { frame: 3, .. })
        ));
    }

    #[test]
    fn test_errors_after_external_cancel_are_dropped() {
        let cancel = CancelToken::new();
        let failure = FirstFailure::new(cancel.clone());

        cancel.cancel();
        failure.record(PipelineError::StagePanicked("feeder"));
        assert!(failure.into_inner().is_none());
    }

    #[test]
    fn test_both_source_errors_reported() {
        let error = PipelineError::Sources {
            frame: 7,
            reference: SourceError::ShortRead {
                expected: 6,
                got: 2,
            },
            distorted: SourceError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "pipe closed",
            )),
        };
        let message = error.to_string();
        assert!(message.contains("short read"));
        assert!(message.contains("pipe closed"));
        assert!(message.contains("frame 7"));
    }

    #[test]
    fn test_failure_at_other_stream_end_names_both() {
        let error = PipelineError::SourceAtEnd {
            stream: Stream::Reference,
            frame: 2,
            ended: Stream::Distorted,
            source: SourceError::ShortRead {
                expected: 8,
                got: 4,
            },
        };
        let message = error.to_string();
        assert!(message.contains("reference video failed at frame 2"));
        assert!(message.contains("distorted video ended"));
        assert!(message.contains("short read"));
    }
}
