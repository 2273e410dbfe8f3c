//! Run configuration.
//!
//! Options come from defaults, an optional TOML file and the command
//! line, in increasing priority. They are validated once, before any
//! frame is decoded, into an immutable [`RunConfig`].

mod file;
mod run;

pub use file::{FileConfig, LoggingConfig, MetricsConfig};
pub use run::{
    default_threads, RunConfig, RunOptions, DEFAULT_INTENSITY_TARGET, DEFAULT_PNORM,
    DEFAULT_QUEUE_CAPACITY, MAX_FRAME_LEN, MAX_INTENSITY_TARGET,
};

use crate::source::{SourceError, Stream};
use std::path::PathBuf;

/// Configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// No path was given for this stream.
    #[error("no {0} video given")]
    MissingPath(Stream),
    /// The given path does not exist.
    #[error("{stream} video does not exist: {}", path.display())]
    PathNotFound {
        /// Stream the path was given for.
        stream: Stream,
        /// The missing path.
        path: PathBuf,
    },
    /// The norm exponent is outside (0, 100].
    #[error("invalid pnorm value {0} (must be in (0, 100])")]
    InvalidNorm(f32),
    /// The intensity target is outside (0, 1000].
    #[error("invalid intensity target {0} (must be in (0, 1000] nits)")]
    InvalidIntensity(f32),
    /// The two videos have different resolutions.
    #[error(
        "source and distorted resolution must match: {}x{} vs {}x{}",
        reference.0, reference.1, distorted.0, distorted.1
    )]
    ResolutionMismatch {
        /// Reference width and height.
        reference: (u32, u32),
        /// Distorted width and height.
        distorted: (u32, u32),
    },
    /// A dimension is zero or the frame would be too large.
    #[error("invalid frame dimensions {width}x{height}")]
    InvalidDimensions {
        /// Frame width.
        width: u32,
        /// Frame height.
        height: u32,
    },
    /// Zero workers were requested.
    #[error("worker count must be at least 1")]
    InvalidThreads,
    /// A zero queue capacity was requested.
    #[error("queue capacity must be at least 1")]
    InvalidQueueCapacity,
    /// Probing a video for its resolution failed.
    #[error("failed to probe {stream} video: {source}")]
    Probe {
        /// Stream that was probed.
        stream: Stream,
        /// Underlying probe failure.
        #[source]
        source: SourceError,
    },
    /// The config file could not be read.
    #[error("failed to read config file: {0}")]
    FileRead(String),
    /// The config file is not valid TOML for [`FileConfig`].
    #[error("failed to parse config file: {0}")]
    Parse(String),
}
