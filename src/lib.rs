//! Full-reference video quality scoring.
//!
//! Compares a distorted video against its reference frame by frame and
//! reports the sum of per-frame perceptual distances.
//!
//! # Architecture
//!
//! ```text
//! config → source (ffmpeg decoders) → pipeline (feeder → workers → aggregator)
//!                                          ↓
//!                                 compare (per-frame distance)
//! ```
//!
//! Frames are decoded by external `ffmpeg` processes into raw buffers,
//! paired in presentation order, and scored in parallel by a fixed pool
//! of workers. Queues between stages are bounded, so memory use does not
//! grow with video length.
//!
//! # Design Principles
//!
//! - **Fail-fast**: the first decode, desync or comparison error aborts
//!   the whole run and no partial score is reported
//! - **Order-independent**: per-frame scores are summed in completion
//!   order
//! - **Cancellable**: a [`CancelToken`] stops every stage and kills the
//!   decoders
//!
//! # Example
//!
//! ```no_run
//! use vqscore::{score_files, CancelToken, FfprobeProbe, RunOptions};
//!
//! let options = RunOptions::new("reference.mp4", "distorted.mp4");
//! let summary = score_files(options, &FfprobeProbe::default(), CancelToken::new(), None)?;
//! println!("{}", summary.total);
//! # Ok::<(), vqscore::PipelineError>(())
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod cancel;
pub mod compare;
pub mod config;
pub mod metrics;
pub mod pipeline;
pub mod source;

// Re-export commonly used types at crate root
pub use cancel::CancelToken;
pub use compare::{Comparator, CompareError, PnormComparator};
pub use config::{ConfigError, FileConfig, RunConfig, RunOptions};
pub use metrics::PipelineMetrics;
pub use pipeline::{score_files, Orchestrator, PipelineError, RunState, Summary};
pub use source::{FfmpegSource, FfprobeProbe, FrameBuffer, FrameLayout, FrameSource, PixelFormat};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
