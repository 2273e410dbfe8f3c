//! Run options and their validation.
//!
//! [`RunOptions`] is what the user asked for; it may be incomplete or
//! out of range. [`RunOptions::validate`] turns it into a [`RunConfig`],
//! which is immutable and is the only configuration the pipeline reads.

use super::ConfigError;
use crate::compare::is_valid_norm;
use crate::source::{FrameLayout, PixelFormat, ResolutionProbe, Stream};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default norm exponent.
pub const DEFAULT_PNORM: f32 = 3.0;
/// Default display brightness in nits.
pub const DEFAULT_INTENSITY_TARGET: f32 = 250.0;
/// Default capacity of the job and result queues.
pub const DEFAULT_QUEUE_CAPACITY: usize = 3;
/// Upper bound for the intensity target in nits.
pub const MAX_INTENSITY_TARGET: f32 = 1000.0;

/// Largest accepted decoded frame, in bytes (1 GiB).
pub const MAX_FRAME_LEN: usize = 1 << 30;

/// Returns the default worker count: half the available cores, at least one.
pub fn default_threads() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get() / 2)
        .unwrap_or(1)
        .max(1)
}

/// Unvalidated run options, as given on the command line or in a file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunOptions {
    /// Reference (source) video.
    pub source: Option<PathBuf>,
    /// Distorted video.
    pub distorted: Option<PathBuf>,
    /// Norm exponent used to pool per-pixel differences.
    pub pnorm: f32,
    /// Target display brightness in nits.
    pub intensity_target: f32,
    /// Worker count; `None` picks [`default_threads`].
    pub threads: Option<usize>,
    /// Capacity of the job queue and of the result queue.
    pub queue_capacity: usize,
    /// Decoded pixel layout.
    pub pixel_format: PixelFormat,
    /// Frame width; when set together with `height`, probing is skipped.
    pub width: Option<u32>,
    /// Frame height; when set together with `width`, probing is skipped.
    pub height: Option<u32>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            source: None,
            distorted: None,
            pnorm: DEFAULT_PNORM,
            intensity_target: DEFAULT_INTENSITY_TARGET,
            threads: None,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            pixel_format: PixelFormat::default(),
            width: None,
            height: None,
        }
    }
}

impl RunOptions {
    /// Creates options comparing `source` against `distorted`.
    pub fn new(source: impl Into<PathBuf>, distorted: impl Into<PathBuf>) -> Self {
        Self {
            source: Some(source.into()),
            distorted: Some(distorted.into()),
            ..Default::default()
        }
    }

    /// Validates every option and resolves the frame size.
    ///
    /// Nothing is decoded here; any error means the run never starts.
    pub fn validate(self, probe: &dyn ResolutionProbe) -> Result<RunConfig, ConfigError> {
        let source = existing_path(self.source, Stream::Reference)?;
        let distorted = existing_path(self.distorted, Stream::Distorted)?;

        if !is_valid_norm(self.pnorm) {
            return Err(ConfigError::InvalidNorm(self.pnorm));
        }

        let (width, height) = match (self.width, self.height) {
            (Some(width), Some(height)) => (width, height),
            _ => {
                let reference = probe
                    .resolution(&source)
                    .map_err(|source| ConfigError::Probe {
                        stream: Stream::Reference,
                        source,
                    })?;
                let dist = probe
                    .resolution(&distorted)
                    .map_err(|source| ConfigError::Probe {
                        stream: Stream::Distorted,
                        source,
                    })?;
                if reference != dist {
                    return Err(ConfigError::ResolutionMismatch {
                        reference,
                        distorted: dist,
                    });
                }
                reference
            }
        };
        let frame_len = self.pixel_format.checked_frame_len(width, height);
        if width == 0 || height == 0 || !frame_len.is_some_and(|len| len <= MAX_FRAME_LEN) {
            return Err(ConfigError::InvalidDimensions { width, height });
        }

        if !(self.intensity_target.is_finite()
            && self.intensity_target > 0.0
            && self.intensity_target <= MAX_INTENSITY_TARGET)
        {
            return Err(ConfigError::InvalidIntensity(self.intensity_target));
        }

        let threads = self.threads.unwrap_or_else(default_threads);
        if threads == 0 {
            return Err(ConfigError::InvalidThreads);
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::InvalidQueueCapacity);
        }

        let config = RunConfig {
            source,
            distorted,
            layout: FrameLayout::new(width, height, self.pixel_format),
            pnorm: self.pnorm,
            intensity_target: self.intensity_target,
            threads,
            queue_capacity: self.queue_capacity,
        };
        tracing::debug!(?config, "Run configuration validated");
        Ok(config)
    }
}

fn existing_path(path: Option<PathBuf>, stream: Stream) -> Result<PathBuf, ConfigError> {
    let path = path.ok_or(ConfigError::MissingPath(stream))?;
    if !path.exists() {
        return Err(ConfigError::PathNotFound { stream, path });
    }
    Ok(path)
}

/// Validated, immutable configuration for one run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    source: PathBuf,
    distorted: PathBuf,
    layout: FrameLayout,
    pnorm: f32,
    intensity_target: f32,
    threads: usize,
    queue_capacity: usize,
}

impl RunConfig {
    /// Returns the reference video path.
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Returns the distorted video path.
    pub fn distorted(&self) -> &Path {
        &self.distorted
    }

    /// Returns the frame geometry both streams share.
    pub fn layout(&self) -> &FrameLayout {
        &self.layout
    }

    /// Returns the norm exponent.
    pub fn pnorm(&self) -> f32 {
        self.pnorm
    }

    /// Returns the display intensity target in nits.
    pub fn intensity_target(&self) -> f32 {
        self.intensity_target
    }

    /// Returns the number of comparison workers.
    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Returns the capacity of each bounded queue.
    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SourceError;
    use std::cell::Cell;

    struct FixedProbe {
        reference: (u32, u32),
        distorted: (u32, u32),
        calls: Cell<usize>,
    }

    impl FixedProbe {
        fn new(reference: (u32, u32), distorted: (u32, u32)) -> Self {
            Self {
                reference,
                distorted,
                calls: Cell::new(0),
            }
        }
    }

    impl ResolutionProbe for FixedProbe {
        fn resolution(&self, _path: &Path) -> Result<(u32, u32), SourceError> {
            let call = self.calls.get();
            self.calls.set(call + 1);
            Ok(if call == 0 { self.reference } else { self.distorted })
        }
    }

    fn existing() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("Cargo.toml")
    }

    fn options() -> RunOptions {
        RunOptions::new(existing(), existing())
    }

    #[test]
    fn test_valid_options() {
        let probe = FixedProbe::new((64, 32), (64, 32));
        let config = options().validate(&probe).unwrap();

        assert_eq!(config.layout().width, 64);
        assert_eq!(config.layout().height, 32);
        assert_eq!(config.pnorm(), DEFAULT_PNORM);
        assert_eq!(config.queue_capacity(), DEFAULT_QUEUE_CAPACITY);
        assert!(config.threads() >= 1);
    }

    #[test]
    fn test_missing_source() {
        let probe = FixedProbe::new((1, 1), (1, 1));
        let options = RunOptions {
            source: None,
            ..options()
        };
        assert!(matches!(
            options.validate(&probe),
            Err(ConfigError::MissingPath(Stream::Reference))
        ));
    }

    #[test]
    fn test_nonexistent_distorted() {
        let probe = FixedProbe::new((1, 1), (1, 1));
        let options = RunOptions {
            distorted: Some(PathBuf::from("/no/such/video.mkv")),
            ..options()
        };
        assert!(matches!(
            options.validate(&probe),
            Err(ConfigError::PathNotFound {
                stream: Stream::Distorted,
                ..
            })
        ));
    }

    #[test]
    fn test_pnorm_out_of_range() {
        let probe = FixedProbe::new((1, 1), (1, 1));
        for pnorm in [0.0, -2.0, 100.1, f32::NAN] {
            let options = RunOptions { pnorm, ..options() };
            assert!(matches!(
                options.validate(&probe),
                Err(ConfigError::InvalidNorm(_))
            ));
        }
    }

    #[test]
    fn test_resolution_mismatch() {
        let probe = FixedProbe::new((1920, 1080), (1280, 720));
        assert!(matches!(
            options().validate(&probe),
            Err(ConfigError::ResolutionMismatch {
                reference: (1920, 1080),
                distorted: (1280, 720)
            })
        ));
    }

    #[test]
    fn test_explicit_dimensions_skip_probe() {
        let probe = FixedProbe::new((1, 1), (2, 2));
        let options = RunOptions {
            width: Some(8),
            height: Some(4),
            ..options()
        };
        let config = options.validate(&probe).unwrap();

        assert_eq!(probe.calls.get(), 0);
        assert_eq!(config.layout().frame_len(), 8 * 4 * 6);
    }

    #[test]
    fn test_oversized_frames_rejected() {
        let probe = FixedProbe::new((1, 1), (1, 1));
        let options = RunOptions {
            width: Some(u32::MAX),
            height: Some(u32::MAX),
            ..options()
        };
        assert!(matches!(
            options.validate(&probe),
            Err(ConfigError::InvalidDimensions { .. })
        ));

        // 16384 x 16384 rgb48le is 1.5 GiB
        let probe = FixedProbe::new((16384, 16384), (16384, 16384));
        assert!(matches!(
            self::options().validate(&probe),
            Err(ConfigError::InvalidDimensions {
                width: 16384,
                height: 16384
            })
        ));
    }

    #[test]
    fn test_intensity_out_of_range() {
        let probe = FixedProbe::new((1, 1), (1, 1));
        for intensity_target in [0.0, 1000.5] {
            let options = RunOptions {
                intensity_target,
                ..options()
            };
            assert!(matches!(
                options.validate(&probe),
                Err(ConfigError::InvalidIntensity(_))
            ));
        }
    }

    #[test]
    fn test_zero_threads_and_queue() {
        let probe = FixedProbe::new((1, 1), (1, 1));
        let options_zero_threads = RunOptions {
            threads: Some(0),
            ..options()
        };
        assert!(matches!(
            options_zero_threads.validate(&probe),
            Err(ConfigError::InvalidThreads)
        ));

        let options_zero_queue = RunOptions {
            queue_capacity: 0,
            ..options()
        };
        assert!(matches!(
            options_zero_queue.validate(&FixedProbe::new((1, 1), (1, 1))),
            Err(ConfigError::InvalidQueueCapacity)
        ));
    }

    #[test]
    fn test_default_threads_at_least_one() {
        assert!(default_threads() >= 1);
    }
}
