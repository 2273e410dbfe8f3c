//! Decoded video input.
//!
//! This module provides the frame source abstraction the pipeline pulls
//! from, the pixel-format descriptor shared by both streams, and the
//! ffmpeg/ffprobe-backed implementations used by the command line tool.

mod ffmpeg;
mod format;
mod frame;
mod probe;
mod stream;

pub use ffmpeg::FfmpegSource;
pub use format::{ChannelLayout, Endianness, PixelFormat, SampleType};
pub use frame::{FrameBuffer, FrameLayout};
pub use probe::{parse_resolution, FfprobeProbe, ResolutionProbe};
pub use stream::{read_frame, FrameSource, MockSource, SourceError, Stream};
