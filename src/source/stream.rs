//! Frame source abstraction.
//!
//! A source yields a finite, non-restartable sequence of equally sized
//! frame buffers. End of stream is an explicit `Ok(None)`; a partially
//! delivered frame is always an error.

use super::FrameBuffer;
use std::collections::VecDeque;
use std::io::{self, Read};
use std::path::PathBuf;
use thiserror::Error;

/// Which side of the comparison a stream belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    /// The unaltered source video.
    Reference,
    /// The video being scored.
    Distorted,
}

impl std::fmt::Display for Stream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Reference => f.write_str("reference"),
            Self::Distorted => f.write_str("distorted"),
        }
    }
}

/// Errors that can occur while opening or reading a frame source.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The video file does not exist.
    #[error("video file not found: {0}")]
    NotFound(PathBuf),
    /// The decoder or probe process could not be started.
    #[error("failed to start {program}: {source}")]
    Spawn {
        /// Program that failed to start.
        program: String,
        /// Underlying spawn failure.
        #[source]
        source: io::Error,
    },
    /// Reading the decoder output failed.
    #[error("read failed: {0}")]
    Io(#[from] io::Error),
    /// The stream ended inside a frame.
    #[error("short read: expected {expected} bytes, got {got}")]
    ShortRead {
        /// Frame length in bytes.
        expected: usize,
        /// Bytes received before the stream ended.
        got: usize,
    },
    /// The decoder exited unsuccessfully.
    #[error("decoder exited with {status}: {stderr}")]
    DecoderExited {
        /// Exit status as reported by the OS.
        status: String,
        /// Tail of the decoder's stderr.
        stderr: String,
    },
    /// The pixel format has no decoder equivalent.
    #[error("pixel format {0} cannot be decoded")]
    UnsupportedFormat(super::PixelFormat),
    /// The probe output could not be understood.
    #[error("probe failed: {0}")]
    Probe(String),
}

/// Trait for frame source implementations.
///
/// Implementations must deliver frames in presentation order and every
/// buffer must be exactly [`FrameSource::frame_len`] bytes long.
pub trait FrameSource {
    /// Returns the length every frame buffer of this source has.
    fn frame_len(&self) -> usize;

    /// Returns the next frame, or `None` once the stream has ended.
    fn next_frame(&mut self) -> Result<Option<FrameBuffer>, SourceError>;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn frame_len(&self) -> usize {
        (**self).frame_len()
    }

    fn next_frame(&mut self) -> Result<Option<FrameBuffer>, SourceError> {
        (**self).next_frame()
    }
}

/// Reads exactly one frame of `frame_len` bytes.
///
/// Returns `Ok(None)` only when the reader is at end of stream before
/// the first byte of the frame. Running out of data mid-frame is a
/// [`SourceError::ShortRead`].
pub fn read_frame<R: Read + ?Sized>(
    reader: &mut R,
    frame_len: usize,
) -> Result<Option<FrameBuffer>, SourceError> {
    let mut buf = vec![0u8; frame_len];
    let mut filled = 0;

    while filled < frame_len {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(SourceError::Io(e)),
        }
    }

    match filled {
        0 if frame_len > 0 => Ok(None),
        n if n == frame_len => Ok(Some(FrameBuffer::new(buf))),
        got => Err(SourceError::ShortRead {
            expected: frame_len,
            got,
        }),
    }
}

/// In-memory source for testing that replays a fixed list of frames.
#[derive(Debug)]
pub struct MockSource {
    frame_len: usize,
    frames: VecDeque<FrameBuffer>,
    fail_at: Option<usize>,
    served: usize,
}

impl MockSource {
    /// Creates an empty source for frames of `frame_len` bytes.
    pub fn new(frame_len: usize) -> Self {
        Self {
            frame_len,
            frames: VecDeque::new(),
            fail_at: None,
            served: 0,
        }
    }

    /// Creates a source of `count` frames, each filled with `value`.
    pub fn uniform(count: usize, frame_len: usize, value: u8) -> Self {
        let mut source = Self::new(frame_len);
        for _ in 0..count {
            source.push(FrameBuffer::new(vec![value; frame_len]));
        }
        source
    }

    /// Creates a source of `count` frames where frame `i` is filled with
    /// the byte `i % 256`.
    pub fn indexed(count: usize, frame_len: usize) -> Self {
        let mut source = Self::new(frame_len);
        for i in 0..count {
            source.push(FrameBuffer::new(vec![(i % 256) as u8; frame_len]));
        }
        source
    }

    /// Appends a frame.
    pub fn push(&mut self, frame: FrameBuffer) {
        self.frames.push_back(frame);
    }

    /// Makes the read of frame `index` fail with a short read.
    pub fn fail_at(mut self, index: usize) -> Self {
        self.fail_at = Some(index);
        self
    }

    /// Returns how many frames have been handed out.
    pub fn served(&self) -> usize {
        self.served
    }
}

impl FrameSource for MockSource {
    fn frame_len(&self) -> usize {
        self.frame_len
    }

    fn next_frame(&mut self) -> Result<Option<FrameBuffer>, SourceError> {
        if self.fail_at == Some(self.served) {
            return Err(SourceError::ShortRead {
                expected: self.frame_len,
                got: self.frame_len / 2,
            });
        }
        let frame = self.frames.pop_front();
        if frame.is_some() {
            self.served += 1;
        }
        Ok(frame)
    }
}
