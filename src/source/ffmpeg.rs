//! Frame source backed by an ffmpeg decoder process.
//!
//! ffmpeg decodes the whole video to raw frames on its stdout in the
//! run's pixel format. Frames are read from the pipe one at a time, so
//! at most one undecoded frame per source sits in this process.

use super::{read_frame, FrameBuffer, FrameLayout, FrameSource, SourceError};
use crate::cancel::CancelToken;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

/// Bytes of decoder stderr kept for error reports.
const STDERR_TAIL: usize = 4096;

/// Decodes a video file through `ffmpeg`.
pub struct FfmpegSource {
    path: PathBuf,
    frame_len: usize,
    stdout: BufReader<ChildStdout>,
    child: Arc<Mutex<Child>>,
    stderr: Option<JoinHandle<String>>,
    finished: bool,
}

impl FfmpegSource {
    /// Spawns the decoder for `path`.
    ///
    /// The decoder is killed when `cancel` fires, which turns any read
    /// blocked on its pipe into end-of-stream or an error.
    pub fn open(
        path: impl AsRef<Path>,
        layout: &FrameLayout,
        cancel: &CancelToken,
    ) -> Result<Self, SourceError> {
        Self::open_with("ffmpeg", path, layout, cancel)
    }

    /// Like [`FfmpegSource::open`] with an explicit ffmpeg binary.
    pub fn open_with(
        program: &str,
        path: impl AsRef<Path>,
        layout: &FrameLayout,
        cancel: &CancelToken,
    ) -> Result<Self, SourceError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SourceError::NotFound(path.to_path_buf()));
        }
        let pix_fmt = layout
            .pixel_format
            .ffmpeg_pix_fmt()
            .ok_or(SourceError::UnsupportedFormat(layout.pixel_format))?;

        let mut child = Command::new(program)
            .arg("-v")
            .arg("error")
            .arg("-i")
            .arg(path)
            .args(["-pix_fmt", pix_fmt, "-c:v", "rawvideo", "-f", "rawvideo", "-"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| SourceError::Spawn {
                program: program.to_string(),
                source,
            })?;

        let stdout = child.stdout.take().ok_or_else(|| SourceError::Spawn {
            program: program.to_string(),
            source: std::io::Error::other("stdout not captured"),
        })?;
        let stderr = child.stderr.take().map(|mut pipe| {
            // Drain stderr so the decoder never blocks on a full pipe
            std::thread::spawn(move || {
                let mut tail = Vec::new();
                let mut chunk = [0u8; 1024];
                while let Ok(n) = pipe.read(&mut chunk) {
                    if n == 0 {
                        break;
                    }
                    tail.extend_from_slice(&chunk[..n]);
                    if tail.len() > STDERR_TAIL {
                        tail.drain(..tail.len() - STDERR_TAIL);
                    }
                }
                String::from_utf8_lossy(&tail).trim().to_string()
            })
        });

        let child = Arc::new(Mutex::new(child));
        let handle = Arc::clone(&child);
        cancel.on_cancel(move || {
            if let Ok(mut child) = handle.lock() {
                let _ = child.kill();
            }
        });

        let frame_len = layout.frame_len();
        tracing::info!(
            path = %path.display(),
            pix_fmt,
            frame_len,
            "Decoder started"
        );

        Ok(Self {
            path: path.to_path_buf(),
            frame_len,
            stdout: BufReader::with_capacity(frame_len.clamp(8 * 1024, 8 * 1024 * 1024), stdout),
            child,
            stderr,
            finished: false,
        })
    }

    /// Returns the decoded file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reaps the decoder after end of stream and checks how it exited.
    fn finish(&mut self) -> Result<(), SourceError> {
        self.finished = true;
        let status = match self.child.lock() {
            Ok(mut child) => child.wait()?,
            Err(_) => return Ok(()),
        };
        let stderr = self
            .stderr
            .take()
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();

        if status.success() {
            tracing::debug!(path = %self.path.display(), "Decoder finished");
            Ok(())
        } else {
            Err(SourceError::DecoderExited {
                status: status.to_string(),
                stderr,
            })
        }
    }
}

impl FrameSource for FfmpegSource {
    fn frame_len(&self) -> usize {
        self.frame_len
    }

    fn next_frame(&mut self) -> Result<Option<FrameBuffer>, SourceError> {
        if self.finished {
            return Ok(None);
        }
        match read_frame(&mut self.stdout, self.frame_len)? {
            Some(frame) => Ok(Some(frame)),
            None => {
                self.finish()?;
                Ok(None)
            }
        }
    }
}

impl Drop for FfmpegSource {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if let Ok(mut child) = self.child.lock() {
            let _ = child.kill();
            let _ = child.wait();
        }
        tracing::debug!(path = %self.path.display(), "Decoder closed early");
    }
}

impl std::fmt::Debug for FfmpegSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FfmpegSource")
            .field("path", &self.path)
            .field("frame_len", &self.frame_len)
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}
