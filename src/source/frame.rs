//! Decoded frame buffers and the geometry they share.

use super::PixelFormat;
use serde::{Deserialize, Serialize};

/// Geometry shared by every frame of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameLayout {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Raw pixel layout.
    pub pixel_format: PixelFormat,
}

impl FrameLayout {
    /// Creates a layout of `width` x `height` pixels.
    pub fn new(width: u32, height: u32, pixel_format: PixelFormat) -> Self {
        Self {
            width,
            height,
            pixel_format,
        }
    }

    /// Returns the byte length every frame buffer of this layout has.
    #[inline]
    pub fn frame_len(&self) -> usize {
        self.pixel_format.frame_len(self.width, self.height)
    }
}

/// A single decoded frame.
///
/// The bytes are written once by the source that decoded them and are
/// read-only afterwards, so a buffer can move between threads without
/// any locking.
pub struct FrameBuffer {
    bytes: Box<[u8]>,
}

impl FrameBuffer {
    /// Wraps decoded bytes.
    pub fn new(bytes: impl Into<Box<[u8]>>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    /// Returns the raw pixel bytes.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Returns the buffer length in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[inline]
    /// Returns true for a zero-length buffer.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl std::fmt::Debug for FrameBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameBuffer")
            .field("bytes", &self.bytes.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_frame_len() {
        let layout = FrameLayout::new(4, 2, PixelFormat::RGB48LE);
        assert_eq!(layout.frame_len(), 4 * 2 * 3 * 2);
    }

    #[test]
    fn test_buffer_debug_hides_pixels() {
        let frame = FrameBuffer::new(vec![7u8; 12]);
        assert_eq!(frame.len(), 12);
        let debug = format!("{:?}", frame);
        assert!(debug.contains("12"));
        assert!(!debug.contains("7, 7"));
    }
}
