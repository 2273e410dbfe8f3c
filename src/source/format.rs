//! Pixel-format descriptor for raw decoded frames.
//!
//! The descriptor is fixed for a whole run. Every buffer a source
//! produces has the length implied by the descriptor and the frame
//! dimensions, so the pipeline never needs to inspect pixel data.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number and meaning of the channels in a pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChannelLayout {
    /// Single luminance channel.
    Gray,
    /// Interleaved red, green, blue.
    #[default]
    Rgb,
}

impl ChannelLayout {
    /// Returns the number of channels per pixel.
    #[inline]
    pub fn count(self) -> usize {
        match self {
            Self::Gray => 1,
            Self::Rgb => 3,
        }
    }
}

/// Storage type of a single channel sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SampleType {
    /// 8-bit samples.
    U8,
    /// 16-bit samples.
    #[default]
    U16,
}

impl SampleType {
    /// Returns the size of one sample in bytes.
    #[inline]
    pub fn bytes(self) -> usize {
        match self {
            Self::U8 => 1,
            Self::U16 => 2,
        }
    }

    /// Returns the largest representable sample value.
    #[inline]
    pub fn max_value(self) -> u32 {
        match self {
            Self::U8 => u8::MAX as u32,
            Self::U16 => u16::MAX as u32,
        }
    }
}

/// Byte order of multi-byte samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Endianness {
    /// Least significant byte first.
    #[default]
    Little,
    /// Most significant byte first.
    Big,
}

/// Describes how raw pixel bytes are laid out in a frame buffer.
///
/// The default is 16-bit little-endian RGB with packed rows, which is
/// what ffmpeg emits for `-pix_fmt rgb48le`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PixelFormat {
    /// Channel layout.
    pub channels: ChannelLayout,
    /// Sample storage type.
    pub sample: SampleType,
    /// Byte order of samples wider than one byte.
    pub endianness: Endianness,
    /// Row alignment in bytes; 0 means rows are tightly packed.
    pub align: usize,
}

impl PixelFormat {
    /// 16-bit little-endian RGB, packed.
    pub const RGB48LE: Self = Self {
        channels: ChannelLayout::Rgb,
        sample: SampleType::U16,
        endianness: Endianness::Little,
        align: 0,
    };

    /// 8-bit RGB, packed.
    pub const RGB24: Self = Self {
        channels: ChannelLayout::Rgb,
        sample: SampleType::U8,
        endianness: Endianness::Little,
        align: 0,
    };

    /// 8-bit grayscale, packed.
    pub const GRAY8: Self = Self {
        channels: ChannelLayout::Gray,
        sample: SampleType::U8,
        endianness: Endianness::Little,
        align: 0,
    };

    /// Returns the size of one pixel in bytes.
    #[inline]
    pub fn bytes_per_pixel(&self) -> usize {
        self.channels.count() * self.sample.bytes()
    }

    /// Returns the length of one row in bytes, including alignment padding.
    pub fn row_stride(&self, width: u32) -> usize {
        let packed = width as usize * self.bytes_per_pixel();
        if self.align > 1 {
            packed.div_ceil(self.align) * self.align
        } else {
            packed
        }
    }

    /// Returns the exact length of a frame buffer of the given size.
    ///
    /// Only valid for dimensions accepted by
    /// [`PixelFormat::checked_frame_len`].
    pub fn frame_len(&self, width: u32, height: u32) -> usize {
        self.row_stride(width) * height as usize
    }

    /// Like [`PixelFormat::frame_len`], but returns `None` when the length
    /// does not fit in `usize`.
    pub fn checked_frame_len(&self, width: u32, height: u32) -> Option<usize> {
        let packed = (width as usize).checked_mul(self.bytes_per_pixel())?;
        let stride = if self.align > 1 {
            packed.checked_next_multiple_of(self.align)?
        } else {
            packed
        };
        stride.checked_mul(height as usize)
    }

    /// Returns the ffmpeg `-pix_fmt` name producing this layout.
    ///
    /// Aligned layouts have no ffmpeg equivalent since ffmpeg writes
    /// rawvideo rows packed.
    pub fn ffmpeg_pix_fmt(&self) -> Option<&'static str> {
        if self.align > 1 {
            return None;
        }
        let name = match (self.channels, self.sample, self.endianness) {
            (ChannelLayout::Rgb, SampleType::U16, Endianness::Little) => "rgb48le",
            (ChannelLayout::Rgb, SampleType::U16, Endianness::Big) => "rgb48be",
            (ChannelLayout::Rgb, SampleType::U8, _) => "rgb24",
            (ChannelLayout::Gray, SampleType::U16, Endianness::Little) => "gray16le",
            (ChannelLayout::Gray, SampleType::U16, Endianness::Big) => "gray16be",
            (ChannelLayout::Gray, SampleType::U8, _) => "gray",
        };
        Some(name)
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.ffmpeg_pix_fmt() {
            Some(name) => f.write_str(name),
            None => write!(
                f,
                "{:?}/{:?}/{:?}/align={}",
                self.channels, self.sample, self.endianness, self.align
            ),
        }
    }
}
