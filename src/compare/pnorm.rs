//! Display-referred p-norm distance.
//!
//! Samples are mapped linearly onto `[0, intensity_target]` nits and the
//! per-sample absolute differences are pooled with a p-norm mean. Equal
//! frames score exactly zero, and a larger norm exponent weights the
//! worst differences more heavily.

use super::{check_inputs, CompareError, Comparator};
use crate::source::{Endianness, FrameBuffer, FrameLayout, SampleType};

/// p-norm comparator calibrated to a display brightness.
#[derive(Debug, Clone)]
pub struct PnormComparator {
    intensity_target: f32,
}

impl PnormComparator {
    /// Creates a comparator for a display peaking at `intensity_target` nits.
    pub fn new(intensity_target: f32) -> Self {
        Self { intensity_target }
    }

    /// Returns the configured display brightness in nits.
    pub fn intensity_target(&self) -> f32 {
        self.intensity_target
    }
}

impl Default for PnormComparator {
    fn default() -> Self {
        Self::new(250.0)
    }
}

impl Comparator for PnormComparator {
    fn compute(
        &self,
        reference: &FrameBuffer,
        distorted: &FrameBuffer,
        layout: &FrameLayout,
        norm: f32,
    ) -> Result<f64, CompareError> {
        check_inputs(reference, distorted, layout, norm)?;
        if !(self.intensity_target.is_finite() && self.intensity_target > 0.0) {
            return Err(CompareError::Engine(format!(
                "intensity target {} is not a positive brightness",
                self.intensity_target
            )));
        }

        let format = layout.pixel_format;
        let stride = format.row_stride(layout.width);
        let row_bytes = layout.width as usize * format.bytes_per_pixel();
        let max = format.sample.max_value() as f64;
        let p = norm as f64;

        let mut sum = 0.0f64;
        let mut count = 0usize;
        for row in 0..layout.height as usize {
            let start = row * stride;
            let r = &reference.as_bytes()[start..start + row_bytes];
            let d = &distorted.as_bytes()[start..start + row_bytes];

            for (a, b) in samples(r, format.sample, format.endianness)
                .zip(samples(d, format.sample, format.endianness))
            {
                // Normalized to [0, 1] so high exponents cannot overflow
                let diff = a.abs_diff(b) as f64 / max;
                if diff > 0.0 {
                    sum += diff.powf(p);
                }
                count += 1;
            }
        }

        if count == 0 {
            return Ok(0.0);
        }
        let distance = (sum / count as f64).powf(1.0 / p) * self.intensity_target as f64;
        Ok(distance)
    }
}

/// Decodes raw bytes into sample values.
fn samples(
    bytes: &[u8],
    sample: SampleType,
    endianness: Endianness,
) -> Box<dyn Iterator<Item = u32> + '_> {
    match (sample, endianness) {
        (SampleType::U8, _) => Box::new(bytes.iter().map(|&b| b as u32)),
        (SampleType::U16, Endianness::Little) => Box::new(
            bytes
                .chunks_exact(2)
                .map(|c| u16::from_le_bytes([c[0], c[1]]) as u32),
        ),
        (SampleType::U16, Endianness::Big) => Box::new(
            bytes
                .chunks_exact(2)
                .map(|c| u16::from_be_bytes([c[0], c[1]]) as u32),
        ),
    }
}
