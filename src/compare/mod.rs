//! Per-frame perceptual distance.
//!
//! A comparator scores one reference/distorted frame pair. The pipeline
//! only depends on the [`Comparator`] trait; [`PnormComparator`] is the
//! engine the command line tool ships with.

mod pnorm;

pub use pnorm::PnormComparator;

use crate::source::{FrameBuffer, FrameLayout};
use thiserror::Error;

/// Errors a comparator can report for a frame pair.
///
/// None of these are transient: the pipeline never retries a failed
/// comparison.
#[derive(Debug, Error)]
pub enum CompareError {
    /// The two frames of a pair have different lengths.
    #[error("frame lengths differ: reference {reference} bytes, distorted {distorted} bytes")]
    LengthMismatch {
        /// Reference frame length in bytes.
        reference: usize,
        /// Distorted frame length in bytes.
        distorted: usize,
    },
    /// A frame does not match the run's layout.
    #[error("frame is {got} bytes but the layout requires {expected}")]
    LayoutMismatch {
        /// Length the layout requires.
        expected: usize,
        /// Length of the frame given.
        got: usize,
    },
    /// The norm exponent is outside (0, 100].
    #[error("invalid norm exponent {0} (must be in (0, 100])")]
    InvalidNorm(f32),
    /// The engine itself failed.
    #[error("metric engine failed: {0}")]
    Engine(String),
}

/// Trait for perceptual distance engines.
///
/// Engine-wide settings such as the display intensity target are fixed
/// when the comparator is constructed, before the first call.
pub trait Comparator: Send + Sync {
    /// Computes the distance between two frames under the given norm.
    fn compute(
        &self,
        reference: &FrameBuffer,
        distorted: &FrameBuffer,
        layout: &FrameLayout,
        norm: f32,
    ) -> Result<f64, CompareError>;
}

impl<C: Comparator + ?Sized> Comparator for Box<C> {
    fn compute(
        &self,
        reference: &FrameBuffer,
        distorted: &FrameBuffer,
        layout: &FrameLayout,
        norm: f32,
    ) -> Result<f64, CompareError> {
        (**self).compute(reference, distorted, layout, norm)
    }
}

/// Returns true if `norm` is a usable norm exponent.
#[inline]
pub fn is_valid_norm(norm: f32) -> bool {
    norm.is_finite() && norm > 0.0 && norm <= 100.0
}

/// Checks the invariants every engine relies on.
pub fn check_inputs(
    reference: &FrameBuffer,
    distorted: &FrameBuffer,
    layout: &FrameLayout,
    norm: f32,
) -> Result<(), CompareError> {
    if reference.len() != distorted.len() {
        return Err(CompareError::LengthMismatch {
            reference: reference.len(),
            distorted: distorted.len(),
        });
    }
    if reference.len() != layout.frame_len() {
        return Err(CompareError::LayoutMismatch {
            expected: layout.frame_len(),
            got: reference.len(),
        });
    }
    if !is_valid_norm(norm) {
        return Err(CompareError::InvalidNorm(norm));
    }
    Ok(())
}
