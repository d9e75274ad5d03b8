//! Error taxonomy of the segmentation core.

use thiserror::Error;

/// Configuration-contract violations surfaced to callers.
///
/// Numeric trouble inside the EM loop (vanishing responsibilities,
/// non-convergence, parameter collapse) is recovered internally and never
/// reaches this type.
#[derive(Debug, Error)]
pub enum SegmentError {
    /// Mixture parameters were fit per bin, but no bin array was supplied
    /// to score against.
    #[error("mixture parameters were fit per bin, but no bin array was provided")]
    BinsRequired,
    /// Two arrays that must share a shape do not.
    #[error("array shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        /// Shape of the reference array.
        expected: (usize, usize),
        /// Shape of the offending array.
        actual: (usize, usize),
    },
}
