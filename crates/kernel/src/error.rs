//! Error type for kernel construction and stepping.
//!
//! Every variant is a configuration error: it is reported before any particle
//! buffer is touched. Numerical edge cases (empty neighborhoods, vanishing
//! gradients) are absorbed by the solver and never surface here.

use thiserror::Error;

/// Errors raised by the PBF kernel.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum KernelError {
    /// Smoothing kernel support radius was zero, negative or not finite.
    #[error("kernel radius must be finite and positive, got {0}")]
    InvalidRadius(f32),

    /// Step duration was zero, negative or not finite.
    #[error("time step must be finite and positive, got {0}")]
    InvalidTimeStep(f32),

    /// Fewer than one sub-step per step was requested.
    #[error("sub-step count must be at least 1, got {0}")]
    InvalidSubSteps(u32),

    /// Fewer than one constraint iteration per sub-step was requested.
    #[error("constraint iteration count must be at least 1, got {0}")]
    InvalidIterations(u32),

    /// Spatial hash cell size was zero, negative or not finite.
    #[error("cell size must be finite and positive, got {0}")]
    InvalidCellSize(f32),

    /// A named solver parameter is outside its valid range.
    #[error("invalid parameter `{name}`: {value}")]
    InvalidParameter {
        /// Parameter name as it appears in `SolverParams`.
        name: &'static str,
        /// Offending value.
        value: f32,
    },

    /// A bounding box has `min > max` on some axis or non-finite corners.
    #[error("invalid bounds: min {min:?} max {max:?}")]
    InvalidBounds {
        /// Minimum corner.
        min: [f32; 3],
        /// Maximum corner.
        max: [f32; 3],
    },
}
