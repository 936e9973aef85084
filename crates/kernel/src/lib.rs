//! Position-Based Fluids Simulation Kernel
//!
//! This crate provides the core solver for Position-Based Fluids (PBF), the
//! constraint-based SPH variant of Macklin & Müller (2013). It is designed to
//! be separable and compute-focused: every stage is a data-parallel pass over
//! flat particle buffers.
//!
//! # Modules
//! - [`smoothing`] -- Poly6 / Spiky / viscosity kernel coefficients.
//! - [`scan`] -- Multi-level parallel inclusive prefix sum.
//! - [`neighbor`] -- Counting-sort spatial hash for neighbor search.
//! - [`particle`] -- Double-buffered fluid particle storage.
//! - [`boundary`] -- Static boundary samples and their pseudo-mass.
//! - [`params`] -- Solver parameters.
//! - [`pbf`] -- The individual solver stages.
//! - [`solver`] -- `FluidSolver`, which sequences the stages.

#![warn(missing_docs)]

pub mod boundary;
pub mod bounds;
pub mod error;
pub mod neighbor;
pub mod params;
pub mod particle;
pub mod pbf;
pub mod scan;
pub mod smoothing;
pub mod solver;

pub use boundary::FluidBoundary;
pub use bounds::Aabb;
pub use error::KernelError;
pub use neighbor::{Neighbor, ParticleRef, SpatialHash};
pub use params::{SolverParams, SurfaceTension};
pub use particle::{DoubleBuffer, FluidBody};
pub use scan::PrefixScan;
pub use smoothing::SmoothingKernel;
pub use solver::{FluidSolver, SolverStage, StepDiagnostics};

/// Aggregate error / conservation metrics for a simulation snapshot.
#[derive(Debug, Clone, Copy)]
pub struct ErrorMetrics {
    /// Maximum relative density deviation from rest density across all particles.
    pub max_density_variation: f32,
    /// Mean relative density deviation from rest density.
    pub mean_density_variation: f32,
    /// Relative total mass drift from initial mass (|M - M0| / |M0|), where
    /// particles with non-finite state carry no mass.
    pub mass_conservation: f32,
}

/// Interface the orchestration layer and validation harness drive.
///
/// A `SimulationKernel` owns particle data and advances it through the PBF
/// pipeline each time-step:
///
/// 1. Prediction
/// 2. Neighbor search
/// 3. Density constraint iterations
/// 4. Velocity update, viscosity and vorticity confinement
pub trait SimulationKernel {
    /// Execute one simulation step of duration `dt` seconds.
    fn step(&mut self, dt: f32) -> Result<(), KernelError>;

    /// Read back current particle state.
    fn body(&self) -> &FluidBody;

    /// Get current error / conservation metrics.
    fn error_metrics(&self) -> ErrorMetrics;

    /// Number of fluid particles in the simulation.
    fn particle_count(&self) -> usize;
}
