//! Static boundary particles.
//!
//! Boundary particles are sampled along walls and obstacles. They never move
//! and carry no per-particle state beyond their position. Following Akinci et
//! al. (2012), every boundary sample contributes to fluid density with the
//! same pseudo-mass
//!
//! ```text
//! Psi = rest_density / W(0)
//! ```
//!
//! which makes one densely sampled boundary layer read as rest density.

use glam::Vec3;

use crate::smoothing::SmoothingKernel;

/// Immutable set of boundary sample positions.
#[derive(Debug, Clone)]
pub struct FluidBoundary {
    positions: Vec<Vec3>,
    psi: f32,
}

impl FluidBoundary {
    /// Boundary made of `positions`, with `Psi` derived from `kernel`.
    pub fn new(positions: Vec<Vec3>, kernel: &SmoothingKernel, rest_density: f32) -> Self {
        let psi = rest_density / kernel.self_density();
        Self { positions, psi }
    }

    /// A boundary with no samples (free-falling fluid, tests).
    pub fn empty(kernel: &SmoothingKernel, rest_density: f32) -> Self {
        Self::new(Vec::new(), kernel, rest_density)
    }

    /// Sample positions.
    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    /// Uniform pseudo-mass of every sample.
    pub fn psi(&self) -> f32 {
        self.psi
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// `true` if there are no samples.
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}
