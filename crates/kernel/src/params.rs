//! Solver parameters.
//!
//! Defaults reproduce the classic dam-break setup: particle radius 0.08 m,
//! water rest density, a kernel support of four radii, two sub-steps of two
//! constraint iterations each.

use std::f32::consts::PI;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::error::KernelError;

/// Artificial pressure term that counters particle clustering at the free
/// surface (Monaghan 2000, `s_corr` in Macklin & Müller 2013).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SurfaceTension {
    /// Strength `k`; zero disables the term.
    #[serde(default = "default_tension_strength")]
    pub strength: f32,
    /// Exponent `n`.
    #[serde(default = "default_tension_exponent")]
    pub exponent: i32,
    /// Reference distance `dq` as a fraction of the kernel radius.
    #[serde(default = "default_tension_reference")]
    pub reference_fraction: f32,
}

impl SurfaceTension {
    /// Term switched off.
    pub const OFF: Self = Self {
        strength: 0.0,
        exponent: 4,
        reference_fraction: 0.2,
    };
}

impl Default for SurfaceTension {
    fn default() -> Self {
        Self {
            strength: default_tension_strength(),
            exponent: default_tension_exponent(),
            reference_fraction: default_tension_reference(),
        }
    }
}

/// Everything the solver needs besides the particles themselves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverParams {
    /// Particle radius `r` (meters).
    #[serde(default = "default_radius")]
    pub particle_radius: f32,
    /// Rest density `rho_0` (kg/m^3).
    #[serde(default = "default_rest_density")]
    pub rest_density: f32,
    /// Gravitational acceleration (m/s^2).
    #[serde(default = "default_gravity")]
    pub gravity: Vec3,
    /// Sub-steps per `step(dt)`.
    #[serde(default = "default_sub_steps")]
    pub sub_steps: u32,
    /// Density constraint iterations per sub-step.
    #[serde(default = "default_iterations")]
    pub constraint_iterations: u32,
    /// XSPH viscosity coefficient `c`.
    #[serde(default = "default_viscosity")]
    pub viscosity: f32,
    /// Constraint force mixing `epsilon` added to the lambda denominator.
    #[serde(default = "default_relaxation")]
    pub relaxation_epsilon: f32,
    /// Tensile instability correction.
    #[serde(default)]
    pub surface_tension: SurfaceTension,
    /// Vorticity confinement strength `epsilon_v`; zero disables it.
    #[serde(default = "default_vorticity")]
    pub vorticity_strength: f32,
    /// Kernel support radius in particle radii (`H = scale * r`).
    #[serde(default = "default_kernel_scale")]
    pub kernel_radius_scale: f32,
    /// Spatial hash cell size in kernel radii; at least 1.
    #[serde(default = "default_cell_scale")]
    pub cell_size_scale: f32,
    /// Only resolve compression (`C >= 0`), never pull particles together.
    #[serde(default = "default_true")]
    pub unilateral_constraint: bool,
    /// Sort each hash cell so neighbor order is reproducible across runs.
    #[serde(default = "default_true")]
    pub deterministic_neighbors: bool,
}

// Default values
fn default_radius() -> f32 {
    0.08
}

fn default_rest_density() -> f32 {
    1000.0
}

fn default_gravity() -> Vec3 {
    Vec3::new(0.0, -9.81, 0.0)
}

fn default_sub_steps() -> u32 {
    2
}

fn default_iterations() -> u32 {
    2
}

fn default_viscosity() -> f32 {
    0.01
}

fn default_relaxation() -> f32 {
    10.0
}

fn default_tension_strength() -> f32 {
    0.001
}

fn default_tension_exponent() -> i32 {
    4
}

fn default_tension_reference() -> f32 {
    0.2
}

fn default_vorticity() -> f32 {
    0.0005
}

fn default_kernel_scale() -> f32 {
    4.0
}

fn default_cell_scale() -> f32 {
    1.0
}

fn default_true() -> bool {
    true
}

impl Default for SolverParams {
    fn default() -> Self {
        Self {
            particle_radius: default_radius(),
            rest_density: default_rest_density(),
            gravity: default_gravity(),
            sub_steps: default_sub_steps(),
            constraint_iterations: default_iterations(),
            viscosity: default_viscosity(),
            relaxation_epsilon: default_relaxation(),
            surface_tension: SurfaceTension::default(),
            vorticity_strength: default_vorticity(),
            kernel_radius_scale: default_kernel_scale(),
            cell_size_scale: default_cell_scale(),
            unilateral_constraint: true,
            deterministic_neighbors: true,
        }
    }
}

impl SolverParams {
    /// Particle diameter, the lattice spacing of an initial fluid block.
    pub fn particle_diameter(&self) -> f32 {
        2.0 * self.particle_radius
    }

    /// Kernel support radius `H`.
    pub fn kernel_radius(&self) -> f32 {
        self.kernel_radius_scale * self.particle_radius
    }

    /// Spatial hash cell edge length.
    pub fn cell_size(&self) -> f32 {
        self.cell_size_scale * self.kernel_radius()
    }

    /// Mass of one fluid particle: `rho_0 * 4/3 pi r^3`.
    pub fn particle_mass(&self) -> f32 {
        let r = self.particle_radius;
        self.rest_density * 4.0 / 3.0 * PI * r * r * r
    }

    /// Check every parameter range.
    pub fn validate(&self) -> Result<(), KernelError> {
        if !self.particle_radius.is_finite() || self.particle_radius <= 0.0 {
            return Err(KernelError::InvalidRadius(self.particle_radius));
        }
        if self.sub_steps == 0 {
            return Err(KernelError::InvalidSubSteps(self.sub_steps));
        }
        if self.constraint_iterations == 0 {
            return Err(KernelError::InvalidIterations(self.constraint_iterations));
        }
        positive("rest_density", self.rest_density)?;
        positive("relaxation_epsilon", self.relaxation_epsilon)?;
        positive("kernel_radius_scale", self.kernel_radius_scale)?;
        non_negative("viscosity", self.viscosity)?;
        non_negative("vorticity_strength", self.vorticity_strength)?;
        non_negative("surface_tension.strength", self.surface_tension.strength)?;
        positive(
            "surface_tension.reference_fraction",
            self.surface_tension.reference_fraction,
        )?;
        if self.surface_tension.reference_fraction >= 1.0 {
            return Err(KernelError::InvalidParameter {
                name: "surface_tension.reference_fraction",
                value: self.surface_tension.reference_fraction,
            });
        }
        if self.surface_tension.exponent < 1 {
            return Err(KernelError::InvalidParameter {
                name: "surface_tension.exponent",
                value: self.surface_tension.exponent as f32,
            });
        }
        if !self.cell_size_scale.is_finite() || self.cell_size_scale < 1.0 {
            return Err(KernelError::InvalidParameter {
                name: "cell_size_scale",
                value: self.cell_size_scale,
            });
        }
        if !self.gravity.is_finite() {
            return Err(KernelError::InvalidParameter {
                name: "gravity",
                value: self.gravity.length(),
            });
        }
        Ok(())
    }
}

fn positive(name: &'static str, value: f32) -> Result<(), KernelError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(KernelError::InvalidParameter { name, value })
    }
}

fn non_negative(name: &'static str, value: f32) -> Result<(), KernelError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(KernelError::InvalidParameter { name, value })
    }
}
