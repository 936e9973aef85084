//! Position-Based Fluids stage operators (Macklin & Müller 2013).
//!
//! Each stage is a data-parallel pass over the fluid particles: worker `i`
//! reads shared immutable slices and writes only slot `i` of its outputs.
//! Stages that rewrite a double-buffered field write the back buffer and
//! swap once the pass has joined.
//!
//! Notation: `W` is the Poly6 kernel, `grad W` the Spiky gradient with
//! respect to the querying particle, `m` the fluid particle mass, `rho_0`
//! the rest density and `Psi` the boundary pseudo-mass.

use glam::Vec3;
use rayon::prelude::*;

use crate::bounds::Aabb;
use crate::neighbor::{ParticleRef, SpatialHash};
use crate::params::{SolverParams, SurfaceTension};
use crate::particle::DoubleBuffer;
use crate::smoothing::SmoothingKernel;

/// Precomputed artificial-pressure term `s_corr = -k (W(r) / W(dq))^n`.
#[derive(Debug, Clone, Copy)]
pub struct TensileCorrection {
    strength: f32,
    exponent: i32,
    inv_reference_weight: f32,
}

impl TensileCorrection {
    /// Evaluate `W(dq)` once for the given kernel.
    pub fn new(tension: &SurfaceTension, kernel: &SmoothingKernel) -> Self {
        let dq = tension.reference_fraction * kernel.radius();
        let reference = kernel.density_weight(dq * dq);
        let inv_reference_weight = if reference > 0.0 { 1.0 / reference } else { 0.0 };
        Self {
            strength: tension.strength,
            exponent: tension.exponent,
            inv_reference_weight,
        }
    }

    /// `s_corr` for a neighbor with kernel weight `w`.
    #[inline]
    pub fn correction(&self, w: f32) -> f32 {
        if self.strength == 0.0 {
            return 0.0;
        }
        -self.strength * (w * self.inv_reference_weight).powi(self.exponent)
    }
}

/// Scalar inputs shared by every stage of a step.
#[derive(Debug, Clone, Copy)]
pub struct Coefficients {
    /// Gravitational acceleration.
    pub gravity: Vec3,
    /// `rho_0`.
    pub rest_density: f32,
    /// Fluid particle mass `m`.
    pub mass: f32,
    /// Boundary pseudo-mass.
    pub psi: f32,
    /// Constraint relaxation `epsilon`.
    pub relaxation: f32,
    /// XSPH coefficient.
    pub viscosity: f32,
    /// Vorticity confinement strength.
    pub vorticity: f32,
    /// Artificial pressure term.
    pub tension: TensileCorrection,
    /// Clamp `C` to non-negative values.
    pub unilateral: bool,
    /// Box that predicted positions are projected into after each
    /// correction.
    pub containment: Option<Aabb>,
}

impl Coefficients {
    /// Derive the stage coefficients from solver parameters.
    pub fn new(params: &SolverParams, kernel: &SmoothingKernel, psi: f32) -> Self {
        Self {
            gravity: params.gravity,
            rest_density: params.rest_density,
            mass: params.particle_mass(),
            psi,
            relaxation: params.relaxation_epsilon,
            viscosity: params.viscosity,
            vorticity: params.vorticity_strength,
            tension: TensileCorrection::new(&params.surface_tension, kernel),
            unilateral: params.unilateral_constraint,
            containment: None,
        }
    }

    /// Constraint value for a density, honoring the unilateral option.
    #[inline]
    pub fn constraint(&self, density: f32) -> f32 {
        let c = density / self.rest_density - 1.0;
        if self.unilateral {
            c.max(0.0)
        } else {
            c
        }
    }
}

/// Everything a stage reads besides the particle buffers.
#[derive(Clone, Copy)]
pub struct StepContext<'a> {
    /// Smoothing kernel.
    pub kernel: SmoothingKernel,
    /// Spatial hash built from the predicted positions of this sub-step.
    pub hash: &'a SpatialHash,
    /// Boundary sample positions.
    pub boundary: &'a [Vec3],
    /// Scalar coefficients.
    pub coefficients: Coefficients,
    /// Sub-step duration.
    pub dt: f32,
}

/// `v* = v + g dt`, `x* = x + v* dt`.
///
/// Writes the back buffers of `velocities` and `predicted`, then swaps both.
pub fn predict_positions(
    ctx: &StepContext<'_>,
    positions: &[Vec3],
    velocities: &mut DoubleBuffer<Vec3>,
    predicted: &mut DoubleBuffer<Vec3>,
) {
    let dt = ctx.dt;
    let dv = ctx.coefficients.gravity * dt;
    let (v_read, v_write) = velocities.split();
    predicted
        .write()
        .par_iter_mut()
        .zip(v_write.par_iter_mut())
        .enumerate()
        .for_each(|(i, (x_star, v))| {
            let vel = v_read[i] + dv;
            *v = vel;
            *x_star = positions[i] + vel * dt;
        });
    velocities.swap();
    predicted.swap();
}

/// Density and Lagrange multiplier of every particle.
///
/// ```text
/// rho_i    = sum_fluid m W + sum_boundary Psi W
/// C_i      = rho_i / rho_0 - 1
/// lambda_i = -C_i / (sum_k |grad_k C_i|^2 + epsilon)
/// ```
///
/// Fluid neighbors contribute `(m / rho_0) grad W` to both their own and the
/// particle's gradient; boundary samples only to the particle's own.
pub fn compute_lambdas(
    ctx: &StepContext<'_>,
    predicted: &[Vec3],
    densities: &mut [f32],
    lambdas: &mut [f32],
) {
    let kernel = ctx.kernel;
    let co = ctx.coefficients;
    let fluid_scale = co.mass / co.rest_density;
    let boundary_scale = co.psi / co.rest_density;

    densities
        .par_iter_mut()
        .zip(lambdas.par_iter_mut())
        .enumerate()
        .for_each(|(i, (rho, lambda))| {
            let mut density = 0.0_f32;
            let mut grad_i = Vec3::ZERO;
            let mut grad_sq_sum = 0.0_f32;

            ctx.hash.for_each_neighbor(
                predicted[i],
                predicted,
                ctx.boundary,
                kernel.radius(),
                |n| {
                    let w = kernel.density_weight(n.dist_sq);
                    match n.particle {
                        ParticleRef::Fluid(j) => {
                            density += co.mass * w;
                            if j != i {
                                let grad_j = kernel.spiky_gradient(n.offset) * fluid_scale;
                                grad_i += grad_j;
                                grad_sq_sum += grad_j.length_squared();
                            }
                        }
                        ParticleRef::Boundary(_) => {
                            density += co.psi * w;
                            grad_i += kernel.spiky_gradient(n.offset) * boundary_scale;
                        }
                    }
                },
            );

            grad_sq_sum += grad_i.length_squared();
            *rho = density;
            *lambda = -co.constraint(density) / (grad_sq_sum + co.relaxation);
        });
}

/// Mean `|C|` over all particles for the densities of the last
/// [`compute_lambdas`] pass. Summed sequentially so the value is
/// reproducible.
pub fn mean_constraint_error(coefficients: &Coefficients, densities: &[f32]) -> f32 {
    if densities.is_empty() {
        return 0.0;
    }
    let sum: f64 = densities
        .iter()
        .map(|&rho| coefficients.constraint(rho).abs() as f64)
        .sum();
    (sum / densities.len() as f64) as f32
}

/// Position correction from the multipliers of [`compute_lambdas`].
///
/// ```text
/// dp_i = (m / rho_0) sum_fluid (lambda_i + lambda_j + s_corr) grad W
///      + (Psi / rho_0) sum_boundary lambda_i grad W
/// ```
///
/// The corrected position is projected into the containment box, if any,
/// written to the back buffer, and published by a swap.
pub fn solve_density_constraint(
    ctx: &StepContext<'_>,
    predicted: &mut DoubleBuffer<Vec3>,
    lambdas: &[f32],
) {
    let kernel = ctx.kernel;
    let co = ctx.coefficients;
    let fluid_scale = co.mass / co.rest_density;
    let boundary_scale = co.psi / co.rest_density;

    let (read, write) = predicted.split();
    write.par_iter_mut().enumerate().for_each(|(i, out)| {
        let p = read[i];
        let lambda_i = lambdas[i];
        let mut fluid_dp = Vec3::ZERO;
        let mut boundary_dp = Vec3::ZERO;

        ctx.hash
            .for_each_neighbor(p, read, ctx.boundary, kernel.radius(), |n| match n.particle {
                ParticleRef::Fluid(j) if j != i => {
                    let s_corr = co.tension.correction(kernel.density_weight(n.dist_sq));
                    fluid_dp += (lambda_i + lambdas[j] + s_corr) * kernel.spiky_gradient(n.offset);
                }
                ParticleRef::Fluid(_) => {}
                ParticleRef::Boundary(_) => {
                    boundary_dp += lambda_i * kernel.spiky_gradient(n.offset);
                }
            });

        let corrected = p + fluid_dp * fluid_scale + boundary_dp * boundary_scale;
        *out = match co.containment {
            Some(bounds) => bounds.clamp(corrected),
            None => corrected,
        };
    });
    predicted.swap();
}

/// `v = (x* - x) / dt`.
pub fn update_velocities(
    ctx: &StepContext<'_>,
    positions: &[Vec3],
    predicted: &[Vec3],
    velocities: &mut DoubleBuffer<Vec3>,
) {
    let inv_dt = 1.0 / ctx.dt;
    velocities
        .write()
        .par_iter_mut()
        .enumerate()
        .for_each(|(i, v)| *v = (predicted[i] - positions[i]) * inv_dt);
    velocities.swap();
}

/// XSPH viscosity and vorticity in one neighbor pass.
///
/// ```text
/// v_i     += c sum_j (m / rho_j) (v_j - v_i) W
/// omega_i  = sum_j (m / rho_j) (v_j - v_i) x grad_j W
/// ```
///
/// `grad_j W` is the kernel gradient with respect to the neighbor position,
/// so a rigid rotation with angular velocity `w` yields `omega ~ 2w`.
pub fn apply_viscosity(
    ctx: &StepContext<'_>,
    predicted: &[Vec3],
    densities: &[f32],
    velocities: &mut DoubleBuffer<Vec3>,
    vorticities: &mut [Vec3],
) {
    let kernel = ctx.kernel;
    let co = ctx.coefficients;

    let (v_read, v_write) = velocities.split();
    v_write
        .par_iter_mut()
        .zip(vorticities.par_iter_mut())
        .enumerate()
        .for_each(|(i, (v_out, omega_out))| {
            let v_i = v_read[i];
            let mut smoothing = Vec3::ZERO;
            let mut omega = Vec3::ZERO;

            ctx.hash
                .for_each_neighbor(predicted[i], predicted, ctx.boundary, kernel.radius(), |n| {
                    let ParticleRef::Fluid(j) = n.particle else {
                        return;
                    };
                    let rho_j = densities[j];
                    if j == i || rho_j <= 0.0 {
                        return;
                    }
                    let volume = co.mass / rho_j;
                    let v_ij = v_read[j] - v_i;
                    smoothing += v_ij * (volume * kernel.density_weight(n.dist_sq));
                    omega += kernel.spiky_gradient(n.offset).cross(v_ij) * volume;
                });

            *v_out = v_i + smoothing * co.viscosity;
            *omega_out = omega;
        });
    velocities.swap();
}

/// Vorticity confinement.
///
/// ```text
/// eta = sum_j (m / rho_j) |omega_j| grad W
/// N   = eta / |eta|
/// v_i += epsilon_v (N x omega_i) dt
/// ```
pub fn confine_vorticity(
    ctx: &StepContext<'_>,
    predicted: &[Vec3],
    densities: &[f32],
    vorticities: &[Vec3],
    velocities: &mut DoubleBuffer<Vec3>,
) {
    let kernel = ctx.kernel;
    let co = ctx.coefficients;
    let dt = ctx.dt;

    let (v_read, v_write) = velocities.split();
    if co.vorticity == 0.0 {
        v_write.copy_from_slice(v_read);
        velocities.swap();
        return;
    }

    v_write.par_iter_mut().enumerate().for_each(|(i, v_out)| {
        let mut eta = Vec3::ZERO;
        ctx.hash
            .for_each_neighbor(predicted[i], predicted, ctx.boundary, kernel.radius(), |n| {
                let ParticleRef::Fluid(j) = n.particle else {
                    return;
                };
                let rho_j = densities[j];
                if j == i || rho_j <= 0.0 {
                    return;
                }
                eta += kernel.spiky_gradient(n.offset) * (co.mass / rho_j * vorticities[j].length());
            });

        let normal = eta.normalize_or_zero();
        let force = normal.cross(vorticities[i]) * co.vorticity;
        *v_out = v_read[i] + force * dt;
    });
    velocities.swap();
}

/// `x = x*`.
pub fn commit_positions(positions: &mut [Vec3], predicted: &[Vec3]) {
    positions
        .par_iter_mut()
        .zip(predicted.par_iter())
        .for_each(|(x, &x_star)| *x = x_star);
}
