//! The PBF solver: owns the particle state and drives the stage pipeline.

use glam::Vec3;

use crate::boundary::FluidBoundary;
use crate::bounds::Aabb;
use crate::error::KernelError;
use crate::neighbor::SpatialHash;
use crate::params::SolverParams;
use crate::particle::FluidBody;
use crate::pbf::{self, Coefficients, StepContext};
use crate::smoothing::SmoothingKernel;
use crate::{ErrorMetrics, SimulationKernel};

/// Stage the solver is currently executing.
///
/// Every sub-step walks the stages in declaration order and returns to
/// [`SolverStage::Idle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverStage {
    /// Between steps.
    Idle,
    /// Gravity integration into predicted positions.
    Predicting,
    /// Spatial hash rebuild from predicted positions.
    HashRebuilding,
    /// Density constraint iteration (zero-based).
    ConstraintSolving(u32),
    /// Velocities from the corrected displacement.
    VelocityUpdate,
    /// XSPH viscosity and vorticity estimate.
    ViscosityVorticity,
    /// Vorticity confinement impulse.
    VorticityConfinement,
    /// Predicted positions become committed positions.
    PositionCommit,
}

/// Convergence record of the most recent sub-step.
#[derive(Debug, Clone, Default)]
pub struct StepDiagnostics {
    /// Completed calls to `step`.
    pub steps: u64,
    /// Mean `|C|` after each lambda pass of the last sub-step, in order.
    pub constraint_errors: Vec<f32>,
}

impl StepDiagnostics {
    /// Mean `|C|` of the final iteration of the last sub-step.
    pub fn final_error(&self) -> Option<f32> {
        self.constraint_errors.last().copied()
    }
}

/// Position-Based Fluids solver.
///
/// Each [`FluidSolver::step`] splits `dt` into `sub_steps` equal sub-steps
/// and runs, per sub-step:
///
/// 1. predict positions under gravity,
/// 2. rebuild the spatial hash from the predictions,
/// 3. `constraint_iterations` rounds of lambda computation and position
///    correction,
/// 4. velocity update from the corrected displacement,
/// 5. XSPH viscosity and vorticity,
/// 6. vorticity confinement,
/// 7. commit positions.
#[derive(Debug)]
pub struct FluidSolver {
    params: SolverParams,
    kernel: SmoothingKernel,
    coefficients: Coefficients,
    body: FluidBody,
    boundary: FluidBoundary,
    hash: SpatialHash,
    stage: SolverStage,
    diagnostics: StepDiagnostics,
    initial_mass: f64,
}

impl FluidSolver {
    /// Create a solver.
    ///
    /// # Arguments
    /// * `params` - Solver parameters; validated here.
    /// * `body` - Fluid particles. Their count is fixed from now on.
    /// * `boundary` - Static boundary samples.
    /// * `domain` - Region covered by the spatial hash. Particles outside it
    ///   still work but share the border cells.
    pub fn new(
        params: SolverParams,
        body: FluidBody,
        boundary: FluidBoundary,
        domain: Aabb,
    ) -> Result<Self, KernelError> {
        params.validate()?;
        let kernel = SmoothingKernel::new(params.kernel_radius())?;
        let mut hash = SpatialHash::new(
            domain,
            body.len() + boundary.len(),
            body.len(),
            params.cell_size(),
        )?;
        hash.set_deterministic(params.deterministic_neighbors);

        let coefficients = Coefficients::new(&params, &kernel, boundary.psi());
        let initial_mass = body.len() as f64 * coefficients.mass as f64;

        tracing::info!(
            fluid = body.len(),
            boundary = boundary.len(),
            kernel_radius = kernel.radius(),
            mass = coefficients.mass,
            psi = coefficients.psi,
            grid = ?hash.dimension(),
            "PBF solver created"
        );

        Ok(Self {
            params,
            kernel,
            coefficients,
            body,
            boundary,
            hash,
            stage: SolverStage::Idle,
            diagnostics: StepDiagnostics::default(),
            initial_mass,
        })
    }

    /// Project predicted positions into `bounds` after every correction.
    pub fn with_containment(mut self, bounds: Aabb) -> Self {
        self.set_containment(Some(bounds));
        self
    }

    /// Set or clear the containment box.
    pub fn set_containment(&mut self, bounds: Option<Aabb>) {
        self.coefficients.containment = bounds;
    }

    /// Change the number of sub-steps per step.
    pub fn set_sub_steps(&mut self, sub_steps: u32) -> Result<(), KernelError> {
        if sub_steps == 0 {
            return Err(KernelError::InvalidSubSteps(sub_steps));
        }
        self.params.sub_steps = sub_steps;
        Ok(())
    }

    /// Change the number of constraint iterations per sub-step.
    pub fn set_constraint_iterations(&mut self, iterations: u32) -> Result<(), KernelError> {
        if iterations == 0 {
            return Err(KernelError::InvalidIterations(iterations));
        }
        self.params.constraint_iterations = iterations;
        Ok(())
    }

    /// Advance the simulation by `dt` seconds.
    ///
    /// All preconditions are checked before any buffer is modified, so an
    /// error leaves the state untouched.
    pub fn step(&mut self, dt: f32) -> Result<(), KernelError> {
        if !dt.is_finite() || dt <= 0.0 {
            return Err(KernelError::InvalidTimeStep(dt));
        }
        if self.params.sub_steps == 0 {
            return Err(KernelError::InvalidSubSteps(self.params.sub_steps));
        }
        if self.params.constraint_iterations == 0 {
            return Err(KernelError::InvalidIterations(self.params.constraint_iterations));
        }

        let dt_sub = dt / self.params.sub_steps as f32;
        for _ in 0..self.params.sub_steps {
            self.sub_step(dt_sub);
        }
        self.diagnostics.steps += 1;

        tracing::debug!(
            step = self.diagnostics.steps,
            dt,
            residual = self.diagnostics.final_error().unwrap_or(0.0),
            "PBF step complete"
        );
        Ok(())
    }

    fn sub_step(&mut self, dt: f32) {
        self.diagnostics.constraint_errors.clear();
        self.predict_positions(dt);
        self.rebuild_hash();
        self.solve_constraints(dt);
        self.update_velocities(dt);
        self.apply_viscosity(dt);
        self.confine_vorticity(dt);
        self.commit_positions();
        self.enter(SolverStage::Idle);
    }

    fn enter(&mut self, stage: SolverStage) {
        tracing::trace!(?stage, from = ?self.stage, "solver stage");
        self.stage = stage;
    }

    // --- Stages ---

    /// Integrate gravity into predicted positions and velocities.
    pub fn predict_positions(&mut self, dt: f32) {
        self.enter(SolverStage::Predicting);
        let ctx = StepContext {
            kernel: self.kernel,
            hash: &self.hash,
            boundary: self.boundary.positions(),
            coefficients: self.coefficients,
            dt,
        };
        pbf::predict_positions(
            &ctx,
            &self.body.positions,
            &mut self.body.velocities,
            &mut self.body.predicted,
        );
    }

    /// Rebuild the spatial hash from the current predicted positions.
    pub fn rebuild_hash(&mut self) {
        self.enter(SolverStage::HashRebuilding);
        self.hash
            .rebuild(self.body.predicted.read(), self.boundary.positions());
    }

    /// Run every density constraint iteration of one sub-step.
    pub fn solve_constraints(&mut self, dt: f32) {
        for iteration in 0..self.params.constraint_iterations {
            self.enter(SolverStage::ConstraintSolving(iteration));
            let ctx = StepContext {
                kernel: self.kernel,
                hash: &self.hash,
                boundary: self.boundary.positions(),
                coefficients: self.coefficients,
                dt,
            };
            pbf::compute_lambdas(
                &ctx,
                self.body.predicted.read(),
                &mut self.body.densities,
                &mut self.body.lambdas,
            );
            self.diagnostics
                .constraint_errors
                .push(pbf::mean_constraint_error(&self.coefficients, &self.body.densities));
            pbf::solve_density_constraint(&ctx, &mut self.body.predicted, &self.body.lambdas);
        }
    }

    /// Derive velocities from the corrected displacement.
    pub fn update_velocities(&mut self, dt: f32) {
        self.enter(SolverStage::VelocityUpdate);
        let ctx = StepContext {
            kernel: self.kernel,
            hash: &self.hash,
            boundary: self.boundary.positions(),
            coefficients: self.coefficients,
            dt,
        };
        pbf::update_velocities(
            &ctx,
            &self.body.positions,
            self.body.predicted.read(),
            &mut self.body.velocities,
        );
    }

    /// XSPH viscosity and vorticity estimate.
    pub fn apply_viscosity(&mut self, dt: f32) {
        self.enter(SolverStage::ViscosityVorticity);
        let ctx = StepContext {
            kernel: self.kernel,
            hash: &self.hash,
            boundary: self.boundary.positions(),
            coefficients: self.coefficients,
            dt,
        };
        pbf::apply_viscosity(
            &ctx,
            self.body.predicted.read(),
            &self.body.densities,
            &mut self.body.velocities,
            &mut self.body.vorticities,
        );
    }

    /// Vorticity confinement impulse.
    pub fn confine_vorticity(&mut self, dt: f32) {
        self.enter(SolverStage::VorticityConfinement);
        let ctx = StepContext {
            kernel: self.kernel,
            hash: &self.hash,
            boundary: self.boundary.positions(),
            coefficients: self.coefficients,
            dt,
        };
        pbf::confine_vorticity(
            &ctx,
            self.body.predicted.read(),
            &self.body.densities,
            &self.body.vorticities,
            &mut self.body.velocities,
        );
    }

    /// Copy predicted positions into committed positions.
    pub fn commit_positions(&mut self) {
        self.enter(SolverStage::PositionCommit);
        pbf::commit_positions(&mut self.body.positions, self.body.predicted.read());
    }

    // --- Accessors ---

    /// Current stage ([`SolverStage::Idle`] between steps).
    pub fn stage(&self) -> SolverStage {
        self.stage
    }

    /// Convergence record of the last sub-step.
    pub fn diagnostics(&self) -> &StepDiagnostics {
        &self.diagnostics
    }

    /// Solver parameters.
    pub fn params(&self) -> &SolverParams {
        &self.params
    }

    /// Smoothing kernel.
    pub fn kernel(&self) -> &SmoothingKernel {
        &self.kernel
    }

    /// Fluid particles.
    pub fn body(&self) -> &FluidBody {
        &self.body
    }

    /// Boundary samples.
    pub fn boundary(&self) -> &FluidBoundary {
        &self.boundary
    }

    /// Spatial hash as of the last rebuild.
    pub fn spatial_hash(&self) -> &SpatialHash {
        &self.hash
    }

    /// Containment box, if set.
    pub fn containment(&self) -> Option<Aabb> {
        self.coefficients.containment
    }

    /// Mass of one fluid particle.
    pub fn particle_mass(&self) -> f32 {
        self.coefficients.mass
    }

    /// Mass carried by particles whose position and velocity are finite.
    ///
    /// A particle that blew up no longer counts, so this drops below the
    /// initial mass when the integration fails.
    pub fn total_mass(&self) -> f64 {
        let live = self
            .body
            .positions
            .iter()
            .zip(self.body.velocities.read())
            .filter(|(p, v)| p.is_finite() && v.is_finite())
            .count();
        live as f64 * self.coefficients.mass as f64
    }

    /// Kinetic energy of the fluid (J).
    pub fn kinetic_energy(&self) -> f64 {
        let m = self.coefficients.mass as f64;
        self.body
            .velocities
            .read()
            .iter()
            .map(|v| 0.5 * m * v.length_squared() as f64)
            .sum()
    }

    /// Lowest and highest committed fluid position, per axis.
    pub fn fluid_bounds(&self) -> Option<Aabb> {
        Aabb::enclosing(&self.body.positions)
    }

    /// Sum of velocities, `momentum / m`.
    pub fn velocity_sum(&self) -> Vec3 {
        self.body.velocity_sum()
    }
}

impl SimulationKernel for FluidSolver {
    fn step(&mut self, dt: f32) -> Result<(), KernelError> {
        FluidSolver::step(self, dt)
    }

    fn body(&self) -> &FluidBody {
        &self.body
    }

    fn error_metrics(&self) -> ErrorMetrics {
        let rho0 = self.coefficients.rest_density;
        let n = self.body.densities.len();
        let (max_var, sum_var) = self
            .body
            .densities
            .iter()
            .map(|&rho| ((rho - rho0) / rho0).abs())
            .fold((0.0_f32, 0.0_f64), |(max, sum), v| (max.max(v), sum + v as f64));
        let mean_var = if n > 0 { (sum_var / n as f64) as f32 } else { 0.0 };

        let mass = self.total_mass();
        let mass_drift = if self.initial_mass.abs() > 1.0e-12 {
            ((mass - self.initial_mass) / self.initial_mass).abs() as f32
        } else {
            (mass - self.initial_mass).abs() as f32
        };

        ErrorMetrics {
            max_density_variation: max_var,
            mean_density_variation: mean_var,
            mass_conservation: mass_drift,
        }
    }

    fn particle_count(&self) -> usize {
        self.body.len()
    }
}
