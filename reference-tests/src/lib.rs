//! Reference test framework for PBF fluid simulation validation
//!
//! Each reference test loads a scene file, runs the solver for a number of
//! frames and validates the final state against physical expectations:
//! containment, mass conservation, residual compression and bulk motion.

#[cfg(test)]
mod tests;

pub mod scenarios;

use glam::Vec3;
use pbf_kernel::{ErrorMetrics, FluidSolver, SimulationKernel};
use pbf_orchestrator::{build_solver, SceneConfig};

/// Expected result criteria for a reference test
#[derive(Debug, Clone, Default)]
pub struct ExpectedResult {
    /// Particle position bounds validation
    pub position_bounds: Option<PositionBoundsCheck>,
    /// Conservation metrics validation
    pub conservation: Option<ConservationCheck>,
    /// Residual density constraint error
    pub density_error: Option<DensityErrorCheck>,
    /// Settling check (nothing above a height)
    pub settling: Option<SettlingCheck>,
    /// Spreading check (fluid front has advanced)
    pub spreading: Option<SpreadingCheck>,
}

/// Check that particles remain within specified bounds
#[derive(Debug, Clone)]
pub struct PositionBoundsCheck {
    /// Minimum allowed position
    pub min: Vec3,
    /// Maximum allowed position
    pub max: Vec3,
}

/// Check conservation metrics
#[derive(Debug, Clone)]
pub struct ConservationCheck {
    /// Maximum allowed relative mass drift (0.0 to 1.0)
    pub max_mass_error: f32,
}

/// Check how well the last sub-step resolved compression
#[derive(Debug, Clone)]
pub struct DensityErrorCheck {
    /// Maximum mean `|C|` after the final constraint iteration
    pub max_constraint_error: f32,
}

/// Check that no particle sits above a height
#[derive(Debug, Clone)]
pub struct SettlingCheck {
    /// Maximum allowed y coordinate (m)
    pub max_height: f32,
}

/// Check that the fluid front has moved past a point along x
#[derive(Debug, Clone)]
pub struct SpreadingCheck {
    /// The rightmost particle must be beyond this x (m)
    pub min_front_x: f32,
}

/// Result of running a reference test
#[derive(Debug)]
pub struct TestResult {
    /// Test name
    pub name: String,
    /// Whether test passed
    pub passed: bool,
    /// Individual check results
    pub checks: Vec<CheckResult>,
    /// Final error metrics
    pub error_metrics: ErrorMetrics,
    /// Mean `|C|` after the final constraint iteration
    pub constraint_error: f32,
    /// Number of fluid particles
    pub particles: usize,
    /// Number of frames executed
    pub frames: u64,
    /// Simulated time (seconds)
    pub sim_time: f64,
}

/// Result of an individual validation check
#[derive(Debug)]
pub struct CheckResult {
    /// Check name
    pub name: String,
    /// Whether check passed
    pub passed: bool,
    /// Detail message
    pub message: Option<String>,
}

impl CheckResult {
    fn new(name: &str, passed: bool, message: String) -> Self {
        Self {
            name: name.to_string(),
            passed,
            message: Some(message),
        }
    }
}

/// A reference test case
pub struct ReferenceTest {
    /// Test name
    pub name: String,
    /// Path to configuration file
    pub config_path: String,
    /// Frames to run; `None` uses the frame count of the scene file
    pub frames: Option<u64>,
    /// Expected results to validate
    pub expected: ExpectedResult,
}

impl ReferenceTest {
    /// Run the reference test and return results
    pub fn run(&self) -> Result<TestResult, String> {
        tracing::info!("Running reference test: {}", self.name);

        let config = SceneConfig::load(&self.config_path).map_err(|e| e.to_string())?;
        let mut solver = build_solver(&config).map_err(|e| e.to_string())?;
        tracing::info!(
            "Initialized: {} fluid particles, {} boundary particles",
            solver.body().len(),
            solver.boundary().len(),
        );

        let frames = self.frames.unwrap_or(config.frames);
        tracing::info!("Running {} frames...", frames);
        let mut sim_time = 0.0_f64;
        for frame in 0..frames {
            solver.step(config.time_step).map_err(|e| e.to_string())?;
            sim_time += config.time_step as f64;

            // Log progress every 10% of frames
            if (frame + 1) % (frames / 10).max(1) == 0 {
                let progress = ((frame + 1) as f32 / frames as f32) * 100.0;
                tracing::info!("Progress: {:.0}% ({}/{})", progress, frame + 1, frames);
            }
        }
        tracing::info!("Simulation complete: {} frames, {:.3}s simulated", frames, sim_time);

        let error_metrics = solver.error_metrics();
        let constraint_error = solver.diagnostics().final_error().unwrap_or(0.0);
        let checks = self.validate(&solver, &error_metrics, constraint_error);
        let passed = checks.iter().all(|c| c.passed);

        Ok(TestResult {
            name: self.name.clone(),
            passed,
            checks,
            error_metrics,
            constraint_error,
            particles: solver.particle_count(),
            frames,
            sim_time,
        })
    }

    fn validate(
        &self,
        solver: &FluidSolver,
        metrics: &ErrorMetrics,
        constraint_error: f32,
    ) -> Vec<CheckResult> {
        let positions = &solver.body().positions;
        let mut checks = Vec::new();

        if let Some(ref bounds) = self.expected.position_bounds {
            checks.push(validate_position_bounds(positions, bounds));
        }
        if let Some(ref conservation) = self.expected.conservation {
            checks.push(validate_conservation(metrics, conservation));
        }
        if let Some(ref density) = self.expected.density_error {
            checks.push(validate_density_error(constraint_error, density));
        }
        if let Some(ref settling) = self.expected.settling {
            checks.push(validate_settling(positions, settling));
        }
        if let Some(ref spreading) = self.expected.spreading {
            checks.push(validate_spreading(positions, spreading));
        }
        checks
    }
}

/// Validate that particles remain within specified bounds
fn validate_position_bounds(positions: &[Vec3], bounds: &PositionBoundsCheck) -> CheckResult {
    let mut violations = 0;
    let mut max_violation = 0.0_f32;

    for p in positions {
        if !p.is_finite() {
            violations += 1;
            max_violation = f32::INFINITY;
            continue;
        }
        let below = (bounds.min - *p).max(Vec3::ZERO).max_element();
        let above = (*p - bounds.max).max(Vec3::ZERO).max_element();
        let violation = below.max(above);
        if violation > 0.0 {
            violations += 1;
            max_violation = max_violation.max(violation);
        }
    }

    if violations == 0 {
        CheckResult::new(
            "Position Bounds",
            true,
            format!("All {} particles inside", positions.len()),
        )
    } else {
        CheckResult::new(
            "Position Bounds",
            false,
            format!(
                "{} particles out of bounds (max violation: {:.6} m)",
                violations, max_violation
            ),
        )
    }
}

/// Validate conservation metrics
fn validate_conservation(metrics: &ErrorMetrics, check: &ConservationCheck) -> CheckResult {
    let passed = metrics.mass_conservation <= check.max_mass_error;
    let message = if passed {
        format!("Mass: {:.3}%", metrics.mass_conservation * 100.0)
    } else {
        format!(
            "Mass: {:.3}% (limit: {:.3}%)",
            metrics.mass_conservation * 100.0,
            check.max_mass_error * 100.0
        )
    };
    CheckResult::new("Conservation", passed, message)
}

/// Validate the residual compression of the final sub-step
fn validate_density_error(constraint_error: f32, check: &DensityErrorCheck) -> CheckResult {
    let passed = constraint_error.is_finite() && constraint_error <= check.max_constraint_error;
    CheckResult::new(
        "Density Error",
        passed,
        format!(
            "Mean |C|: {:.4} (limit: {:.4})",
            constraint_error, check.max_constraint_error
        ),
    )
}

/// Validate that no particle has risen above the settling height
fn validate_settling(positions: &[Vec3], check: &SettlingCheck) -> CheckResult {
    let unsettled = positions.iter().filter(|p| p.y > check.max_height).count();
    let max_height = positions.iter().map(|p| p.y).fold(f32::NEG_INFINITY, f32::max);

    if unsettled == 0 {
        CheckResult::new(
            "Settling",
            true,
            format!(
                "All {} particles settled (max height: {:.4} m, limit: {:.4} m)",
                positions.len(),
                max_height,
                check.max_height
            ),
        )
    } else {
        CheckResult::new(
            "Settling",
            false,
            format!(
                "{} / {} particles not settled (max height: {:.4} m, limit: {:.4} m)",
                unsettled,
                positions.len(),
                max_height,
                check.max_height
            ),
        )
    }
}

/// Validate that the fluid front has advanced along x
fn validate_spreading(positions: &[Vec3], check: &SpreadingCheck) -> CheckResult {
    let front = positions.iter().map(|p| p.x).fold(f32::NEG_INFINITY, f32::max);
    CheckResult::new(
        "Spreading",
        front > check.min_front_x,
        format!("Front at x = {:.3} m (must exceed {:.3} m)", front, check.min_front_x),
    )
}

impl TestResult {
    /// Print a summary of the test result
    pub fn print_summary(&self) {
        println!("\n{}", "=".repeat(80));
        println!("Test: {}", self.name);
        println!("{}", "=".repeat(80));
        println!("Status: {}", if self.passed { "PASSED" } else { "FAILED" });
        println!("Particles: {}", self.particles);
        println!("Frames: {}", self.frames);
        println!("Simulated time: {:.3} s", self.sim_time);
        println!("\nError Metrics:");
        println!("  Max density variation: {:.2}%", self.error_metrics.max_density_variation * 100.0);
        println!("  Mean density variation: {:.2}%", self.error_metrics.mean_density_variation * 100.0);
        println!("  Mean constraint error: {:.4}", self.constraint_error);
        println!("  Mass conservation: {:.3}%", self.error_metrics.mass_conservation * 100.0);
        println!("\nValidation Checks:");
        for check in &self.checks {
            let status = if check.passed { "PASS" } else { "FAIL" };
            print!("  [{}] {}", status, check.name);
            if let Some(ref msg) = check.message {
                print!(" - {}", msg);
            }
            println!();
        }
        println!("{}", "=".repeat(80));
    }
}

#[cfg(test)]
mod check_tests {
    use super::*;

    #[test]
    fn bounds_check_counts_violations() {
        let bounds = PositionBoundsCheck {
            min: Vec3::ZERO,
            max: Vec3::ONE,
        };
        let inside = [Vec3::splat(0.5), Vec3::ONE];
        assert!(validate_position_bounds(&inside, &bounds).passed);

        let outside = [Vec3::splat(0.5), Vec3::new(1.5, 0.5, 0.5), Vec3::NAN];
        let check = validate_position_bounds(&outside, &bounds);
        assert!(!check.passed);
        assert!(check.message.unwrap().starts_with("2 particles"));
    }

    #[test]
    fn spreading_and_settling_checks() {
        let positions = [Vec3::new(-1.0, 0.2, 0.0), Vec3::new(2.0, 0.1, 0.0)];
        assert!(validate_spreading(&positions, &SpreadingCheck { min_front_x: 1.0 }).passed);
        assert!(!validate_spreading(&positions, &SpreadingCheck { min_front_x: 3.0 }).passed);
        assert!(validate_settling(&positions, &SettlingCheck { max_height: 0.3 }).passed);
        assert!(!validate_settling(&positions, &SettlingCheck { max_height: 0.15 }).passed);
    }

    #[test]
    fn conservation_check_fails_on_lost_mass() {
        let metrics = |drift| ErrorMetrics {
            max_density_variation: 0.0,
            mean_density_variation: 0.0,
            mass_conservation: drift,
        };
        let check = ConservationCheck {
            max_mass_error: 0.001,
        };
        assert!(validate_conservation(&metrics(0.0), &check).passed);
        // One of 208 particles gone non-finite
        assert!(!validate_conservation(&metrics(1.0 / 208.0), &check).passed);
    }

    #[test]
    fn density_check_rejects_nan() {
        let check = DensityErrorCheck {
            max_constraint_error: 0.1,
        };
        assert!(validate_density_error(0.05, &check).passed);
        assert!(!validate_density_error(f32::NAN, &check).passed);
        assert!(!validate_density_error(0.2, &check).passed);
    }
}
