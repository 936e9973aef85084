//! Scene configuration parsing and validation

use std::fs;
use std::path::Path;

use glam::Vec3;
use pbf_kernel::{Aabb, SolverParams};
use serde::{Deserialize, Serialize};

use crate::SceneError;

/// Main scene configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneConfig {
    /// Human-readable scene name
    pub name: String,
    /// Solver parameters
    #[serde(default)]
    pub solver: SolverParams,
    /// Fluid volumes, each filled with a particle lattice
    pub fluid: Vec<FluidVolume>,
    /// Inner bounds of the container the fluid lives in
    pub container: Aabb,
    /// Thickness of the boundary shell around the container, in particle
    /// diameters
    #[serde(default = "default_boundary_margin")]
    pub boundary_margin: f32,
    /// Extra boundary sample points (e.g. a voxelized obstacle)
    #[serde(default)]
    pub obstacles: Vec<Vec3>,
    /// Frame time step (seconds); each frame runs `solver.sub_steps` sub-steps
    #[serde(default = "default_time_step")]
    pub time_step: f32,
    /// Number of frames to run
    #[serde(default = "default_frames")]
    pub frames: u64,
}

/// A box of fluid particles
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FluidVolume {
    /// Region to fill
    pub bounds: Aabb,
    /// Sub-regions left empty
    #[serde(default)]
    pub exclusions: Vec<Aabb>,
    /// Initial velocity of every particle in the volume (m/s)
    #[serde(default)]
    pub velocity: Vec3,
}

// Default values
fn default_boundary_margin() -> f32 {
    1.2
}

fn default_time_step() -> f32 {
    1.0 / 60.0
}

fn default_frames() -> u64 {
    120
}

impl SceneConfig {
    /// Load configuration from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SceneError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| SceneError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&contents)
    }

    /// Parse and validate a configuration from a JSON string
    pub fn from_json(json: &str) -> Result<Self, SceneError> {
        let config: SceneConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// The classic dam break: a 4 x 8 x 3 m column of water released at one
    /// end of a 16 x 10 x 4 m tank.
    pub fn dam_break() -> Self {
        Self {
            name: "dam-break".to_string(),
            solver: SolverParams::default(),
            fluid: vec![FluidVolume {
                bounds: Aabb::new(Vec3::new(-8.0, 0.0, -1.0), Vec3::new(-4.0, 8.0, 2.0)),
                exclusions: Vec::new(),
                velocity: Vec3::ZERO,
            }],
            container: Aabb::new(Vec3::new(-8.0, 0.0, -2.0), Vec3::new(8.0, 10.0, 2.0)),
            boundary_margin: default_boundary_margin(),
            obstacles: Vec::new(),
            time_step: default_time_step(),
            frames: default_frames(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), SceneError> {
        self.solver.validate()?;
        self.container.validate()?;

        if self.fluid.is_empty() {
            return Err(SceneError::Invalid("at least one fluid volume is required".to_string()));
        }
        for (i, volume) in self.fluid.iter().enumerate() {
            volume.bounds.validate()?;
            for exclusion in &volume.exclusions {
                exclusion.validate()?;
            }
            if !self.container.contains(volume.bounds.min) || !self.container.contains(volume.bounds.max) {
                return Err(SceneError::Invalid(format!(
                    "fluid volume {i} extends outside the container"
                )));
            }
            if !volume.velocity.is_finite() {
                return Err(SceneError::Invalid(format!(
                    "fluid volume {i} has a non-finite velocity"
                )));
            }
        }

        // Below one diameter the shell may come out with no layer on some side.
        if !self.boundary_margin.is_finite() || self.boundary_margin < 1.0 {
            return Err(SceneError::Invalid(
                "boundary_margin must be at least 1 particle diameter".to_string(),
            ));
        }

        let outer = self.shell_bounds();
        if let Some(p) = self.obstacles.iter().find(|p| !outer.contains(**p)) {
            return Err(SceneError::Invalid(format!(
                "obstacle sample {p} lies outside the boundary shell"
            )));
        }

        if !self.time_step.is_finite() || self.time_step <= 0.0 {
            return Err(SceneError::Invalid("time_step must be positive".to_string()));
        }
        if self.frames == 0 {
            return Err(SceneError::Invalid("frames must be at least 1".to_string()));
        }

        Ok(())
    }

    /// Outer bounds of the boundary shell, which is also the region covered
    /// by the spatial hash.
    pub fn shell_bounds(&self) -> Aabb {
        self.container
            .expanded(self.boundary_margin * self.solver.particle_diameter())
    }

    /// Simulated time covered by all frames (seconds)
    pub fn duration(&self) -> f64 {
        self.frames as f64 * self.time_step as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dam_break_is_valid() {
        let config = SceneConfig::dam_break();
        assert!(config.validate().is_ok());
        assert!((config.duration() - 2.0).abs() < 1e-6);
        let outer = config.shell_bounds();
        assert!((outer.min.x - (-8.0 - 1.2 * 0.16)).abs() < 1e-5);
    }

    #[test]
    fn minimal_json_uses_defaults() {
        let json = r#"{
            "name": "minimal",
            "fluid": [{ "bounds": { "min": [0, 0, 0], "max": [1, 1, 1] } }],
            "container": { "min": [0, 0, 0], "max": [2, 2, 2] }
        }"#;
        let config = SceneConfig::from_json(json).unwrap();
        assert_eq!(config.solver, SolverParams::default());
        assert_eq!(config.boundary_margin, 1.2);
        assert_eq!(config.frames, 120);
        assert_eq!(config.fluid[0].velocity, Vec3::ZERO);
        assert!(config.fluid[0].exclusions.is_empty());
        assert!(config.obstacles.is_empty());
    }

    #[test]
    fn partial_solver_block_keeps_other_defaults() {
        let json = r#"{
            "name": "tuned",
            "solver": { "sub_steps": 4, "surface_tension": { "strength": 0.0 } },
            "fluid": [{ "bounds": { "min": [0, 0, 0], "max": [1, 1, 1] } }],
            "container": { "min": [0, 0, 0], "max": [2, 2, 2] }
        }"#;
        let config = SceneConfig::from_json(json).unwrap();
        assert_eq!(config.solver.sub_steps, 4);
        assert_eq!(config.solver.constraint_iterations, 2);
        assert_eq!(config.solver.surface_tension.strength, 0.0);
        assert_eq!(config.solver.surface_tension.exponent, 4);
    }

    #[test]
    fn test_validation_fluid_outside_container() {
        let mut config = SceneConfig::dam_break();
        config.fluid[0].bounds.max.y = 12.0;
        assert!(matches!(config.validate(), Err(SceneError::Invalid(_))));

        config.fluid[0].bounds.max.y = 8.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_solver_params() {
        let mut config = SceneConfig::dam_break();
        config.solver.constraint_iterations = 0;
        assert!(matches!(config.validate(), Err(SceneError::Kernel(_))));
    }

    #[test]
    fn test_validation_margin_and_timing() {
        let mut config = SceneConfig::dam_break();
        config.boundary_margin = 0.5;
        assert!(config.validate().is_err());

        let mut config = SceneConfig::dam_break();
        config.time_step = 0.0;
        assert!(config.validate().is_err());

        let mut config = SceneConfig::dam_break();
        config.frames = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_obstacles() {
        let mut config = SceneConfig::dam_break();
        config.obstacles = vec![Vec3::new(0.0, 1.0, 0.0)];
        assert!(config.validate().is_ok());

        config.obstacles.push(Vec3::new(50.0, 0.0, 0.0));
        assert!(config.validate().is_err());
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        assert!(matches!(
            SceneConfig::from_json("{ not json"),
            Err(SceneError::Parse(_))
        ));
    }
}
