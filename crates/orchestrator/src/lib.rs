//! Orchestration Layer
//!
//! This crate turns a JSON scene description into a ready-to-step
//! [`FluidSolver`]:
//! - Scene configuration parsing and validation
//! - Lattice placement of fluid volumes
//! - Boundary shell generation around the container
//! - Solver construction with containment

#![warn(missing_docs)]

pub mod config;
pub mod domain;

use std::path::{Path, PathBuf};

use pbf_kernel::{FluidSolver, KernelError};
use thiserror::Error;

pub use config::{FluidVolume, SceneConfig};
pub use domain::Scene;

/// Errors raised while loading or building a scene.
#[derive(Debug, Error)]
pub enum SceneError {
    /// The scene file could not be read.
    #[error("failed to read scene file {}: {source}", path.display())]
    Io {
        /// File that failed to open
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
    /// The scene file is not valid JSON for a [`SceneConfig`].
    #[error("failed to parse scene JSON: {0}")]
    Parse(#[from] serde_json::Error),
    /// The configuration is well-formed but describes an unusable scene.
    #[error("invalid scene: {0}")]
    Invalid(String),
    /// Solver parameters or bounds rejected by the kernel.
    #[error(transparent)]
    Kernel(#[from] KernelError),
}

/// Build a solver for a scene configuration.
///
/// The configuration is validated, fluid and boundary particles are placed,
/// and predicted positions are contained to `config.container`.
pub fn build_solver(config: &SceneConfig) -> Result<FluidSolver, SceneError> {
    config.validate()?;
    let Scene {
        body,
        boundary,
        domain,
    } = domain::setup_scene(config)?;
    let solver = FluidSolver::new(config.solver.clone(), body, boundary, domain)?
        .with_containment(config.container);
    Ok(solver)
}

/// Create a complete simulation from a configuration file
///
/// # Example
/// ```no_run
/// use pbf_orchestrator::create_simulation;
///
/// let mut solver = create_simulation("configs/dam-break.json")?;
/// solver.step(1.0 / 60.0)?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn create_simulation(config_path: impl AsRef<Path>) -> Result<FluidSolver, SceneError> {
    let config_path = config_path.as_ref();
    tracing::info!("Creating simulation from config: {}", config_path.display());

    let config = SceneConfig::load(config_path)?;
    tracing::info!("Configuration loaded: {}", config.name);

    let solver = build_solver(&config)?;
    tracing::info!(
        fluid = solver.body().len(),
        boundary = solver.boundary().len(),
        "Simulation ready"
    );
    Ok(solver)
}
