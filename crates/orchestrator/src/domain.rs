//! Domain setup: fluid particle placement and boundary particle generation

use glam::Vec3;
use pbf_kernel::{Aabb, DoubleBuffer, FluidBody, FluidBoundary, SmoothingKernel};

use crate::config::SceneConfig;
use crate::SceneError;

/// Particles and spatial extent of a scene, ready for the solver.
#[derive(Debug, Clone)]
pub struct Scene {
    /// Fluid particles
    pub body: FluidBody,
    /// Static boundary samples (container shell plus obstacles)
    pub boundary: FluidBoundary,
    /// Region covered by the spatial hash
    pub domain: Aabb,
}

/// Fill `bounds` with a cubic lattice of particles of the given radius.
///
/// Each axis holds `floor((size + r) / d)` points at `min + r + k d`, so
/// adjacent boxes tile without a seam. Points inside any of `exclusions`
/// (boundary inclusive) are skipped. Order is x fastest, then y, then z.
pub fn fill_lattice(bounds: &Aabb, exclusions: &[Aabb], radius: f32) -> Vec<Vec3> {
    let d = 2.0 * radius;
    let counts = ((bounds.size() + Vec3::splat(radius)) / d).floor().max(Vec3::ZERO);
    let (nx, ny, nz) = (counts.x as usize, counts.y as usize, counts.z as usize);

    let mut positions = Vec::with_capacity(nx * ny * nz);
    for z in 0..nz {
        for y in 0..ny {
            for x in 0..nx {
                let p = bounds.min + Vec3::splat(radius) + Vec3::new(x as f32, y as f32, z as f32) * d;
                if exclusions.iter().any(|e| e.contains(p)) {
                    continue;
                }
                positions.push(p);
            }
        }
    }
    positions
}

/// Single-layer boundary shell around `container`.
///
/// The lattice of `container` expanded by `margin` diameters, minus
/// everything inside `container`.
pub fn boundary_shell(container: &Aabb, radius: f32, margin: f32) -> Vec<Vec3> {
    let outer = container.expanded(margin * 2.0 * radius);
    fill_lattice(&outer, std::slice::from_ref(container), radius)
}

/// Build the fluid body and boundary for a validated configuration.
pub fn setup_scene(config: &SceneConfig) -> Result<Scene, SceneError> {
    let params = &config.solver;
    let radius = params.particle_radius;
    let kernel = SmoothingKernel::new(params.kernel_radius())?;

    let mut positions = Vec::new();
    let mut velocities = Vec::new();
    for volume in &config.fluid {
        let filled = fill_lattice(&volume.bounds, &volume.exclusions, radius);
        tracing::debug!(
            bounds = ?volume.bounds,
            particles = filled.len(),
            "fluid volume filled"
        );
        velocities.extend(std::iter::repeat(volume.velocity).take(filled.len()));
        positions.extend(filled);
    }
    if positions.is_empty() {
        return Err(SceneError::Invalid(
            "fluid volumes produce no particles".to_string(),
        ));
    }

    let mut body = FluidBody::new(positions, Vec3::ZERO);
    body.velocities = DoubleBuffer::new(velocities);

    let mut boundary_positions = boundary_shell(&config.container, radius, config.boundary_margin);
    let shell = boundary_positions.len();
    boundary_positions.extend_from_slice(&config.obstacles);
    let boundary = FluidBoundary::new(boundary_positions, &kernel, params.rest_density);

    tracing::info!(
        fluid = body.len(),
        shell,
        obstacles = config.obstacles.len(),
        psi = boundary.psi(),
        "Domain setup complete"
    );

    Ok(Scene {
        body,
        boundary,
        domain: config.shell_bounds(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lattice_count_and_offset() {
        // (1.0 + 0.1) / 0.2 = 5.5 -> 5 points per axis
        let bounds = Aabb::new(Vec3::ZERO, Vec3::ONE);
        let points = fill_lattice(&bounds, &[], 0.1);
        assert_eq!(points.len(), 125);
        assert!((points[0] - Vec3::splat(0.1)).length() < 1e-6);
        assert!((points[1] - Vec3::new(0.3, 0.1, 0.1)).length() < 1e-6);
        assert!((points[124] - Vec3::splat(0.9)).length() < 1e-5);
    }

    #[test]
    fn thin_box_yields_nothing() {
        let bounds = Aabb::new(Vec3::ZERO, Vec3::new(1.0, 0.05, 1.0));
        assert!(fill_lattice(&bounds, &[], 0.1).is_empty());
    }

    #[test]
    fn exclusion_is_inclusive() {
        let bounds = Aabb::new(Vec3::ZERO, Vec3::ONE);
        // Exactly the middle lattice point at (0.5, 0.5, 0.5)
        let exclusion = Aabb::new(Vec3::splat(0.45), Vec3::splat(0.55));
        let points = fill_lattice(&bounds, &[exclusion], 0.1);
        assert_eq!(points.len(), 124);
        assert!(points.iter().all(|p| !exclusion.contains(*p)));
    }

    #[test]
    fn shell_surrounds_container() {
        let container = Aabb::new(Vec3::ZERO, Vec3::ONE);
        let shell = boundary_shell(&container, 0.05, 1.2);
        assert!(!shell.is_empty());
        assert!(shell.iter().all(|p| !container.contains(*p)));

        // At least one sample beyond each face
        assert!(shell.iter().any(|p| p.x < 0.0));
        assert!(shell.iter().any(|p| p.x > 1.0));
        assert!(shell.iter().any(|p| p.y < 0.0));
        assert!(shell.iter().any(|p| p.y > 1.0));
        assert!(shell.iter().any(|p| p.z < 0.0));
        assert!(shell.iter().any(|p| p.z > 1.0));
    }
}
