//! Sealed-box conservation: nothing enters, leaves or blows up.

use glam::Vec3;
use pbf_kernel::{Aabb, SimulationKernel, SolverParams};
use pbf_orchestrator::{build_solver, FluidVolume, SceneConfig};

fn sealed_box() -> SceneConfig {
    SceneConfig {
        name: "sealed-box".to_string(),
        solver: SolverParams::default(),
        fluid: vec![FluidVolume {
            bounds: Aabb::new(Vec3::ZERO, Vec3::new(0.5, 0.5, 0.5)),
            exclusions: Vec::new(),
            velocity: Vec3::new(0.5, 0.0, -0.5),
        }],
        container: Aabb::new(Vec3::ZERO, Vec3::ONE),
        boundary_margin: 1.2,
        obstacles: Vec::new(),
        time_step: 1.0 / 60.0,
        frames: 30,
    }
}

#[test]
fn sealed_box_conserves_particles_and_mass() {
    let config = sealed_box();
    let mut solver = build_solver(&config).unwrap();
    let count = solver.particle_count();
    let mass = solver.total_mass();
    // floor((0.5 + 0.08) / 0.16) = 3 per axis
    assert_eq!(count, 27);

    for frame in 0..config.frames {
        solver.step(config.time_step).unwrap();

        assert_eq!(solver.particle_count(), count);
        let body = solver.body();
        for (i, p) in body.positions.iter().enumerate() {
            assert!(p.is_finite(), "frame {frame}: particle {i} position not finite");
            assert!(
                config.container.contains(*p),
                "frame {frame}: particle {i} left the container: {p}"
            );
        }
        assert!(body.velocities.read().iter().all(|v| v.is_finite()));
        assert!(body.densities.iter().all(|rho| rho.is_finite() && *rho > 0.0));
    }

    assert_eq!(solver.total_mass(), mass);
    let metrics = solver.error_metrics();
    eprintln!(
        "after {} frames: max density variation {:.3}, mean {:.3}",
        config.frames, metrics.max_density_variation, metrics.mean_density_variation
    );
    assert_eq!(metrics.mass_conservation, 0.0);
    assert!(metrics.max_density_variation.is_finite());
}

#[test]
fn fluid_settles_toward_the_floor() {
    let config = sealed_box();
    let mut solver = build_solver(&config).unwrap();
    let start = solver.body().centroid();
    for _ in 0..config.frames {
        solver.step(config.time_step).unwrap();
    }
    let end = solver.body().centroid();
    assert!(end.y < start.y, "centroid should drop: {start} -> {end}");
}

#[test]
fn small_lattice_drops_inside_boundary_box() {
    // 2 x 2 x 2 particles at rest spacing in the middle of a shelled box
    let mut config = sealed_box();
    config.fluid[0].bounds = Aabb::new(Vec3::splat(0.34), Vec3::splat(0.66));
    config.fluid[0].velocity = Vec3::ZERO;
    let mut solver = build_solver(&config).unwrap();
    assert_eq!(solver.particle_count(), 8);
    assert!(!solver.boundary().is_empty());

    solver.step(1.0 / 60.0).unwrap();

    for (i, v) in solver.body().velocities.read().iter().enumerate() {
        assert!(v.y < 0.0, "particle {i} should be falling, v = {v}");
    }
    for p in &solver.body().positions {
        assert!(config.container.contains(*p), "particle left the box: {p}");
    }
}
