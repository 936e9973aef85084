//! Full pipeline smoke test: a small free-falling cluster inside a box.

use glam::Vec3;
use pbf_kernel::{
    Aabb, FluidBody, FluidBoundary, FluidSolver, SimulationKernel, SmoothingKernel, SolverParams,
    SolverStage,
};

fn cluster_solver() -> FluidSolver {
    let params = SolverParams::default();
    let kernel = SmoothingKernel::new(params.kernel_radius()).unwrap();
    let d = params.particle_diameter();
    let positions = (0..8)
        .map(|i| {
            let cell = Vec3::new((i & 1) as f32, ((i >> 1) & 1) as f32, (i >> 2) as f32);
            (cell - Vec3::splat(0.5)) * d
        })
        .collect();
    let body = FluidBody::new(positions, Vec3::ZERO);
    let boundary = FluidBoundary::empty(&kernel, params.rest_density);
    let domain = Aabb::new(Vec3::splat(-2.0), Vec3::splat(2.0));
    FluidSolver::new(params, body, boundary, domain)
        .unwrap()
        .with_containment(domain)
}

#[test]
fn cluster_falls_under_gravity() {
    let mut solver = cluster_solver();
    let centroid_before = solver.body().centroid();
    solver.step(1.0 / 60.0).unwrap();

    assert_eq!(solver.stage(), SolverStage::Idle);
    assert_eq!(solver.particle_count(), 8);
    for (i, v) in solver.body().velocities.read().iter().enumerate() {
        assert!(v.is_finite(), "particle {i} velocity not finite: {v:?}");
        assert!(v.y < 0.0, "particle {i} should be falling, v = {v:?}");
    }
    let domain = solver.containment().unwrap();
    for p in &solver.body().positions {
        assert!(domain.contains(*p), "particle escaped: {p:?}");
    }
    assert!(solver.body().centroid().y < centroid_before.y);
}

#[test]
fn containment_holds_over_many_steps() {
    let mut solver = cluster_solver();
    // 1.2 s of free fall from the center reaches the floor of a 2 m half-box.
    for _ in 0..72 {
        solver.step(1.0 / 60.0).unwrap();
    }
    let domain = solver.containment().unwrap();
    let bounds = solver.fluid_bounds().unwrap();
    eprintln!("fluid bounds after 72 steps: {bounds:?}");
    assert!(domain.contains(bounds.min) && domain.contains(bounds.max));
    assert!(bounds.min.y < -1.5, "cluster should have reached the floor: {bounds:?}");
    assert_eq!(solver.error_metrics().mass_conservation, 0.0);
}
