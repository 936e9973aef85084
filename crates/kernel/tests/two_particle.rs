//! Two-particle symmetry tests.
//!
//! A lone pair is the smallest system where the density constraint does
//! anything. Whatever it does must be mirror-symmetric: the centroid stays
//! put and momentum stays zero.

use glam::Vec3;
use pbf_kernel::{
    Aabb, FluidBody, FluidBoundary, FluidSolver, SmoothingKernel, SolverParams, SurfaceTension,
};

fn pair_solver(params: SolverParams) -> FluidSolver {
    let kernel = SmoothingKernel::new(params.kernel_radius()).unwrap();
    let r = params.particle_radius;
    let body = FluidBody::new(vec![Vec3::new(-r, 0.0, 0.0), Vec3::new(r, 0.0, 0.0)], Vec3::ZERO);
    let boundary = FluidBoundary::empty(&kernel, params.rest_density);
    FluidSolver::new(params, body, boundary, Aabb::new(Vec3::splat(-1.0), Vec3::splat(1.0))).unwrap()
}

#[test]
fn bilateral_pair_attracts_symmetrically() {
    let params = SolverParams {
        gravity: Vec3::ZERO,
        surface_tension: SurfaceTension::OFF,
        relaxation_epsilon: 100.0,
        unilateral_constraint: false,
        ..SolverParams::default()
    };
    let mut solver = pair_solver(params);
    let initial_distance = solver.body().positions[0].distance(solver.body().positions[1]);

    for step in 0..3 {
        solver.step(1.0 / 60.0).unwrap();
        let x = &solver.body().positions;
        let v = solver.body().velocities.read();
        eprintln!(
            "step {step}: x0 = {:?}, x1 = {:?}, v0 = {:?}, v1 = {:?}",
            x[0], x[1], v[0], v[1]
        );
        assert!((x[0] + x[1]).length() < 1.0e-5, "centroid drifted: {:?}", x[0] + x[1]);
        assert!((v[0] + v[1]).length() < 1.0e-4, "momentum not zero: {:?}", v[0] + v[1]);
        assert!(x[0].y.abs() < 1.0e-6 && x[0].z.abs() < 1.0e-6, "pair left its axis");

        if step == 0 {
            let d = x[0].distance(x[1]);
            assert!(
                d < initial_distance,
                "under-dense pair should be pulled together: {d} >= {initial_distance}"
            );
        }
    }
}

#[test]
fn unilateral_pair_at_rest_stays_at_rest() {
    let params = SolverParams {
        gravity: Vec3::ZERO,
        surface_tension: SurfaceTension::OFF,
        ..SolverParams::default()
    };
    let mut solver = pair_solver(params);
    let before = solver.body().positions.clone();

    for _ in 0..3 {
        solver.step(1.0 / 60.0).unwrap();
    }

    assert_eq!(solver.body().positions, before);
    assert!(solver.body().velocities.read().iter().all(|v| *v == Vec3::ZERO));
    assert_eq!(solver.diagnostics().final_error(), Some(0.0));
}
