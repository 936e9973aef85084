//! The reference scenarios, shared by the binary and `cargo test`.

use std::path::Path;

use glam::Vec3;

use crate::{
    ConservationCheck, DensityErrorCheck, ExpectedResult, PositionBoundsCheck, ReferenceTest,
    SettlingCheck, SpreadingCheck,
};

/// Slack on the container walls for position checks (m)
const WALL_TOLERANCE: f32 = 1.0e-4;

fn config_path(root: &Path, name: &str) -> String {
    root.join("configs").join(name).to_string_lossy().to_string()
}

/// Settling box
///
/// A hollow cube of fluid drops onto the container floor. After one second
/// every particle must be inside the container and below its starting top,
/// mass must be unchanged and compression must be mostly resolved.
pub fn settling_box(root: &Path) -> ReferenceTest {
    ReferenceTest {
        name: "Settling Box".to_string(),
        config_path: config_path(root, "settling-box.json"),
        frames: None,
        expected: ExpectedResult {
            position_bounds: Some(PositionBoundsCheck {
                min: Vec3::splat(-WALL_TOLERANCE),
                max: Vec3::new(0.8, 1.0, 0.8) + WALL_TOLERANCE,
            }),
            conservation: Some(ConservationCheck {
                max_mass_error: 1.0e-6,
            }),
            density_error: Some(DensityErrorCheck {
                max_constraint_error: 0.25,
            }),
            settling: Some(SettlingCheck { max_height: 0.7 }),
            spreading: None,
        },
    }
}

/// Dam break
///
/// The 4 x 8 x 3 m column collapses into the tank. The front must leave the
/// column footprint while everything stays inside the tank.
pub fn dam_break(root: &Path, frames: Option<u64>) -> ReferenceTest {
    ReferenceTest {
        name: "Dam Break".to_string(),
        config_path: config_path(root, "dam-break.json"),
        frames,
        expected: ExpectedResult {
            position_bounds: Some(PositionBoundsCheck {
                min: Vec3::new(-8.0, 0.0, -2.0) - WALL_TOLERANCE,
                max: Vec3::new(8.0, 10.0, 2.0) + WALL_TOLERANCE,
            }),
            conservation: Some(ConservationCheck {
                max_mass_error: 1.0e-6,
            }),
            density_error: None,
            settling: None,
            spreading: Some(SpreadingCheck { min_front_x: -3.6 }),
        },
    }
}

/// Get all reference tests rooted at `root`
pub fn all_tests(root: &Path) -> Vec<ReferenceTest> {
    vec![settling_box(root), dam_break(root, None)]
}
