//! Reference scenarios run through `cargo test`.

use std::path::PathBuf;

use crate::scenarios;

/// Workspace root, one level up from this crate
fn project_root() -> PathBuf {
    let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    manifest_dir
        .parent()
        .map(PathBuf::from)
        .expect("Could not find project root")
}

#[test]
fn test_settling_box() {
    let test = scenarios::settling_box(&project_root());
    let result = test.run().expect("Test execution failed");
    result.print_summary();
    assert!(result.passed, "Settling box test failed");
}

/// Shortened to half a second; the binary runs the full scene.
#[test]
fn test_dam_break_collapse() {
    let test = scenarios::dam_break(&project_root(), Some(30));
    let result = test.run().expect("Test execution failed");
    result.print_summary();
    assert_eq!(result.frames, 30);
    assert!(result.passed, "Dam break test failed");
}

#[test]
fn missing_config_reports_error() {
    let mut test = scenarios::settling_box(&project_root());
    test.config_path = "configs/missing.json".to_string();
    let err = test.run().err().expect("missing config must fail");
    assert!(err.contains("missing.json"), "unexpected error: {err}");
}
