//! Reference test binary entry point
//!
//! Runs every reference scenario from the workspace root.

use std::path::Path;

use reference_tests::{scenarios, TestResult};

fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .init();

    tracing::info!("PBF Reference Test Suite");
    tracing::info!("========================");

    let tests = scenarios::all_tests(Path::new("."));
    tracing::info!("Found {} reference tests", tests.len());

    let mut results: Vec<TestResult> = Vec::new();
    let mut passed_count = 0;
    let mut failed_count = 0;

    for test in tests {
        match test.run() {
            Ok(result) => {
                if result.passed {
                    passed_count += 1;
                } else {
                    failed_count += 1;
                }
                result.print_summary();
                results.push(result);
            }
            Err(e) => {
                eprintln!("\nERROR running test {}: {}", test.name, e);
                failed_count += 1;
            }
        }
    }

    // Print overall summary
    println!("\n{}", "=".repeat(80));
    println!("OVERALL SUMMARY");
    println!("{}", "=".repeat(80));
    println!("Total tests: {}", passed_count + failed_count);
    println!("Passed: {}", passed_count);
    println!("Failed: {}", failed_count);
    println!("{}", "=".repeat(80));

    // Exit with error code if any tests failed
    if failed_count > 0 {
        std::process::exit(1);
    }
}
