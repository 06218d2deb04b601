//! Reference Parity Testing
//!
//! Loads N=3 reference positions with known answers and verifies, for each:
//! - Child count per player
//! - Geometric orbit size
//! - Outcome class (fresh cache per position and one shared cache)

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use pyramid_core::{Outcome, Player, Position};
use pyramid_solver::{children, Classifier, OutcomeCache};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct TestData {
    layers: u8,
    positions: Vec<ReferencePosition>,
}

#[derive(Debug, Deserialize)]
struct ReferencePosition {
    fingerprint: String,
    left_children: usize,
    right_children: usize,
    orbit_size: usize,
    outcome: Outcome,
}

/// Load test positions from the fixture file
fn load_test_positions() -> TestData {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/reference_positions.json");
    let file = File::open(&path).expect("Failed to open reference positions file");
    serde_json::from_reader(BufReader::new(file)).expect("Failed to parse JSON")
}

#[test]
fn test_reference_parity() {
    let data = load_test_positions();
    assert_eq!(data.layers, 3);
    println!("Loaded {} reference positions", data.positions.len());

    let mut shared = OutcomeCache::new(data.layers);
    let mut failures: Vec<String> = Vec::new();

    for reference in &data.positions {
        let mut errors: Vec<String> = Vec::new();
        let position = Position::from_fingerprint(&reference.fingerprint)
            .expect("fixture fingerprints are valid");

        let left = children(&position, Player::Left).count();
        let right = children(&position, Player::Right).count();
        if (left, right) != (reference.left_children, reference.right_children) {
            errors.push(format!(
                "children: expected L={} R={}, got L={} R={}",
                reference.left_children, reference.right_children, left, right
            ));
        }

        let orbit = position.orbit().len();
        if orbit != reference.orbit_size {
            errors.push(format!(
                "orbit size: expected {}, got {}",
                reference.orbit_size, orbit
            ));
        }

        let mut fresh = OutcomeCache::new(data.layers);
        let outcome = Classifier::new(&mut fresh).classify(&position);
        if outcome != reference.outcome {
            errors.push(format!(
                "outcome: expected {}, got {}",
                reference.outcome, outcome
            ));
        }

        let shared_outcome = Classifier::new(&mut shared).classify(&position);
        if shared_outcome != reference.outcome {
            errors.push(format!(
                "outcome with shared cache: expected {}, got {}",
                reference.outcome, shared_outcome
            ));
        }

        if !errors.is_empty() {
            failures.push(format!("{}\n  {}", reference.fingerprint, errors.join("\n  ")));
        }
    }

    println!("\n=== Parity Test Results ===");
    println!("Passed: {}", data.positions.len() - failures.len());
    println!("Failed: {}", failures.len());
    for f in failures.iter().take(10) {
        println!("\n{}", f);
    }

    assert!(failures.is_empty(), "{} positions failed parity check", failures.len());
}

/// Every reference outcome also holds for the color-flipped position, mapped.
#[test]
fn test_reference_flip_parity() {
    let data = load_test_positions();
    let mut cache = OutcomeCache::new(data.layers);
    let mut classifier = Classifier::new(&mut cache);

    for reference in &data.positions {
        let flipped = Position::from_fingerprint(&reference.fingerprint)
            .expect("fixture fingerprints are valid")
            .flipped();
        assert_eq!(
            classifier.classify(&flipped),
            reference.outcome.flipped(),
            "flip of {}",
            reference.fingerprint
        );
    }
}

/// The whole-tree solve agrees with every reference position afterwards.
#[test]
fn test_full_solve_covers_references() {
    let data = load_test_positions();
    let mut cache = OutcomeCache::new(data.layers);
    let root = Classifier::new(&mut cache).classify(&Position::new(data.layers).unwrap());
    assert_eq!(root, Outcome::PreviousWins);

    let mut classifier = Classifier::new(&mut cache);
    for reference in &data.positions {
        let position = Position::from_fingerprint(&reference.fingerprint).unwrap();
        assert_eq!(classifier.classify(&position), reference.outcome, "{}", reference.fingerprint);
    }
}
