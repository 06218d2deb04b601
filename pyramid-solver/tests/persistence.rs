//! Solve, save, reload: a warm cache answers without re-evaluating.

use std::fs;
use std::path::PathBuf;

use pyramid_core::{Outcome, Position};
use pyramid_solver::{CacheError, Classifier, OutcomeCache};

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir()
        .join(format!("pyramid-persistence-{}", std::process::id()))
        .join(name)
}

#[test]
fn test_warm_cache_skips_evaluation() {
    let path = temp_path("outcomes-n2.json");
    let root = Position::new(2).unwrap();

    let mut cache = OutcomeCache::new(2);
    let outcome = Classifier::new(&mut cache).classify(&root);
    assert_eq!(outcome, Outcome::NextWins);
    let saved = cache.save(&path).unwrap();
    assert_eq!(saved, cache.len());

    let mut reloaded = OutcomeCache::load(&path, 2).unwrap();
    assert_eq!(reloaded.len(), cache.len());
    for (fp, outcome) in cache.iter() {
        assert_eq!(reloaded.get(fp), Some(outcome));
    }

    let mut classifier = Classifier::new(&mut reloaded);
    assert_eq!(classifier.classify(&root), Outcome::NextWins);
    assert_eq!(classifier.stats().positions_evaluated, 0);
    assert_eq!(classifier.stats().cache_hits, 1);

    fs::remove_file(&path).ok();
}

#[test]
fn test_cache_for_other_size_is_refused() {
    let path = temp_path("outcomes-n1.json");
    let mut cache = OutcomeCache::new(1);
    Classifier::new(&mut cache).classify(&Position::new(1).unwrap());
    cache.save(&path).unwrap();

    let err = OutcomeCache::load(&path, 3).unwrap_err();
    assert!(matches!(err, CacheError::LayerMismatch { expected: 3, found: 1 }));

    fs::remove_file(&path).ok();
}

#[test]
fn test_save_overwrites_previous_file() {
    let path = temp_path("overwrite.json");

    let mut small = OutcomeCache::new(2);
    Classifier::new(&mut small).classify(&Position::from_fingerprint("E-LRLL").unwrap());
    small.save(&path).unwrap();

    let mut full = OutcomeCache::new(2);
    Classifier::new(&mut full).classify(&Position::new(2).unwrap());
    full.save(&path).unwrap();

    let loaded = OutcomeCache::load(&path, 2).unwrap();
    assert_eq!(loaded.len(), full.len());

    fs::remove_file(&path).ok();
}
