//! Recursive outcome classifier with symmetry and color-flip memoization.
//!
//! Every move strictly decreases `Position::potential`, so the move graph is
//! acyclic and plain recursion terminates without in-progress markers.

use pyramid_core::{Outcome, Player, Position};

use crate::cache::OutcomeCache;
use crate::movegen::children;
use crate::stats::SolverStats;

/// Memoized classifier over a borrowed cache.
pub struct Classifier<'a> {
    cache: &'a mut OutcomeCache,
    stats: SolverStats,
    /// Seconds between progress lines (0 = silent)
    log_interval_secs: u64,
    depth: u64,
}

impl<'a> Classifier<'a> {
    pub fn new(cache: &'a mut OutcomeCache) -> Self {
        Self {
            cache,
            stats: SolverStats::new(),
            log_interval_secs: 0,
            depth: 0,
        }
    }

    /// Print a progress line every `secs` seconds while classifying.
    pub fn with_log_interval(mut self, secs: u64) -> Self {
        self.log_interval_secs = secs;
        self
    }

    pub fn stats(&self) -> &SolverStats {
        &self.stats
    }

    pub fn cache(&self) -> &OutcomeCache {
        self.cache
    }

    /// Classify `position`, consulting and extending the cache.
    ///
    /// Panics if the position and the cache disagree on the pyramid size.
    pub fn classify(&mut self, position: &Position) -> Outcome {
        assert_eq!(
            position.layers(),
            self.cache.layers(),
            "position and cache are for different pyramid sizes"
        );
        self.lookup_or_evaluate(position)
    }

    fn lookup_or_evaluate(&mut self, position: &Position) -> Outcome {
        let fingerprint = position.fingerprint();
        if let Some(outcome) = self.cache.get(&fingerprint) {
            self.stats.cache_hits += 1;
            return outcome;
        }

        if let Some(outcome) = self.cache.get(&position.flipped().fingerprint()) {
            self.stats.flip_hits += 1;
            let outcome = outcome.flipped();
            if self.cache.record(fingerprint, outcome) {
                self.stats.entries_recorded += 1;
            }
            return outcome;
        }

        let outcome = self.evaluate(position);
        self.record_orbit(position, outcome);
        outcome
    }

    fn evaluate(&mut self, position: &Position) -> Outcome {
        if self.stats.should_log(self.log_interval_secs) {
            self.stats.log_progress(self.cache.len());
        }

        let outcome = if position.apex_occupied() {
            self.stats.terminal_apex += 1;
            Outcome::PreviousWins
        } else if position.reserve(Player::Left) == 0 {
            self.stats.terminal_reserve += 1;
            Outcome::RightWins
        } else if position.reserve(Player::Right) == 0 {
            self.stats.terminal_reserve += 1;
            Outcome::LeftWins
        } else {
            self.depth += 1;
            self.stats.max_depth = self.stats.max_depth.max(self.depth);
            let left = self.has_winning_reply(position, Player::Left);
            let right = self.has_winning_reply(position, Player::Right);
            self.depth -= 1;

            match (left, right) {
                (true, true) => Outcome::NextWins,
                (true, false) => Outcome::LeftWins,
                (false, true) => Outcome::RightWins,
                (false, false) => Outcome::PreviousWins,
            }
        };

        self.stats.record_outcome(outcome);
        outcome
    }

    /// Whether some move of `player` leads to a position good for them.
    /// Stops at the first one found.
    fn has_winning_reply(&mut self, position: &Position, player: Player) -> bool {
        for child in children(position, player) {
            if self.lookup_or_evaluate(&child).favors(player) {
                return true;
            }
        }
        false
    }

    /// Record `outcome` for every geometric equivalent and the flipped
    /// outcome for each of their color flips (up to 16 entries).
    fn record_orbit(&mut self, position: &Position, outcome: Outcome) {
        let flipped = outcome.flipped();
        for member in position.orbit() {
            let image = member.flipped();
            if self.cache.record(member.fingerprint(), outcome) {
                self.stats.entries_recorded += 1;
            }
            if self.cache.record(image.fingerprint(), flipped) {
                self.stats.entries_recorded += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pyramid_core::{Coord, Symmetry};

    fn pos(fingerprint: &str) -> Position {
        Position::from_fingerprint(fingerprint).unwrap()
    }

    fn classify_fresh(position: &Position) -> Outcome {
        let mut cache = OutcomeCache::new(position.layers());
        Classifier::new(&mut cache).classify(position)
    }

    #[test]
    fn test_solve_initial_position() {
        let mut cache = OutcomeCache::new(3);
        let mut classifier = Classifier::new(&mut cache);

        let outcome = classifier.classify(&Position::new(3).unwrap());

        assert_eq!(outcome, Outcome::PreviousWins);
        assert!(classifier.stats().positions_evaluated > 0);
        println!("Positions evaluated: {}", classifier.stats().positions_evaluated);
        println!("Cache entries: {}", classifier.cache().len());
    }

    #[test]
    fn test_small_pyramids() {
        assert_eq!(classify_fresh(&Position::new(1).unwrap()), Outcome::NextWins);
        assert_eq!(classify_fresh(&Position::new(2).unwrap()), Outcome::NextWins);
    }

    #[test]
    fn test_terminal_rules() {
        // apex wins for whoever filled it, whatever else is on the board
        assert_eq!(classify_fresh(&pos("L-LLRR-RRLRRLRLL")), Outcome::PreviousWins);
        assert_eq!(classify_fresh(&pos("E-LLLL-LLLRRRRRE")), Outcome::RightWins);
        assert_eq!(classify_fresh(&pos("E-RRRR-RRRLLLLLE")), Outcome::LeftWins);
    }

    #[test]
    fn test_known_positions() {
        let cases = [
            ("E-EEEE-REEEEEEEE", Outcome::LeftWins),
            ("E-EEEE-EREEEEEEE", Outcome::LeftWins),
            ("E-EEEE-EEEEREEEE", Outcome::LeftWins),
            ("E-EEEE-LEEEEEEEE", Outcome::RightWins),
            ("E-EEEE-ELEEEEEEE", Outcome::RightWins),
            ("E-EEEE-EEEELEEEE", Outcome::RightWins),
            ("E-EEEE-RLRRLLLRR", Outcome::LeftWins),
            ("E-REEE-RLRRLLLRE", Outcome::LeftWins),
            ("E-LEEE-RLRLRRLRL", Outcome::NextWins),
            ("E-EEEE-RLEEEEEEE", Outcome::PreviousWins),
        ];
        let mut cache = OutcomeCache::new(3);
        let mut classifier = Classifier::new(&mut cache);
        for (fp, expected) in cases {
            assert_eq!(classifier.classify(&pos(fp)), expected, "{fp}");
        }
    }

    #[test]
    fn test_classify_is_idempotent() {
        let mut cache = OutcomeCache::new(3);
        let position = pos("E-EEEE-RLRRLLLRR");

        let mut classifier = Classifier::new(&mut cache);
        let first = classifier.classify(&position);
        let evaluated = classifier.stats().positions_evaluated;
        let hits = classifier.stats().cache_hits;
        let entries = classifier.cache().len();

        let second = classifier.classify(&position);
        assert_eq!(first, second);
        assert_eq!(classifier.stats().positions_evaluated, evaluated);
        assert_eq!(classifier.cache().len(), entries);
        assert_eq!(classifier.stats().cache_hits, hits + 1);
    }

    #[test]
    fn test_cache_entries_are_never_replaced() {
        let mut cache = OutcomeCache::new(3);
        let position = pos("E-EEEE-RLEEEEEEE");
        Classifier::new(&mut cache).classify(&position);
        let snapshot: Vec<_> = cache.iter().map(|(fp, o)| (fp.clone(), o)).collect();

        Classifier::new(&mut cache).classify(&pos("E-EEEE-REEEEEEEE"));
        for (fp, outcome) in snapshot {
            assert_eq!(cache.get(&fp), Some(outcome));
        }
    }

    #[test]
    fn test_flip_maps_outcome() {
        for fp in [
            "E-EEEE-RLRRLLLRR",
            "E-LEEE-RLRLRRLRL",
            "E-EEEE-RLEEEEEEE",
            "E-EEEE-EREEEEEEE",
        ] {
            let position = pos(fp);
            let direct = classify_fresh(&position);
            assert_eq!(classify_fresh(&position.flipped()), direct.flipped(), "{fp}");
        }
    }

    #[test]
    fn test_flip_hit_records_fingerprint() {
        let position = pos("E-EEEE-EREEEEEEE");
        let flipped = position.flipped();

        // seed the cache with only the flipped image
        let mut cache = OutcomeCache::new(3);
        let flipped_outcome = classify_fresh(&flipped);
        cache.record(flipped.fingerprint(), flipped_outcome);

        let mut classifier = Classifier::new(&mut cache);
        let outcome = classifier.classify(&position);
        assert_eq!(outcome, flipped_outcome.flipped());
        assert_eq!(classifier.stats().flip_hits, 1);
        assert_eq!(classifier.stats().positions_evaluated, 0);
        assert_eq!(cache.get(&position.fingerprint()), Some(outcome));
    }

    #[test]
    fn test_orbit_consistency() {
        let mut cache = OutcomeCache::new(3);
        let position = pos("E-LEEE-LLLRRERER");
        let outcome = Classifier::new(&mut cache).classify(&position);

        for symmetry in Symmetry::ALL {
            let member = position.transformed(symmetry);
            assert_eq!(cache.get(&member.fingerprint()), Some(outcome));
            assert_eq!(
                cache.get(&member.flipped().fingerprint()),
                Some(outcome.flipped())
            );
            assert_eq!(classify_fresh(&member), outcome, "{symmetry:?}");
        }
    }

    #[test]
    fn test_cache_is_consistent_after_full_solve() {
        let mut cache = OutcomeCache::new(2);
        Classifier::new(&mut cache).classify(&Position::new(2).unwrap());
        assert!(!cache.is_empty());
        for (fp, outcome) in cache.iter() {
            let position = pos(fp.as_str());
            assert_eq!(
                cache.get(&position.flipped().fingerprint()),
                Some(outcome.flipped())
            );
            assert_eq!(classify_fresh(&position), outcome, "{fp}");
        }
    }

    #[test]
    fn test_corner_placement_is_left_win() {
        let position = Position::new(3)
            .unwrap()
            .place(Player::Right, Coord::new(2, 0, 0))
            .unwrap();
        assert_eq!(classify_fresh(&position), Outcome::LeftWins);
    }

    #[test]
    #[should_panic(expected = "different pyramid sizes")]
    fn test_rejects_cache_for_other_size() {
        let mut cache = OutcomeCache::new(2);
        Classifier::new(&mut cache).classify(&Position::new(3).unwrap());
    }
}
