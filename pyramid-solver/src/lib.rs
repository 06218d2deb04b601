//! Outcome classification for the stacked-pyramid game.
//!
//! Every position falls into one of four classes (CL, CR, CP, CN). The
//! classifier walks the move tree recursively, memoizing results in an
//! [`OutcomeCache`] keyed by fingerprint. Each fresh result is also stored for
//! every geometric equivalent and, with CL and CR swapped, for their color
//! flips, so a whole orbit is solved at once.

pub mod cache;
pub mod classifier;
pub mod movegen;
pub mod stats;

pub use cache::{default_cache_path, CacheError, OutcomeCache};
pub use classifier::Classifier;
pub use movegen::{children, MoveGenerator};
pub use stats::SolverStats;
