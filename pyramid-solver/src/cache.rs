//! Persistent outcome cache.
//!
//! File format (JSON, one document per pyramid size):
//!
//! ```text
//! {
//!   "format": "pyramid-outcomes",
//!   "version": 1,
//!   "layers": 3,
//!   "count": 100601,
//!   "checksum": "<xxh64 of every `fingerprint:tag\n` line, hex>",
//!   "entries": { "E-EEEE-EEEEEEEEE": "CP", ... }
//! }
//! ```
//!
//! Entries are sorted by fingerprint so the file is deterministic.

use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use pyramid_core::{Fingerprint, FingerprintError, Outcome, Position};
use serde::{Deserialize, Serialize};
use xxhash_rust::xxh64::xxh64;

const FORMAT: &str = "pyramid-outcomes";
const VERSION: u32 = 1;

/// Where a cache for `layers` lives unless told otherwise.
pub fn default_cache_path(layers: u8) -> PathBuf {
    PathBuf::from(format!("data/outcomes-n{layers}.json"))
}

#[derive(Debug, derive_more::Display, derive_more::Error, derive_more::From)]
pub enum CacheError {
    #[display("cache I/O failed: {_0}")]
    #[from]
    Io(io::Error),
    #[display("cache is not valid JSON: {_0}")]
    #[from]
    Json(serde_json::Error),
    #[display("unsupported cache format {format:?} version {version}")]
    UnsupportedFormat { format: String, version: u32 },
    #[display("cache holds {found}-layer outcomes, expected {expected} layers")]
    LayerMismatch { expected: u8, found: u8 },
    #[display("cache header says {expected} entries, found {found}")]
    CountMismatch { expected: usize, found: usize },
    #[display("cache checksum mismatch: stored {stored}, computed {computed}")]
    ChecksumMismatch { stored: String, computed: String },
    #[display("cache key {key:?} is not a valid fingerprint: {source}")]
    BadKey {
        key: String,
        source: FingerprintError,
    },
}

#[derive(Serialize, Deserialize)]
struct CacheFile {
    format: String,
    version: u32,
    layers: u8,
    count: usize,
    checksum: String,
    entries: BTreeMap<String, Outcome>,
}

/// Fingerprint → outcome map bound to one pyramid size.
///
/// Append-only: once a fingerprint has an outcome it is never replaced.
#[derive(Debug, Clone)]
pub struct OutcomeCache {
    layers: u8,
    entries: HashMap<Fingerprint, Outcome>,
}

impl OutcomeCache {
    pub fn new(layers: u8) -> Self {
        Self {
            layers,
            entries: HashMap::new(),
        }
    }

    #[inline]
    pub fn layers(&self) -> u8 {
        self.layers
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub fn get(&self, fingerprint: &Fingerprint) -> Option<Outcome> {
        self.entries.get(fingerprint).copied()
    }

    /// Record an outcome unless the fingerprint already has one.
    /// Returns whether a new entry was added.
    pub fn record(&mut self, fingerprint: Fingerprint, outcome: Outcome) -> bool {
        match self.entries.entry(fingerprint) {
            Entry::Occupied(existing) => {
                debug_assert_eq!(
                    *existing.get(),
                    outcome,
                    "conflicting outcome for {}",
                    existing.key()
                );
                false
            }
            Entry::Vacant(slot) => {
                slot.insert(outcome);
                true
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Fingerprint, Outcome)> {
        self.entries.iter().map(|(fp, &outcome)| (fp, outcome))
    }

    /// Number of entries per outcome class, in `Outcome::ALL` order.
    pub fn distribution(&self) -> [(Outcome, usize); 4] {
        let mut counts = Outcome::ALL.map(|outcome| (outcome, 0));
        for &outcome in self.entries.values() {
            if let Some((_, count)) = counts.iter_mut().find(|(o, _)| *o == outcome) {
                *count += 1;
            }
        }
        counts
    }

    /// Write the cache as JSON to `path`, replacing any previous file.
    ///
    /// Writes `<path>.tmp` first and renames it into place.
    pub fn save(&self, path: &Path) -> Result<usize, CacheError> {
        let entries: BTreeMap<String, Outcome> = self
            .entries
            .iter()
            .map(|(fp, &outcome)| (fp.as_str().to_owned(), outcome))
            .collect();
        let document = CacheFile {
            format: FORMAT.to_owned(),
            version: VERSION,
            layers: self.layers,
            count: entries.len(),
            checksum: checksum(&entries),
            entries,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let tmp = tmp_path(path);
        let mut writer = BufWriter::new(File::create(&tmp)?);
        serde_json::to_writer(&mut writer, &document)?;
        writer.flush()?;
        drop(writer);
        fs::rename(&tmp, path)?;

        Ok(document.count)
    }

    /// Load the cache for `layers` from `path`.
    ///
    /// A missing file is an empty cache. Anything else that is not a valid
    /// cache for exactly this pyramid size is an error.
    pub fn load(path: &Path, layers: u8) -> Result<Self, CacheError> {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::new(layers)),
            Err(e) => return Err(e.into()),
        };
        let document: CacheFile = serde_json::from_reader(BufReader::new(file))?;

        if document.format != FORMAT || document.version != VERSION {
            return Err(CacheError::UnsupportedFormat {
                format: document.format,
                version: document.version,
            });
        }
        if document.layers != layers {
            return Err(CacheError::LayerMismatch {
                expected: layers,
                found: document.layers,
            });
        }
        if document.count != document.entries.len() {
            return Err(CacheError::CountMismatch {
                expected: document.count,
                found: document.entries.len(),
            });
        }
        let computed = checksum(&document.entries);
        if computed != document.checksum {
            return Err(CacheError::ChecksumMismatch {
                stored: document.checksum,
                computed,
            });
        }

        let mut entries = HashMap::with_capacity(document.count);
        for (key, outcome) in document.entries {
            let position = Position::from_fingerprint(&key)
                .map_err(|source| CacheError::BadKey {
                    key: key.clone(),
                    source,
                })?;
            if position.layers() != layers {
                return Err(CacheError::LayerMismatch {
                    expected: layers,
                    found: position.layers(),
                });
            }
            entries.insert(position.fingerprint(), outcome);
        }

        Ok(Self { layers, entries })
    }
}

/// Hex xxh64 over the sorted `fingerprint:tag` lines.
fn checksum(entries: &BTreeMap<String, Outcome>) -> String {
    let mut data = String::with_capacity(entries.len() * 24);
    for (fingerprint, outcome) in entries {
        data.push_str(fingerprint);
        data.push(':');
        data.push_str(&outcome.to_string());
        data.push('\n');
    }
    format!("{:016x}", xxh64(data.as_bytes(), 0))
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}
