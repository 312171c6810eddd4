//! Dataset fingerprinting.
//!
//! A `DatasetHash` identifies the exact inputs a run consumed: every series
//! the pipeline read (name, entities, values) plus the region mapping.
//! Identical inputs produce identical hashes across runs and platforms.

use crate::domain::{RegionMapping, Series};
use serde::{Deserialize, Serialize};
use std::fmt;

/// BLAKE3 hex digest of the pipeline inputs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DatasetHash(pub String);

impl DatasetHash {
    pub fn from_hash(hash: &str) -> Self {
        Self(hash.to_string())
    }
}

impl fmt::Display for DatasetHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Incremental hasher over series and mappings.
///
/// Values are hashed by their bit pattern, missing values by a tag byte, so
/// `0.0` and missing never collide.
pub struct DatasetHasher {
    inner: blake3::Hasher,
}

impl DatasetHasher {
    pub fn new() -> Self {
        Self {
            inner: blake3::Hasher::new(),
        }
    }

    fn field(&mut self, s: &str) {
        self.inner.update(&(s.len() as u64).to_le_bytes());
        self.inner.update(s.as_bytes());
    }

    pub fn add_series(&mut self, series: &Series) -> &mut Self {
        self.inner.update(b"S");
        self.field(&series.name);
        self.inner.update(&(series.len() as u64).to_le_bytes());
        for (entity, value) in series.iter() {
            self.field(entity.as_str());
            match value {
                Some(v) => {
                    self.inner.update(&[1]);
                    self.inner.update(&v.to_bits().to_le_bytes());
                }
                None => {
                    self.inner.update(&[0]);
                }
            }
        }
        self
    }

    pub fn add_mapping(&mut self, mapping: &RegionMapping) -> &mut Self {
        self.inner.update(b"M");
        for (entity, region) in mapping.iter() {
            self.field(entity.as_str());
            self.field(region.as_str());
        }
        self.inner.update(b"O");
        for region in mapping.order().iter() {
            self.field(region.as_str());
        }
        self
    }

    pub fn finish(&self) -> DatasetHash {
        DatasetHash(self.inner.finalize().to_hex().to_string())
    }
}

impl Default for DatasetHasher {
    fn default() -> Self {
        Self::new()
    }
}

/// Hash a set of series and the mapping they were aggregated with.
///
/// Series are hashed in name order, so callers may pass them in any order.
pub fn dataset_hash<'a>(
    series: impl IntoIterator<Item = &'a Series>,
    mapping: &RegionMapping,
) -> DatasetHash {
    let mut sorted: Vec<&Series> = series.into_iter().collect();
    sorted.sort_by(|a, b| a.name.cmp(&b.name));

    let mut hasher = DatasetHasher::new();
    for s in sorted {
        hasher.add_series(s);
    }
    hasher.add_mapping(mapping);
    hasher.finish()
}
