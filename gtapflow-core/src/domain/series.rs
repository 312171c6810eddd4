//! Single-period series keyed by entity.
//!
//! `None` is the missing sentinel. Zero is a real observation and never stands
//! in for missing data. Non-finite inputs are stored as missing so that NaN
//! never leaks into sums.

use super::ids::EntityCode;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Entity → value mapping for one measured quantity at one period.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Series {
    pub name: String,
    values: BTreeMap<EntityCode, Option<f64>>,
}

impl Series {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: BTreeMap::new(),
        }
    }

    /// Build a series from `(entity, value)` pairs. Later duplicates win.
    pub fn from_pairs<I, E>(name: impl Into<String>, pairs: I) -> Self
    where
        I: IntoIterator<Item = (E, Option<f64>)>,
        E: Into<EntityCode>,
    {
        let mut series = Self::new(name);
        for (entity, value) in pairs {
            series.insert(entity, value);
        }
        series
    }

    pub fn insert(&mut self, entity: impl Into<EntityCode>, value: Option<f64>) {
        self.values
            .insert(entity.into(), value.filter(|v| v.is_finite()));
    }

    /// Value for `entity`: `None` if absent, `Some(None)` if present but missing.
    pub fn get(&self, entity: &EntityCode) -> Option<Option<f64>> {
        self.values.get(entity).copied()
    }

    /// Present (non-missing) value for `entity`.
    pub fn value(&self, entity: &EntityCode) -> Option<f64> {
        self.values.get(entity).copied().flatten()
    }

    pub fn contains(&self, entity: &EntityCode) -> bool {
        self.values.contains_key(entity)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&EntityCode, Option<f64>)> {
        self.values.iter().map(|(e, v)| (e, *v))
    }

    /// Entities with a present value.
    pub fn present(&self) -> impl Iterator<Item = (&EntityCode, f64)> {
        self.values
            .iter()
            .filter_map(|(e, v)| v.map(|value| (e, value)))
    }

    pub fn entities(&self) -> impl Iterator<Item = &EntityCode> {
        self.values.keys()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn present_count(&self) -> usize {
        self.values.values().filter(|v| v.is_some()).count()
    }

    pub fn missing_count(&self) -> usize {
        self.len() - self.present_count()
    }

    /// Sum over present values. Missing entries are absent, not zero.
    pub fn total(&self) -> f64 {
        self.present().map(|(_, v)| v).sum()
    }

    /// New series with every present value multiplied by `factor`.
    pub fn scaled(&self, factor: f64) -> Self {
        self.map_present(|v| v * factor)
    }

    /// New series with `f` applied to every present value.
    pub fn map_present(&self, f: impl Fn(f64) -> f64) -> Self {
        Self {
            name: self.name.clone(),
            values: self
                .values
                .iter()
                .map(|(e, v)| (e.clone(), v.map(&f).filter(|x| x.is_finite())))
                .collect(),
        }
    }

    /// New series keeping only present values.
    pub fn without_missing(&self) -> Self {
        Self {
            name: self.name.clone(),
            values: self
                .values
                .iter()
                .filter(|(_, v)| v.is_some())
                .map(|(e, v)| (e.clone(), *v))
                .collect(),
        }
    }

    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: self.values.clone(),
        }
    }
}
