use super::ids::RegionCode;
use serde::{Deserialize, Serialize};

/// Aggregated values in canonical region order. Never contains missing values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionSeries {
    pub name: String,
    rows: Vec<(RegionCode, f64)>,
}

impl RegionSeries {
    pub(crate) fn from_rows(name: impl Into<String>, rows: Vec<(RegionCode, f64)>) -> Self {
        Self {
            name: name.into(),
            rows,
        }
    }

    pub fn renamed(self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rows: self.rows,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&RegionCode, f64)> {
        self.rows.iter().map(|(r, v)| (r, *v))
    }

    pub fn regions(&self) -> impl Iterator<Item = &RegionCode> {
        self.rows.iter().map(|(r, _)| r)
    }

    pub fn values(&self) -> Vec<f64> {
        self.rows.iter().map(|(_, v)| *v).collect()
    }

    pub fn get(&self, region: &RegionCode) -> Option<f64> {
        self.rows.iter().find(|(r, _)| r == region).map(|(_, v)| *v)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn total(&self) -> f64 {
        self.rows.iter().map(|(_, v)| v).sum()
    }
}
