//! Manual data patches keyed by (series, entity, period).
//!
//! Stored as TOML:
//!
//! ```toml
//! [[overrides]]
//! series = "BM.TRF.PWKR.CD.DT"
//! entity = "SAU"
//! period = 2021
//! value = 41_000_000_000.0
//! note = "central bank release"
//! ```
//!
//! Omitting `value` forces the cell to missing.

use crate::domain::{EntityCode, Period};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OverrideError {
    #[error("read override file: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse override TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("duplicate override for {series}/{entity}/{period}")]
    Duplicate {
        series: String,
        entity: EntityCode,
        period: Period,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Override {
    pub series: String,
    pub entity: EntityCode,
    pub period: Period,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OverrideTable {
    #[serde(default)]
    pub overrides: Vec<Override>,
}

impl OverrideTable {
    pub fn new(overrides: Vec<Override>) -> Result<Self, OverrideError> {
        let table = Self { overrides };
        table.validate()?;
        Ok(table)
    }

    pub fn from_file(path: &Path) -> Result<Self, OverrideError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, OverrideError> {
        let table: Self = toml::from_str(content)?;
        table.validate()?;
        Ok(table)
    }

    /// Reject two overrides for the same cell.
    pub fn validate(&self) -> Result<(), OverrideError> {
        let mut seen = std::collections::BTreeSet::new();
        for o in &self.overrides {
            if !seen.insert((o.series.as_str(), &o.entity, o.period)) {
                return Err(OverrideError::Duplicate {
                    series: o.series.clone(),
                    entity: o.entity.clone(),
                    period: o.period,
                });
            }
        }
        Ok(())
    }

    pub fn for_series<'a>(&'a self, series: &'a str) -> impl Iterator<Item = &'a Override> + 'a {
        self.overrides.iter().filter(move |o| o.series == series)
    }

    pub fn len(&self) -> usize {
        self.overrides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.overrides.is_empty()
    }
}
