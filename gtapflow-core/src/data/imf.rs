//! IMF Balance of Payments CSV export.
//!
//! The export has one row per series with a dotted `SERIES_CODE`
//! (`economy.account.d1.currency.freq`), a long-name `INDICATOR` column and one
//! column per year. Values are in millions of US dollars.

use super::provider::{DataError, SeriesProvider, SeriesRequest};
use super::table::StringTable;
use crate::panel::Panel;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use tracing::{debug, warn};

/// IMF values are reported in millions.
pub const IMF_UNIT: f64 = 1_000_000.0;

/// Debit or credit side of a BOP account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BopSide {
    /// Payments (`DB_T`).
    #[serde(rename = "DB_T")]
    Debit,
    /// Receipts (`CD_T`).
    #[serde(rename = "CD_T")]
    Credit,
}

impl BopSide {
    pub fn code(self) -> &'static str {
        match self {
            BopSide::Debit => "DB_T",
            BopSide::Credit => "CD_T",
        }
    }
}

impl fmt::Display for BopSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Parts of a dotted IMF series code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesCode<'a> {
    pub economy: &'a str,
    pub account: &'a str,
    pub detail: &'a str,
    pub currency: &'a str,
    pub frequency: &'a str,
}

impl<'a> SeriesCode<'a> {
    pub fn parse(code: &'a str) -> Option<Self> {
        let mut parts = code.split('.');
        let parsed = Self {
            economy: parts.next()?,
            account: parts.next()?,
            detail: parts.next()?,
            currency: parts.next()?,
            frequency: parts.next()?,
        };
        if parts.next().is_some() || parsed.economy.is_empty() {
            return None;
        }
        Some(parsed)
    }
}

pub struct ImfBopCsvProvider {
    path: PathBuf,
    side: BopSide,
}

impl ImfBopCsvProvider {
    pub fn new(path: impl Into<PathBuf>, side: BopSide) -> Self {
        Self {
            path: path.into(),
            side,
        }
    }
}

impl SeriesProvider for ImfBopCsvProvider {
    fn name(&self) -> &str {
        "imf_bop_csv"
    }

    /// `request.indicator` is the long name in the `INDICATOR` column, e.g.
    /// `"Compensation of employees"`.
    fn fetch_panel(&self, request: &SeriesRequest) -> Result<Panel, DataError> {
        let table = StringTable::read(&self.path)?;
        let codes = table.strings("SERIES_CODE")?;
        let indicators = table.strings("INDICATOR")?;
        let periods = table.period_columns();

        let mut columns = Vec::with_capacity(periods.len());
        for (name, period) in &periods {
            columns.push((*period, table.numbers(name)?));
        }

        let mut panel = Panel::new(format!("{}.{}", request.indicator, self.side));
        let mut matched = 0usize;
        let mut malformed = 0usize;

        for (row, (code, indicator)) in codes.iter().zip(&indicators).enumerate() {
            if indicator.as_deref() != Some(request.indicator.as_str()) {
                continue;
            }
            let Some(code) = code.as_deref() else {
                malformed += 1;
                continue;
            };
            let Some(parsed) = SeriesCode::parse(code) else {
                malformed += 1;
                continue;
            };
            if parsed.account != self.side.code() {
                continue;
            }
            matched += 1;
            for (period, values) in &columns {
                panel.insert(parsed.economy, *period, values[row]);
            }
        }

        if matched == 0 {
            return Err(DataError::IndicatorNotFound {
                indicator: format!("{} ({})", request.indicator, self.side),
            });
        }
        if malformed > 0 {
            warn!(
                path = table.path(),
                malformed, "skipped rows with unparseable SERIES_CODE"
            );
        }
        debug!(
            path = table.path(),
            indicator = %request.indicator,
            side = %self.side,
            rows = matched,
            "read IMF BOP export"
        );

        Ok(panel.scaled(IMF_UNIT))
    }
}
