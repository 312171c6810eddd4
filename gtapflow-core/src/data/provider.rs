//! Series provider trait and structured error types.
//!
//! The `SeriesProvider` trait abstracts over data sources (World Bank API, IMF
//! BOP export, plain CSV panels) so the pipeline never reaches for an agency
//! client directly and tests can inject in-memory panels.

use crate::domain::{MappingError, Period, RegionMapping};
use crate::panel::Panel;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tracing::{info, warn};

/// Structured error types for data operations.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("indicator not found: {indicator}")]
    IndicatorNotFound { indicator: String },

    #[error("missing column '{column}' in {path}")]
    MissingColumn { path: String, column: String },

    #[error("read {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("data error: {0}")]
    Other(String),
}

impl From<polars::prelude::PolarsError> for DataError {
    fn from(e: polars::prelude::PolarsError) -> Self {
        DataError::Other(format!("polars: {e}"))
    }
}

/// What to fetch: one indicator over a set of periods.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesRequest {
    pub indicator: String,
    pub periods: Vec<Period>,
}

impl SeriesRequest {
    pub fn new(indicator: impl Into<String>, periods: Vec<Period>) -> Self {
        Self {
            indicator: indicator.into(),
            periods,
        }
    }

    /// Every period the source has. Gap filling needs observations on both
    /// sides of the window, so the runner asks for the full history.
    pub fn full_history(indicator: impl Into<String>) -> Self {
        Self::new(indicator, Vec::new())
    }

    /// Inclusive period bounds, `None` when no periods were requested.
    pub fn bounds(&self) -> Option<(Period, Period)> {
        let first = self.periods.iter().min()?;
        let last = self.periods.iter().max()?;
        Some((*first, *last))
    }
}

/// A source of entity × period tables.
///
/// Retries and rate limiting are the provider's business; callers see one
/// blocking call per request.
pub trait SeriesProvider {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Fetch the panel for `request.indicator`, covering at least `request.periods`.
    fn fetch_panel(&self, request: &SeriesRequest) -> Result<Panel, DataError>;
}

/// A source of the entity → region mapping and its canonical order.
pub trait MappingSource {
    fn load(&self) -> Result<RegionMapping, MappingError>;
}

/// In-memory provider keyed by indicator. Used for tests and for panels that
/// were assembled by hand.
#[derive(Debug, Clone, Default)]
pub struct StaticProvider {
    panels: HashMap<String, Panel>,
}

impl StaticProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_panel(mut self, panel: Panel) -> Self {
        self.panels.insert(panel.name.clone(), panel);
        self
    }
}

impl SeriesProvider for StaticProvider {
    fn name(&self) -> &str {
        "static"
    }

    fn fetch_panel(&self, request: &SeriesRequest) -> Result<Panel, DataError> {
        self.panels
            .get(&request.indicator)
            .cloned()
            .ok_or_else(|| DataError::IndicatorNotFound {
                indicator: request.indicator.clone(),
            })
    }
}

/// Progress callback for multi-indicator fetches.
pub trait FetchProgress {
    fn on_start(&self, provider: &str, indicator: &str);

    fn on_complete(&self, provider: &str, indicator: &str, result: &Result<usize, DataError>);
}

/// Progress reporter that logs through `tracing`.
pub struct TracingProgress;

impl FetchProgress for TracingProgress {
    fn on_start(&self, provider: &str, indicator: &str) {
        info!(provider, indicator, "fetching");
    }

    fn on_complete(&self, provider: &str, indicator: &str, result: &Result<usize, DataError>) {
        match result {
            Ok(entities) => info!(provider, indicator, entities, "fetched"),
            Err(e) => warn!(provider, indicator, error = %e, "fetch failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_provider_returns_registered_panel() {
        let mut panel = Panel::new("GDP");
        panel.insert("A", Period(2020), Some(1.0));
        let provider = StaticProvider::new().with_panel(panel.clone());

        let got = provider
            .fetch_panel(&SeriesRequest::new("GDP", vec![Period(2020)]))
            .unwrap();
        assert_eq!(got, panel);

        let err = provider
            .fetch_panel(&SeriesRequest::new("POP", vec![Period(2020)]))
            .unwrap_err();
        assert!(matches!(err, DataError::IndicatorNotFound { .. }));
    }

    #[test]
    fn request_bounds() {
        let r = SeriesRequest::new("X", vec![Period(2022), Period(2015), Period(2019)]);
        assert_eq!(r.bounds(), Some((Period(2015), Period(2022))));
        assert_eq!(SeriesRequest::full_history("X").bounds(), None);
    }
}
