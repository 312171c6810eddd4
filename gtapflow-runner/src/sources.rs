//! Source resolution for the runner.
//!
//! Each configured series is fetched once over its full history, then
//! preprocessed the same way regardless of provider:
//! 1. drop entities that never report
//! 2. interpolate linearly over the whole history (trailing gaps carry the
//!    last observation)
//! 3. keep periods from `start_year` on
//! 4. apply overrides registered under the series id
//! 5. reduce to the configured year

use std::collections::HashMap;

use gtapflow_core::data::{
    CsvPanelProvider, DataError, FetchProgress, ImfBopCsvProvider, SeriesProvider, SeriesRequest,
    TracingProgress, WorldBankProvider,
};
use gtapflow_core::domain::{Period, Series};
use gtapflow_core::{OverrideTable, Panel};
use thiserror::Error;
use tracing::debug;

use crate::config::{ConfigError, PipelineConfig, ProviderKind, SourceSpec};

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("no provider registered for series '{0}'")]
    Unregistered(String),

    #[error("series '{series}': {source}")]
    Data {
        series: String,
        #[source]
        source: DataError,
    },

    #[error("series '{series}' has no data for {period}")]
    PeriodUnavailable { series: String, period: Period },

    #[error("config: {0}")]
    Config(#[from] ConfigError),
}

/// Providers keyed by series id, plus the overrides applied to every panel.
pub struct Sources {
    providers: HashMap<String, Box<dyn SeriesProvider>>,
    overrides: OverrideTable,
    progress: Box<dyn FetchProgress>,
}

impl Default for Sources {
    fn default() -> Self {
        Self::new()
    }
}

impl Sources {
    pub fn new() -> Self {
        Self {
            providers: HashMap::new(),
            overrides: OverrideTable::default(),
            progress: Box::new(TracingProgress),
        }
    }

    /// Build one provider per configured source.
    pub fn from_config(config: &PipelineConfig) -> Result<Self, SourceError> {
        config.validate_source_ids()?;
        let mut sources = Self::new().with_overrides(config.override_table()?);
        for spec in config.sources() {
            let id = spec.id();
            // Same id means the same source once the ids are validated.
            if sources.providers.contains_key(&id) {
                continue;
            }
            let provider = build_provider(spec).map_err(|source| SourceError::Data {
                series: id.clone(),
                source,
            })?;
            sources.providers.insert(id, provider);
        }
        Ok(sources)
    }

    /// Register `provider` for the series with id `series`.
    pub fn with_provider(mut self, series: impl Into<String>, provider: Box<dyn SeriesProvider>) -> Self {
        self.providers.insert(series.into(), provider);
        self
    }

    pub fn with_overrides(mut self, overrides: OverrideTable) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn with_progress(mut self, progress: Box<dyn FetchProgress>) -> Self {
        self.progress = progress;
        self
    }

    /// Fetch and preprocess the full panel for `spec`.
    pub fn panel(&self, spec: &SourceSpec, config: &PipelineConfig) -> Result<Panel, SourceError> {
        let id = spec.id();
        let provider = self
            .providers
            .get(&id)
            .ok_or_else(|| SourceError::Unregistered(id.clone()))?;

        let request = SeriesRequest::full_history(spec.indicator.clone());
        self.progress.on_start(provider.name(), &id);
        let fetched = provider.fetch_panel(&request);
        let counted = fetched.as_ref().map(Panel::entity_count).map_err(clone_error);
        self.progress.on_complete(provider.name(), &id, &counted);
        let raw = fetched.map_err(|source| SourceError::Data {
            series: id.clone(),
            source,
        })?;

        let panel = raw
            .renamed(id.clone())
            .drop_all_missing()
            .interpolate_linear()
            .since(Period(config.start_year))
            .apply_overrides(&self.overrides);

        let year = Period(config.year);
        if !panel.periods().contains(&year) {
            return Err(SourceError::PeriodUnavailable {
                series: id,
                period: year,
            });
        }
        debug!(
            series = %id,
            entities = panel.entity_count(),
            periods = panel.periods().len(),
            "preprocessed panel"
        );
        Ok(panel)
    }

    /// Fetch, preprocess and reduce `spec` to the configured year.
    pub fn series(&self, spec: &SourceSpec, config: &PipelineConfig) -> Result<Series, SourceError> {
        Ok(self.panel(spec, config)?.series_for(Period(config.year)))
    }
}

fn build_provider(spec: &SourceSpec) -> Result<Box<dyn SeriesProvider>, DataError> {
    let path = || {
        spec.path
            .clone()
            .ok_or_else(|| DataError::Other(format!("{}: source has no path", spec.id())))
    };
    Ok(match spec.provider {
        ProviderKind::WorldBank => Box::new(WorldBankProvider::new()?),
        ProviderKind::ImfCsv => {
            let side = spec
                .side
                .ok_or_else(|| DataError::Other(format!("{}: IMF source has no side", spec.id())))?;
            Box::new(ImfBopCsvProvider::new(path()?, side))
        }
        ProviderKind::CsvPanel => {
            let mut provider = CsvPanelProvider::new(path()?);
            if let Some(column) = &spec.entity_column {
                provider = provider.with_entity_column(column.clone());
            }
            if let Some(column) = &spec.indicator_column {
                provider = provider.with_indicator_column(column.clone());
            }
            Box::new(provider)
        }
    })
}

/// `DataError` is not `Clone`; progress only needs the message.
fn clone_error(e: &DataError) -> DataError {
    DataError::Other(e.to_string())
}
