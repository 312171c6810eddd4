//! Wide CSV panels: one row per economy, one column per year.
//!
//! ```text
//! economy,2019,2020,2021
//! USA,21.4e12,21.0e12,23.3e12
//! ```
//!
//! Year headers may carry a `YR` prefix (World Bank bulk exports). When the
//! file stacks several indicators, set an indicator column and rows are
//! filtered by the requested indicator id.

use super::provider::{DataError, SeriesProvider, SeriesRequest};
use super::table::StringTable;
use crate::panel::Panel;
use std::path::PathBuf;
use tracing::debug;

pub struct CsvPanelProvider {
    path: PathBuf,
    entity_column: String,
    indicator_column: Option<String>,
}

impl CsvPanelProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entity_column: "economy".to_string(),
            indicator_column: None,
        }
    }

    pub fn with_entity_column(mut self, column: impl Into<String>) -> Self {
        self.entity_column = column.into();
        self
    }

    pub fn with_indicator_column(mut self, column: impl Into<String>) -> Self {
        self.indicator_column = Some(column.into());
        self
    }
}

impl SeriesProvider for CsvPanelProvider {
    fn name(&self) -> &str {
        "csv_panel"
    }

    fn fetch_panel(&self, request: &SeriesRequest) -> Result<Panel, DataError> {
        let table = StringTable::read(&self.path)?;
        let entities = table.strings(&self.entity_column)?;
        let keep: Vec<bool> = match &self.indicator_column {
            Some(column) => table
                .strings(column)?
                .into_iter()
                .map(|v| v.as_deref() == Some(request.indicator.as_str()))
                .collect(),
            None => vec![true; table.height()],
        };
        if !keep.iter().any(|k| *k) {
            return Err(DataError::IndicatorNotFound {
                indicator: request.indicator.clone(),
            });
        }

        let mut panel = Panel::new(request.indicator.clone());
        for (column, period) in table.period_columns() {
            let values = table.numbers(&column)?;
            for ((entity, value), keep) in entities.iter().zip(values).zip(&keep) {
                if let (Some(entity), true) = (entity, *keep) {
                    panel.insert(entity.as_str(), period, value);
                }
            }
        }

        debug!(
            path = table.path(),
            indicator = %request.indicator,
            entities = panel.entity_count(),
            "read CSV panel"
        );
        Ok(panel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EntityCode, Period};

    #[test]
    fn reads_wide_panel() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gdp.csv");
        std::fs::write(&path, "economy,2019,2020\nusa,10,..\nFRA,5,6\n").unwrap();

        let panel = CsvPanelProvider::new(&path)
            .fetch_panel(&SeriesRequest::new("GDP", vec![Period(2020)]))
            .unwrap();

        assert_eq!(panel.name, "GDP");
        assert_eq!(panel.get(&EntityCode::new("USA"), Period(2019)), Some(10.0));
        assert_eq!(panel.get(&EntityCode::new("USA"), Period(2020)), None);
        assert_eq!(panel.get(&EntityCode::new("FRA"), Period(2020)), Some(6.0));
    }

    #[test]
    fn filters_by_indicator_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wdi.csv");
        std::fs::write(
            &path,
            "Country Code,Series Code,YR2020\nUSA,GDP,10\nUSA,POP,3\nFRA,POP,2\n",
        )
        .unwrap();

        let provider = CsvPanelProvider::new(&path)
            .with_entity_column("Country Code")
            .with_indicator_column("Series Code");
        let pop = provider
            .fetch_panel(&SeriesRequest::new("POP", vec![Period(2020)]))
            .unwrap();
        assert_eq!(pop.entity_count(), 2);
        assert_eq!(pop.get(&EntityCode::new("USA"), Period(2020)), Some(3.0));

        let err = provider
            .fetch_panel(&SeriesRequest::new("AID", vec![Period(2020)]))
            .unwrap_err();
        assert!(matches!(err, DataError::IndicatorNotFound { .. }));
    }
}
