//! Thin polars wrapper for the CSV layouts the providers read.
//!
//! Everything is read as strings (schema inference off) and parsed by us, so
//! agency placeholders such as `..` or `n/a` become missing values instead of
//! turning a whole year column into text.

use super::provider::DataError;
use crate::domain::Period;
use polars::prelude::*;
use std::path::Path;

pub(crate) struct StringTable {
    path: String,
    df: DataFrame,
}

impl StringTable {
    pub(crate) fn read(path: &Path) -> Result<Self, DataError> {
        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(0))
            .try_into_reader_with_file_path(Some(path.to_path_buf()))
            .and_then(|reader| reader.finish())
            .map_err(|e| DataError::Read {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            path: path.display().to_string(),
            df,
        })
    }

    pub(crate) fn path(&self) -> &str {
        &self.path
    }

    pub(crate) fn height(&self) -> usize {
        self.df.height()
    }

    pub(crate) fn column_names(&self) -> Vec<String> {
        self.df
            .get_column_names()
            .iter()
            .map(|name| name.to_string())
            .collect()
    }

    /// Columns whose header parses as a year, in file order.
    pub(crate) fn period_columns(&self) -> Vec<(String, Period)> {
        self.column_names()
            .into_iter()
            .filter_map(|name| Period::parse_header(&name).map(|p| (name, p)))
            .collect()
    }

    pub(crate) fn strings(&self, name: &str) -> Result<Vec<Option<String>>, DataError> {
        let column = self.df.column(name).map_err(|_| DataError::MissingColumn {
            path: self.path.clone(),
            column: name.to_string(),
        })?;
        let values = column.str()?;
        Ok(values
            .into_iter()
            .map(|v| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()))
            .collect())
    }

    pub(crate) fn numbers(&self, name: &str) -> Result<Vec<Option<f64>>, DataError> {
        Ok(self
            .strings(name)?
            .into_iter()
            .map(|v| v.as_deref().and_then(parse_number))
            .collect())
    }
}

/// Parse a numeric cell. Thousands separators are tolerated; anything else
/// that is not a finite number is missing.
pub(crate) fn parse_number(raw: &str) -> Option<f64> {
    let cleaned: String = raw.trim().chars().filter(|c| *c != ',').collect();
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_number_handles_placeholders() {
        assert_eq!(parse_number("12.5"), Some(12.5));
        assert_eq!(parse_number(" 1,234 "), Some(1234.0));
        assert_eq!(parse_number(".."), None);
        assert_eq!(parse_number("n/a"), None);
        assert_eq!(parse_number("NaN"), None);
        assert_eq!(parse_number("-3e2"), Some(-300.0));
    }

    #[test]
    fn reads_all_columns_as_strings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.csv");
        std::fs::write(&path, "economy,2020,YR2021\nUSA,1.5,..\nFRA,,2\n").unwrap();

        let table = StringTable::read(&path).unwrap();
        assert_eq!(table.height(), 2);
        assert_eq!(
            table.period_columns(),
            vec![
                ("2020".to_string(), Period(2020)),
                ("YR2021".to_string(), Period(2021))
            ]
        );
        assert_eq!(table.numbers("2020").unwrap(), vec![Some(1.5), None]);
        assert_eq!(table.numbers("YR2021").unwrap(), vec![None, Some(2.0)]);
        assert!(matches!(
            table.strings("Regions"),
            Err(DataError::MissingColumn { .. })
        ));
    }
}
