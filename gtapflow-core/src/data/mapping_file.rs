//! Region mapping from CSV files.
//!
//! `mapping.csv` has one row per economy (`economy,Regions[,longnames]`).
//! `order.csv` has a single `Regions` column listing the canonical output
//! order. Without an order file, regions are ordered by first appearance in
//! the mapping.

use super::provider::{DataError, MappingSource};
use super::table::StringTable;
use crate::domain::{CanonicalRegions, MappingError, RegionCode, RegionMapping};
use std::path::PathBuf;
use tracing::{debug, warn};

pub const ENTITY_COLUMN: &str = "economy";
pub const REGION_COLUMN: &str = "Regions";

pub struct CsvMappingSource {
    mapping_path: PathBuf,
    order_path: Option<PathBuf>,
}

impl CsvMappingSource {
    pub fn new(mapping_path: impl Into<PathBuf>, order_path: Option<PathBuf>) -> Self {
        Self {
            mapping_path: mapping_path.into(),
            order_path,
        }
    }
}

fn source_error(e: DataError) -> MappingError {
    MappingError::Source(e.to_string())
}

impl MappingSource for CsvMappingSource {
    fn load(&self) -> Result<RegionMapping, MappingError> {
        let table = StringTable::read(&self.mapping_path).map_err(source_error)?;
        let entities = table.strings(ENTITY_COLUMN).map_err(source_error)?;
        let regions = table.strings(REGION_COLUMN).map_err(source_error)?;

        let mut rows = Vec::with_capacity(entities.len());
        let mut incomplete = 0usize;
        for (entity, region) in entities.into_iter().zip(regions) {
            match (entity, region) {
                (Some(e), Some(r)) => rows.push((e, r)),
                _ => incomplete += 1,
            }
        }
        if incomplete > 0 {
            warn!(
                path = table.path(),
                incomplete, "mapping rows without economy or region ignored"
            );
        }

        let order = match &self.order_path {
            Some(path) => {
                let order_table = StringTable::read(path).map_err(source_error)?;
                let labels = order_table.strings(REGION_COLUMN).map_err(source_error)?;
                CanonicalRegions::new(labels.into_iter().flatten())?
            }
            None => {
                let mut seen: Vec<RegionCode> = Vec::new();
                for (_, region) in &rows {
                    let region = RegionCode::new(region);
                    if !seen.contains(&region) {
                        seen.push(region);
                    }
                }
                CanonicalRegions::new(seen)?
            }
        };

        let mapping = RegionMapping::new(rows, order)?;
        debug!(
            path = table.path(),
            entities = mapping.entity_count(),
            regions = mapping.order().len(),
            "loaded region mapping"
        );
        Ok(mapping)
    }
}
