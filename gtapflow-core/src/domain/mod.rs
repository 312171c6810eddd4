//! Domain types: entity/region/period keys, series, region mapping.

pub mod ids;
pub mod mapping;
pub mod region_series;
pub mod series;

pub use ids::{EntityCode, Period, RegionCode};
pub use mapping::{CanonicalRegions, MappingError, RegionMapping};
pub use region_series::RegionSeries;
pub use series::Series;
