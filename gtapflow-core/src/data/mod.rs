//! Data sources: agency providers, CSV panels and the region mapping file.

pub mod csv_panel;
pub mod imf;
pub mod mapping_file;
pub mod provider;
pub(crate) mod table;
pub mod worldbank;

pub use csv_panel::CsvPanelProvider;
pub use imf::{BopSide, ImfBopCsvProvider, IMF_UNIT};
pub use mapping_file::CsvMappingSource;
pub use provider::{
    DataError, FetchProgress, MappingSource, SeriesProvider, SeriesRequest, StaticProvider,
    TracingProgress,
};
pub use worldbank::WorldBankProvider;
