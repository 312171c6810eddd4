//! gtapflow core: gap-filling, paired balancing and region aggregation of
//! bilateral economic flows.
//!
//! - Domain types (entity and region codes, periods, series, region mapping)
//! - Ratio fill of missing values from a reference series, per region
//! - Paired balancing so world payments equal world receipts
//! - Aggregation of entity series to a canonical region order
//! - Panel preprocessing (interpolation, period selection, overrides)
//! - Providers for the World Bank API, IMF BOP exports and CSV panels

pub mod aggregate;
pub mod balance;
pub mod data;
pub mod domain;
pub mod fill;
pub mod fingerprint;
pub mod overrides;
pub mod panel;

pub use aggregate::{aggregate_to_regions, aggregate_with_order};
pub use balance::{balance_pair, BalanceError, BalancedPair, Side};
pub use fill::{fill_by_region_ratio, FillOutcome, FillReport};
pub use fingerprint::{dataset_hash, DatasetHash};
pub use overrides::{Override, OverrideError, OverrideTable};
pub use panel::Panel;

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: the types handed between pipeline stages are Send + Sync.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<domain::Series>();
        require_sync::<domain::Series>();
        require_send::<domain::RegionSeries>();
        require_sync::<domain::RegionSeries>();
        require_send::<domain::RegionMapping>();
        require_sync::<domain::RegionMapping>();
        require_send::<Panel>();
        require_sync::<Panel>();
        require_send::<FillReport>();
        require_sync::<FillReport>();
        require_send::<BalancedPair>();
        require_sync::<BalancedPair>();
        require_send::<OverrideTable>();
        require_sync::<OverrideTable>();
        require_send::<DatasetHash>();
        require_sync::<DatasetHash>();
        require_send::<data::DataError>();
        require_sync::<data::DataError>();
        require_send::<data::WorldBankProvider>();
        require_sync::<data::WorldBankProvider>();
    }

    /// Providers are usable as trait objects.
    #[test]
    fn providers_are_object_safe() {
        let providers: Vec<Box<dyn data::SeriesProvider>> = vec![
            Box::new(data::StaticProvider::new()),
            Box::new(data::CsvPanelProvider::new("gdp.csv")),
            Box::new(data::ImfBopCsvProvider::new("bop.csv", data::BopSide::Debit)),
        ];
        let names: Vec<&str> = providers.iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["static", "csv_panel", "imf_bop_csv"]);
    }
}
