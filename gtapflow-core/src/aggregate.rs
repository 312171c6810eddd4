use std::collections::BTreeMap;

use tracing::debug;

use crate::domain::{CanonicalRegions, RegionCode, RegionMapping, RegionSeries, Series};

/// Roll a series up to the mapping's canonical regions and multiply by `unit_scale`.
pub fn aggregate_to_regions(series: &Series, mapping: &RegionMapping, unit_scale: f64) -> RegionSeries {
    aggregate_with_order(series, mapping, mapping.order(), unit_scale)
}

/// Group by region, sum, reindex against `order`, rescale.
///
/// Unmapped entities and missing values contribute nothing. Regions in `order`
/// with no contributors come out as 0.0; regions outside `order` are not emitted.
pub fn aggregate_with_order(
    series: &Series,
    mapping: &RegionMapping,
    order: &CanonicalRegions,
    unit_scale: f64,
) -> RegionSeries {
    let mut sums: BTreeMap<&RegionCode, f64> = BTreeMap::new();
    let mut unmapped = 0usize;

    for (entity, value) in series.present() {
        match mapping.region_of(entity) {
            Some(region) => *sums.entry(region).or_insert(0.0) += value,
            None => unmapped += 1,
        }
    }

    let rows: Vec<(RegionCode, f64)> = order
        .iter()
        .map(|region| {
            let total = sums.get(region).copied().unwrap_or(0.0);
            (region.clone(), total * unit_scale)
        })
        .collect();

    debug!(
        series = %series.name,
        regions = rows.len(),
        unmapped,
        unit_scale,
        "aggregated to regions"
    );

    RegionSeries::from_rows(series.name.clone(), rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping() -> RegionMapping {
        RegionMapping::new(
            [("A", "R1"), ("B", "R1"), ("C", "R2"), ("D", "OTHER")],
            CanonicalRegions::new(["R3", "R1", "R2"]).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn sums_within_region_in_canonical_order() {
        let s = Series::from_pairs("x", [("A", Some(1.0)), ("B", Some(2.0)), ("C", Some(5.0))]);
        let out = aggregate_to_regions(&s, &mapping(), 1.0);

        let regions: Vec<&str> = out.regions().map(|r| r.as_str()).collect();
        assert_eq!(regions, vec!["R3", "R1", "R2"]);
        assert_eq!(out.values(), vec![0.0, 3.0, 5.0]);
    }

    #[test]
    fn unmapped_entity_is_excluded() {
        let s = Series::from_pairs("x", [("A", Some(1.0)), ("Z", Some(1000.0))]);
        let out = aggregate_to_regions(&s, &mapping(), 1.0);
        assert_eq!(out.total(), 1.0);
    }

    #[test]
    fn regions_outside_order_are_not_emitted() {
        let s = Series::from_pairs("x", [("D", Some(7.0))]);
        let out = aggregate_to_regions(&s, &mapping(), 1.0);
        assert_eq!(out.len(), 3);
        assert!(out.get(&RegionCode::new("OTHER")).is_none());
    }

    #[test]
    fn missing_values_contribute_nothing() {
        let s = Series::from_pairs("x", [("A", None), ("B", Some(2.0))]);
        let out = aggregate_to_regions(&s, &mapping(), 1.0);
        assert_eq!(out.get(&RegionCode::new("R1")), Some(2.0));
    }

    #[test]
    fn unit_scale_applies_to_every_region() {
        let s = Series::from_pairs("x", [("A", Some(2_000_000.0)), ("C", Some(500_000.0))]);
        let out = aggregate_to_regions(&s, &mapping(), 1e-6);
        for (got, want) in out.values().iter().zip([0.0, 2.0, 0.5]) {
            assert!((got - want).abs() < 1e-12, "{got} != {want}");
        }
    }

    #[test]
    fn explicit_order_overrides_mapping_order() {
        let s = Series::from_pairs("x", [("A", Some(1.0)), ("C", Some(2.0))]);
        let order = CanonicalRegions::new(["R2", "R1"]).unwrap();
        let out = aggregate_with_order(&s, &mapping(), &order, 1.0);
        assert_eq!(out.values(), vec![2.0, 1.0]);
    }
}
