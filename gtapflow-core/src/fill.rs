//! Ratio fill by region.
//!
//! Missing entries of a series are estimated from a reference series (GDP,
//! population) using the ratio `sum(series) / sum(reference)` computed over the
//! complete entities of the entity's region.
//!
//! Row policy, applied identically everywhere the fill is used:
//! - the row set is the set of entities with a present reference value;
//! - rows without a region in the mapping are dropped;
//! - dropped rows do not appear in the output at all;
//! - rows whose region has no usable ratio stay missing.

use crate::domain::{EntityCode, RegionCode, RegionMapping, Series};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Diagnostics for a single fill run. The filled series is the result; this is
/// what happened along the way.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FillReport {
    /// Ratio per region. `None` when the region has no complete entity or its
    /// complete reference sum is zero.
    pub region_ratios: BTreeMap<RegionCode, Option<f64>>,
    /// Entities whose value was estimated.
    pub filled: Vec<EntityCode>,
    /// Entities still missing because their region ratio is undefined.
    pub unfillable: Vec<EntityCode>,
    /// Entities dropped because the reference value is missing.
    pub dropped_no_reference: Vec<EntityCode>,
    /// Entities dropped because the mapping has no region for them.
    pub dropped_unmapped: Vec<EntityCode>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FillOutcome {
    pub series: Series,
    pub report: FillReport,
}

#[derive(Default)]
struct RegionSums {
    series: f64,
    reference: f64,
    complete: usize,
}

/// Fill missing entries of `series` using region-average ratios to `reference`.
pub fn fill_by_region_ratio(
    series: &Series,
    reference: &Series,
    mapping: &RegionMapping,
) -> FillOutcome {
    let mut report = FillReport::default();

    // Step 1: join on entity. The reference drives the row set; series entities
    // the reference has never heard of have no denominator either.
    let mut rows: Vec<(&EntityCode, &RegionCode, f64, Option<f64>)> = Vec::new();
    for (entity, reference_value) in reference.iter() {
        let Some(reference_value) = reference_value else {
            report.dropped_no_reference.push(entity.clone());
            continue;
        };
        let Some(region) = mapping.region_of(entity) else {
            report.dropped_unmapped.push(entity.clone());
            continue;
        };
        rows.push((entity, region, reference_value, series.value(entity)));
    }
    for entity in series.entities() {
        if !reference.contains(entity) {
            report.dropped_no_reference.push(entity.clone());
        }
    }
    report.dropped_no_reference.sort();

    // Steps 2-3: ratios from complete rows only.
    let mut sums: BTreeMap<&RegionCode, RegionSums> = BTreeMap::new();
    for (_, region, reference_value, value) in &rows {
        let entry = sums.entry(*region).or_default();
        if let Some(value) = value {
            entry.series += value;
            entry.reference += reference_value;
            entry.complete += 1;
        }
    }
    for (region, s) in &sums {
        let ratio = if s.complete > 0 && s.reference != 0.0 {
            Some(s.series / s.reference).filter(|r| r.is_finite())
        } else {
            None
        };
        report.region_ratios.insert((*region).clone(), ratio);
    }

    // Steps 4-5: originals where present, estimates where computable.
    let mut filled = Series::new(series.name.clone());
    for (entity, region, reference_value, value) in rows {
        let out = match value {
            Some(v) => Some(v),
            None => {
                let ratio = report.region_ratios.get(region).copied().flatten();
                match ratio {
                    Some(r) => {
                        report.filled.push(entity.clone());
                        Some(r * reference_value)
                    }
                    None => {
                        report.unfillable.push(entity.clone());
                        None
                    }
                }
            }
        };
        filled.insert(entity.clone(), out);
    }

    debug!(
        series = %series.name,
        reference = %reference.name,
        rows = filled.len(),
        filled = report.filled.len(),
        unfillable = report.unfillable.len(),
        dropped_no_reference = report.dropped_no_reference.len(),
        dropped_unmapped = report.dropped_unmapped.len(),
        "ratio fill complete"
    );

    FillOutcome {
        series: filled,
        report,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CanonicalRegions;

    fn mapping(rows: &[(&str, &str)]) -> RegionMapping {
        let mut regions: Vec<&str> = rows.iter().map(|(_, r)| *r).collect();
        regions.sort();
        regions.dedup();
        RegionMapping::new(
            rows.iter().copied(),
            CanonicalRegions::new(regions).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn fills_with_region_ratio() {
        let series = Series::from_pairs("x", [("A", Some(10.0)), ("B", None), ("C", Some(30.0))]);
        let reference = Series::from_pairs(
            "gdp",
            [("A", Some(100.0)), ("B", Some(200.0)), ("C", Some(300.0))],
        );
        let m = mapping(&[("A", "R1"), ("B", "R1"), ("C", "R2")]);

        let out = fill_by_region_ratio(&series, &reference, &m);

        assert_eq!(out.report.region_ratios[&RegionCode::new("R1")], Some(0.1));
        assert!((out.series.value(&"B".into()).unwrap() - 20.0).abs() < 1e-12);
        assert_eq!(out.series.value(&"A".into()), Some(10.0));
        assert_eq!(out.series.value(&"C".into()), Some(30.0));
        assert_eq!(out.report.filled, vec![EntityCode::new("B")]);
    }

    #[test]
    fn region_without_complete_entities_stays_missing() {
        let series = Series::from_pairs("x", [("A", Some(1.0)), ("B", None), ("C", None)]);
        let reference = Series::from_pairs(
            "gdp",
            [("A", Some(10.0)), ("B", Some(20.0)), ("C", Some(30.0))],
        );
        let m = mapping(&[("A", "R1"), ("B", "R2"), ("C", "R2")]);

        let out = fill_by_region_ratio(&series, &reference, &m);

        assert_eq!(out.report.region_ratios[&RegionCode::new("R2")], None);
        assert_eq!(out.series.get(&"B".into()), Some(None));
        assert_eq!(out.series.get(&"C".into()), Some(None));
        assert_eq!(out.report.unfillable.len(), 2);
    }

    #[test]
    fn missing_reference_drops_entity() {
        let series = Series::from_pairs("x", [("A", Some(1.0)), ("B", Some(5.0)), ("Q", Some(9.0))]);
        let reference = Series::from_pairs("gdp", [("A", Some(10.0)), ("B", None)]);
        let m = mapping(&[("A", "R1"), ("B", "R1"), ("Q", "R1")]);

        let out = fill_by_region_ratio(&series, &reference, &m);

        assert!(!out.series.contains(&"B".into()));
        assert!(!out.series.contains(&"Q".into()));
        assert_eq!(
            out.report.dropped_no_reference,
            vec![EntityCode::new("B"), EntityCode::new("Q")]
        );
    }

    #[test]
    fn unmapped_entity_dropped() {
        let series = Series::from_pairs("x", [("A", Some(1.0)), ("Z", None)]);
        let reference = Series::from_pairs("gdp", [("A", Some(10.0)), ("Z", Some(10.0))]);
        let m = mapping(&[("A", "R1")]);

        let out = fill_by_region_ratio(&series, &reference, &m);

        assert!(!out.series.contains(&"Z".into()));
        assert_eq!(out.report.dropped_unmapped, vec![EntityCode::new("Z")]);
    }

    #[test]
    fn reference_only_entity_is_filled() {
        let series = Series::from_pairs("x", [("A", Some(4.0))]);
        let reference = Series::from_pairs("gdp", [("A", Some(2.0)), ("B", Some(3.0))]);
        let m = mapping(&[("A", "R1"), ("B", "R1")]);

        let out = fill_by_region_ratio(&series, &reference, &m);

        assert_eq!(out.series.value(&"B".into()), Some(6.0));
    }

    #[test]
    fn zero_reference_sum_gives_no_ratio() {
        let series = Series::from_pairs("x", [("A", Some(4.0)), ("B", None)]);
        let reference = Series::from_pairs("gdp", [("A", Some(0.0)), ("B", Some(3.0))]);
        let m = mapping(&[("A", "R1"), ("B", "R1")]);

        let out = fill_by_region_ratio(&series, &reference, &m);

        assert_eq!(out.report.region_ratios[&RegionCode::new("R1")], None);
        assert_eq!(out.series.get(&"B".into()), Some(None));
    }

    #[test]
    fn inputs_are_not_mutated() {
        let series = Series::from_pairs("x", [("A", Some(1.0)), ("B", None)]);
        let reference = Series::from_pairs("gdp", [("A", Some(1.0)), ("B", Some(1.0))]);
        let before = series.clone();
        let m = mapping(&[("A", "R1"), ("B", "R1")]);

        let _ = fill_by_region_ratio(&series, &reference, &m);

        assert_eq!(series, before);
    }
}
