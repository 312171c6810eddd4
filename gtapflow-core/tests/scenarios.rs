//! Worked examples for fill, balance and aggregation, end to end through the
//! public API.

use gtapflow_core::domain::{CanonicalRegions, EntityCode, RegionCode, RegionMapping, Series};
use gtapflow_core::{aggregate_to_regions, balance_pair, fill_by_region_ratio};

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

#[test]
fn ratio_fill_from_complete_neighbour() {
    let series = Series::from_pairs("x", [("A", Some(10.0)), ("B", None), ("C", Some(30.0))]);
    let reference = Series::from_pairs("gdp", [("A", Some(100.0)), ("B", Some(200.0)), ("C", Some(300.0))]);
    let mapping = RegionMapping::new(
        [("A", "R1"), ("B", "R1"), ("C", "R2")],
        CanonicalRegions::new(["R1", "R2"]).unwrap(),
    )
    .unwrap();

    let out = fill_by_region_ratio(&series, &reference, &mapping);

    assert_eq!(out.report.region_ratios[&RegionCode::new("R1")], Some(0.1));
    assert!(close(out.series.value(&EntityCode::new("B")).unwrap(), 20.0));
    assert_eq!(out.series.value(&EntityCode::new("C")), Some(30.0));
    assert_eq!(out.report.filled, vec![EntityCode::new("B")]);
}

#[test]
fn paired_flows_meet_at_the_midpoint() {
    let paid = Series::from_pairs("paid", [("X", Some(40.0)), ("Y", Some(60.0))]);
    let rec = Series::from_pairs("rec", [("X", Some(30.0)), ("Y", Some(30.0))]);
    let gdp = Series::from_pairs("gdp", [("X", Some(5.0)), ("Y", Some(7.0))]);
    let mapping = RegionMapping::new(
        [("X", "W"), ("Y", "W")],
        CanonicalRegions::new(["W"]).unwrap(),
    )
    .unwrap();

    let out = balance_pair(&paid, &rec, &gdp, &mapping).unwrap();

    assert!(close(out.target_total, 80.0));
    assert!(close(out.scale_paid, 0.8));
    assert!(close(out.scale_rec, 80.0 / 60.0));
    assert!(close(out.paid.total(), 80.0));
    assert!(close(out.rec.total(), 80.0));
    assert!(close(out.paid.value(&EntityCode::new("Y")).unwrap(), 48.0));
}

#[test]
fn unmapped_entity_never_reaches_region_totals() {
    let series = Series::from_pairs("x", [("A", Some(1.0)), ("B", Some(2.0)), ("Z", Some(1e12))]);
    let mapping = RegionMapping::new(
        [("A", "R1"), ("B", "R2")],
        CanonicalRegions::new(["R1", "R2"]).unwrap(),
    )
    .unwrap();

    let out = aggregate_to_regions(&series, &mapping, 1.0);

    assert_eq!(out.values(), vec![1.0, 2.0]);
    assert!(close(out.total(), 3.0));
}

#[test]
fn region_without_complete_entities_stays_missing() {
    let series = Series::from_pairs("x", [("A", Some(10.0)), ("B", None), ("C", None)]);
    let reference = Series::from_pairs("gdp", [("A", Some(1.0)), ("B", Some(2.0)), ("C", Some(3.0))]);
    let mapping = RegionMapping::new(
        [("A", "R1"), ("B", "R2"), ("C", "R2")],
        CanonicalRegions::new(["R1", "R2"]).unwrap(),
    )
    .unwrap();

    let out = fill_by_region_ratio(&series, &reference, &mapping);

    assert_eq!(out.series.get(&EntityCode::new("B")), Some(None));
    assert_eq!(out.series.get(&EntityCode::new("C")), Some(None));
    assert_eq!(out.report.region_ratios[&RegionCode::new("R2")], None);
    assert_eq!(out.report.unfillable.len(), 2);
}

#[test]
fn fill_then_aggregate_keeps_unfillable_out_of_totals() {
    let series = Series::from_pairs("x", [("A", Some(10.0)), ("B", None), ("C", None)]);
    let reference = Series::from_pairs("gdp", [("A", Some(1.0)), ("B", Some(2.0)), ("C", Some(3.0))]);
    let mapping = RegionMapping::new(
        [("A", "R1"), ("B", "R1"), ("C", "R2")],
        CanonicalRegions::new(["R1", "R2"]).unwrap(),
    )
    .unwrap();

    let filled = fill_by_region_ratio(&series, &reference, &mapping);
    let out = aggregate_to_regions(&filled.series, &mapping, 1.0);

    assert_eq!(out.values(), vec![30.0, 0.0]);
}
