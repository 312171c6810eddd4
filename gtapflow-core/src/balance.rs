//! Paired balancing of payments and receipts.
//!
//! Both sides are ratio-filled independently against the same reference, then
//! rescaled so that their global totals meet at the midpoint. Negative values
//! are clamped to zero *after* rescaling, so clamping can reopen a gap between
//! the two totals; the post-clamp totals are reported so the gap is visible.

use crate::domain::{RegionMapping, Series};
use crate::fill::{fill_by_region_ratio, FillReport};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::{debug, warn};

/// Which side of a paired flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Paid,
    Rec,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Paid => write!(f, "paid"),
            Side::Rec => write!(f, "rec"),
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum BalanceError {
    #[error("{side} total is zero after filling; cannot rescale")]
    ZeroTotal { side: Side },

    #[error("{side} total is not finite ({total})")]
    NonFiniteTotal { side: Side, total: f64 },
}

/// Output of [`balance_pair`].
#[derive(Debug, Clone, PartialEq)]
pub struct BalancedPair {
    /// Filled, rescaled and clamped payments. Unfillable entities are absent.
    pub paid: Series,
    /// Filled, rescaled and clamped receipts. Unfillable entities are absent.
    pub rec: Series,
    /// `T_paid / T_rec` before rescaling; 1.0 means the sources already agreed.
    pub scale_factor: f64,
    pub scale_paid: f64,
    pub scale_rec: f64,
    /// `(T_paid + T_rec) / 2`, the common total right after rescaling.
    pub target_total: f64,
    pub paid_total_before: f64,
    pub rec_total_before: f64,
    pub paid_total_after_clamp: f64,
    pub rec_total_after_clamp: f64,
    pub paid_clamped: usize,
    pub rec_clamped: usize,
    /// Amount clamping added back to each side, so that
    /// `*_total_after_clamp - *_clamped_mass == target_total`.
    pub paid_clamped_mass: f64,
    pub rec_clamped_mass: f64,
    pub paid_fill: FillReport,
    pub rec_fill: FillReport,
}

impl BalancedPair {
    /// Difference between the totals left behind by clamping.
    pub fn residual_imbalance(&self) -> f64 {
        self.paid_total_after_clamp - self.rec_total_after_clamp
    }
}

fn checked_total(series: &Series, side: Side) -> Result<f64, BalanceError> {
    let total = series.total();
    if !total.is_finite() {
        return Err(BalanceError::NonFiniteTotal { side, total });
    }
    if total == 0.0 {
        return Err(BalanceError::ZeroTotal { side });
    }
    Ok(total)
}

fn clamp_negative(series: &Series) -> (Series, usize, f64) {
    let (count, mass) = series
        .present()
        .filter(|(_, v)| *v < 0.0)
        .fold((0, 0.0), |(n, m), (_, v)| (n + 1, m - v));
    (series.map_present(|v| v.max(0.0)), count, mass)
}

/// Fill both sides of a paired flow, then equalize their global totals.
pub fn balance_pair(
    paid: &Series,
    rec: &Series,
    reference: &Series,
    mapping: &RegionMapping,
) -> Result<BalancedPair, BalanceError> {
    let paid_fill = fill_by_region_ratio(paid, reference, mapping);
    let rec_fill = fill_by_region_ratio(rec, reference, mapping);

    // Unfillable rows cannot take part in a global total.
    let paid_filled = paid_fill.series.without_missing();
    let rec_filled = rec_fill.series.without_missing();

    let paid_total = checked_total(&paid_filled, Side::Paid)?;
    let rec_total = checked_total(&rec_filled, Side::Rec)?;

    let scale_factor = paid_total / rec_total;
    let target_total = (paid_total + rec_total) / 2.0;
    let scale_paid = target_total / paid_total;
    let scale_rec = target_total / rec_total;

    let (paid_out, paid_clamped, paid_clamped_mass) =
        clamp_negative(&paid_filled.scaled(scale_paid));
    let (rec_out, rec_clamped, rec_clamped_mass) = clamp_negative(&rec_filled.scaled(scale_rec));

    let paid_total_after_clamp = paid_out.total();
    let rec_total_after_clamp = rec_out.total();

    debug!(
        paid = %paid.name,
        rec = %rec.name,
        scale_factor,
        scale_paid,
        scale_rec,
        target_total,
        "balanced pair"
    );
    if paid_clamped + rec_clamped > 0 {
        warn!(
            paid = %paid.name,
            rec = %rec.name,
            paid_clamped,
            rec_clamped,
            residual = paid_total_after_clamp - rec_total_after_clamp,
            "negative values clamped after balancing; totals no longer equal"
        );
    }

    Ok(BalancedPair {
        paid: paid_out,
        rec: rec_out,
        scale_factor,
        scale_paid,
        scale_rec,
        target_total,
        paid_total_before: paid_total,
        rec_total_before: rec_total,
        paid_total_after_clamp,
        rec_total_after_clamp,
        paid_clamped,
        rec_clamped,
        paid_clamped_mass,
        rec_clamped_mass,
        paid_fill: paid_fill.report,
        rec_fill: rec_fill.report,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CanonicalRegions;

    fn mapping(entities: &[&str]) -> RegionMapping {
        RegionMapping::new(
            entities.iter().map(|e| (*e, "WORLD")),
            CanonicalRegions::new(["WORLD"]).unwrap(),
        )
        .unwrap()
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn midpoint_rescaling() {
        let paid = Series::from_pairs("paid", [("X", Some(40.0)), ("Y", Some(60.0))]);
        let rec = Series::from_pairs("rec", [("X", Some(30.0)), ("Y", Some(30.0))]);
        let gdp = Series::from_pairs("gdp", [("X", Some(1.0)), ("Y", Some(1.0))]);

        let out = balance_pair(&paid, &rec, &gdp, &mapping(&["X", "Y"])).unwrap();

        assert!(close(out.target_total, 80.0));
        assert!(close(out.scale_paid, 0.8));
        assert!(close(out.scale_factor, 100.0 / 60.0));
        assert!(close(out.paid.value(&"X".into()).unwrap(), 32.0));
        assert!(close(out.paid.value(&"Y".into()).unwrap(), 48.0));
        assert!(close(out.rec.value(&"X".into()).unwrap(), 40.0));
        assert!(close(out.rec.value(&"Y".into()).unwrap(), 40.0));
        assert!(close(out.paid.total(), out.rec.total()));
    }

    #[test]
    fn zero_total_is_an_error() {
        let paid = Series::from_pairs("paid", [("X", Some(0.0))]);
        let rec = Series::from_pairs("rec", [("X", Some(5.0))]);
        let gdp = Series::from_pairs("gdp", [("X", Some(1.0))]);

        let err = balance_pair(&paid, &rec, &gdp, &mapping(&["X"])).unwrap_err();
        assert_eq!(err, BalanceError::ZeroTotal { side: Side::Paid });
    }

    #[test]
    fn all_unfillable_side_is_zero_total() {
        let paid = Series::from_pairs("paid", [("X", Some(3.0))]);
        let rec = Series::from_pairs("rec", [("X", None)]);
        let gdp = Series::from_pairs("gdp", [("X", Some(1.0))]);

        let err = balance_pair(&paid, &rec, &gdp, &mapping(&["X"])).unwrap_err();
        assert_eq!(err, BalanceError::ZeroTotal { side: Side::Rec });
    }

    #[test]
    fn negatives_are_clamped_after_scaling() {
        let paid = Series::from_pairs("paid", [("X", Some(-10.0)), ("Y", Some(110.0))]);
        let rec = Series::from_pairs("rec", [("X", Some(50.0)), ("Y", Some(50.0))]);
        let gdp = Series::from_pairs("gdp", [("X", Some(1.0)), ("Y", Some(1.0))]);

        let out = balance_pair(&paid, &rec, &gdp, &mapping(&["X", "Y"])).unwrap();

        assert_eq!(out.paid.value(&"X".into()), Some(0.0));
        assert_eq!(out.paid_clamped, 1);
        assert!(out.paid.present().all(|(_, v)| v >= 0.0));
        // 100 vs 100 before clamping; clamping removes the -10.
        assert!(close(out.residual_imbalance(), 10.0));
        assert!(close(out.paid_clamped_mass, 10.0));
        assert!(close(out.rec_clamped_mass, 0.0));
        assert!(close(out.paid_total_after_clamp - out.paid_clamped_mass, out.target_total));
    }

    #[test]
    fn unfillable_entities_are_dropped() {
        let m = RegionMapping::new(
            [("X", "R1"), ("Y", "R2")],
            CanonicalRegions::new(["R1", "R2"]).unwrap(),
        )
        .unwrap();
        let paid = Series::from_pairs("paid", [("X", Some(10.0)), ("Y", None)]);
        let rec = Series::from_pairs("rec", [("X", Some(10.0)), ("Y", Some(4.0))]);
        let gdp = Series::from_pairs("gdp", [("X", Some(1.0)), ("Y", Some(1.0))]);

        let out = balance_pair(&paid, &rec, &gdp, &m).unwrap();

        assert!(!out.paid.contains(&"Y".into()));
        assert_eq!(out.paid_fill.unfillable.len(), 1);
        assert!(close(out.paid.total(), out.rec.total()));
    }
}
