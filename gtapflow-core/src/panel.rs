//! Entity × period tables as delivered by providers, and the preprocessing
//! applied before a single period is selected.

use crate::domain::{EntityCode, Period, Series};
use crate::overrides::OverrideTable;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Entity × period table for one indicator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Panel {
    /// Indicator id, used to look up overrides.
    pub name: String,
    rows: BTreeMap<EntityCode, BTreeMap<Period, Option<f64>>>,
}

impl Panel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rows: BTreeMap::new(),
        }
    }

    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rows: self.rows.clone(),
        }
    }

    pub fn insert(&mut self, entity: impl Into<EntityCode>, period: Period, value: Option<f64>) {
        self.rows
            .entry(entity.into())
            .or_default()
            .insert(period, value.filter(|v| v.is_finite()));
    }

    pub fn get(&self, entity: &EntityCode, period: Period) -> Option<f64> {
        self.rows.get(entity).and_then(|r| r.get(&period)).copied().flatten()
    }

    pub fn entity_count(&self) -> usize {
        self.rows.len()
    }

    pub fn entities(&self) -> impl Iterator<Item = &EntityCode> {
        self.rows.keys()
    }

    /// Merge cells from `other`. A present value never gets replaced by a
    /// missing one; entities that only ever reported missing still get a row.
    pub fn merge(&mut self, other: &Panel) {
        for (entity, row) in &other.rows {
            let target = self.rows.entry(entity.clone()).or_default();
            for (period, value) in row {
                let slot = target.entry(*period).or_insert(None);
                if value.is_some() {
                    *slot = *value;
                }
            }
        }
    }

    /// Sorted union of periods across all entities.
    pub fn periods(&self) -> Vec<Period> {
        let mut periods: Vec<Period> = self
            .rows
            .values()
            .flat_map(|r| r.keys().copied())
            .collect();
        periods.sort();
        periods.dedup();
        periods
    }

    /// Linear interpolation along the period axis.
    ///
    /// Interior gaps are interpolated, gaps after the last observation carry
    /// it forward, gaps before the first observation stay missing.
    pub fn interpolate_linear(&self) -> Self {
        let periods = self.periods();
        let rows = self
            .rows
            .iter()
            .map(|(entity, row)| {
                let values: Vec<Option<f64>> = periods
                    .iter()
                    .map(|p| row.get(p).copied().flatten())
                    .collect();
                let filled = interpolate_row(&periods, &values);
                let row: BTreeMap<Period, Option<f64>> =
                    periods.iter().copied().zip(filled).collect();
                (entity.clone(), row)
            })
            .collect();
        Self {
            name: self.name.clone(),
            rows,
        }
    }

    /// Keep periods `>= first`.
    pub fn since(&self, first: Period) -> Self {
        self.filter_periods(|p| p >= first)
    }

    /// Keep exactly `periods`; periods no entity reports come out missing.
    pub fn select_periods(&self, periods: &[Period]) -> Self {
        let rows = self
            .rows
            .iter()
            .map(|(entity, row)| {
                let selected = periods
                    .iter()
                    .map(|p| (*p, row.get(p).copied().flatten()))
                    .collect();
                (entity.clone(), selected)
            })
            .collect();
        Self {
            name: self.name.clone(),
            rows,
        }
    }

    fn filter_periods(&self, keep: impl Fn(Period) -> bool) -> Self {
        let rows = self
            .rows
            .iter()
            .map(|(entity, row)| {
                let kept = row
                    .iter()
                    .filter(|(p, _)| keep(**p))
                    .map(|(p, v)| (*p, *v))
                    .collect();
                (entity.clone(), kept)
            })
            .collect();
        Self {
            name: self.name.clone(),
            rows,
        }
    }

    /// Drop entities with no observation in any kept period.
    pub fn drop_all_missing(&self) -> Self {
        let rows = self
            .rows
            .iter()
            .filter(|(_, row)| row.values().any(|v| v.is_some()))
            .map(|(e, row)| (e.clone(), row.clone()))
            .collect();
        Self {
            name: self.name.clone(),
            rows,
        }
    }

    /// Multiply every present value by `factor`.
    pub fn scaled(&self, factor: f64) -> Self {
        let rows = self
            .rows
            .iter()
            .map(|(entity, row)| {
                let scaled = row
                    .iter()
                    .map(|(p, v)| (*p, v.map(|x| x * factor).filter(|x| x.is_finite())))
                    .collect();
                (entity.clone(), scaled)
            })
            .collect();
        Self {
            name: self.name.clone(),
            rows,
        }
    }

    /// Apply the overrides registered for this panel's name.
    pub fn apply_overrides(&self, overrides: &OverrideTable) -> Self {
        let mut patched = self.clone();
        for o in overrides.for_series(&self.name) {
            patched.insert(o.entity.clone(), o.period, o.value);
        }
        patched
    }

    /// Reduce to a single-period series. Entities without that period are missing.
    pub fn series_for(&self, period: Period) -> Series {
        Series::from_pairs(
            self.name.clone(),
            self.rows
                .iter()
                .map(|(entity, row)| (entity.clone(), row.get(&period).copied().flatten())),
        )
    }
}

fn interpolate_row(periods: &[Period], values: &[Option<f64>]) -> Vec<Option<f64>> {
    let mut out = values.to_vec();
    let mut last: Option<usize> = None;

    for (i, value) in values.iter().enumerate() {
        let Some(current) = *value else {
            continue;
        };
        if let Some(prev) = last {
            if i > prev + 1 {
                let x0 = f64::from(periods[prev].0);
                let x1 = f64::from(periods[i].0);
                let y0 = values[prev].unwrap_or(current);
                for (j, slot) in out.iter_mut().enumerate().take(i).skip(prev + 1) {
                    let x = f64::from(periods[j].0);
                    *slot = Some(y0 + (current - y0) * (x - x0) / (x1 - x0));
                }
            }
        }
        last = Some(i);
    }

    if let Some(prev) = last {
        let carry = values[prev];
        for slot in out.iter_mut().skip(prev + 1) {
            *slot = carry;
        }
    }

    out
}
