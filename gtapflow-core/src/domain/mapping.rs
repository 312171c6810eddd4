//! Entity → region lookup and the canonical region order.

use super::ids::{EntityCode, RegionCode};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum MappingError {
    #[error("entity {entity} mapped to both '{first}' and '{second}'")]
    ConflictingEntity {
        entity: EntityCode,
        first: RegionCode,
        second: RegionCode,
    },

    #[error("region '{0}' listed more than once in the canonical order")]
    DuplicateRegion(RegionCode),

    #[error("canonical region order is empty")]
    EmptyOrder,

    #[error("mapping source error: {0}")]
    Source(String),
}

/// Ordered list of region labels defining the shape of aggregated output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<RegionCode>", into = "Vec<RegionCode>")]
pub struct CanonicalRegions(Vec<RegionCode>);

impl CanonicalRegions {
    pub fn new<I, R>(regions: I) -> Result<Self, MappingError>
    where
        I: IntoIterator<Item = R>,
        R: Into<RegionCode>,
    {
        let regions: Vec<RegionCode> = regions.into_iter().map(Into::into).collect();
        if regions.is_empty() {
            return Err(MappingError::EmptyOrder);
        }
        let mut seen = BTreeSet::new();
        for region in &regions {
            if !seen.insert(region) {
                return Err(MappingError::DuplicateRegion(region.clone()));
            }
        }
        Ok(Self(regions))
    }

    pub fn iter(&self) -> impl Iterator<Item = &RegionCode> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, region: &RegionCode) -> bool {
        self.0.contains(region)
    }
}

impl TryFrom<Vec<RegionCode>> for CanonicalRegions {
    type Error = MappingError;

    fn try_from(regions: Vec<RegionCode>) -> Result<Self, Self::Error> {
        Self::new(regions)
    }
}

impl From<CanonicalRegions> for Vec<RegionCode> {
    fn from(order: CanonicalRegions) -> Self {
        order.0
    }
}

/// Many-to-one mapping of entities onto model regions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionMapping {
    regions: BTreeMap<EntityCode, RegionCode>,
    order: CanonicalRegions,
}

impl RegionMapping {
    /// Build a mapping from `(entity, region)` rows.
    ///
    /// Repeated rows are accepted when they agree; an entity assigned to two
    /// different regions is rejected.
    pub fn new<I, E, R>(rows: I, order: CanonicalRegions) -> Result<Self, MappingError>
    where
        I: IntoIterator<Item = (E, R)>,
        E: Into<EntityCode>,
        R: Into<RegionCode>,
    {
        let mut regions: BTreeMap<EntityCode, RegionCode> = BTreeMap::new();
        for (entity, region) in rows {
            let entity = entity.into();
            let region = region.into();
            if let Some(existing) = regions.get(&entity) {
                if *existing != region {
                    return Err(MappingError::ConflictingEntity {
                        entity,
                        first: existing.clone(),
                        second: region,
                    });
                }
                continue;
            }
            regions.insert(entity, region);
        }
        Ok(Self { regions, order })
    }

    pub fn region_of(&self, entity: &EntityCode) -> Option<&RegionCode> {
        self.regions.get(entity)
    }

    pub fn order(&self) -> &CanonicalRegions {
        &self.order
    }

    pub fn entity_count(&self) -> usize {
        self.regions.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&EntityCode, &RegionCode)> {
        self.regions.iter()
    }

    /// Regions referenced by the mapping but absent from the canonical order.
    ///
    /// Entities in these regions are summed but never reach the output.
    pub fn regions_outside_order(&self) -> Vec<RegionCode> {
        let outside: BTreeSet<&RegionCode> = self
            .regions
            .values()
            .filter(|r| !self.order.contains(r))
            .collect();
        outside.into_iter().cloned().collect()
    }

    /// Canonical regions no entity maps to. These aggregate to zero.
    pub fn empty_regions(&self) -> Vec<RegionCode> {
        let used: BTreeSet<&RegionCode> = self.regions.values().collect();
        self.order
            .iter()
            .filter(|r| !used.contains(r))
            .cloned()
            .collect()
    }
}
