//! Supply and demand lookups
//!
//! Capacity per facility and population per origin, as handed over by the
//! external data layer. Both are validated once at construction and are
//! read-only afterwards.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::core::edges::{FacilityId, OriginId};
use crate::core::error::{Error, Result};

/// A service facility and its capacity (e.g. number of doctors)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Facility {
    pub id: FacilityId,
    pub capacity: f64,
}

impl Facility {
    pub fn new(id: u64, capacity: f64) -> Self {
        Self {
            id: FacilityId(id),
            capacity,
        }
    }
}

/// A population unit acting as OD origin
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PopulationUnit {
    pub id: OriginId,
    pub population: f64,
}

impl PopulationUnit {
    pub fn new(id: u64, population: f64) -> Self {
        Self {
            id: OriginId(id),
            population,
        }
    }
}

/// facility id -> capacity
#[derive(Debug, Clone, Default)]
pub struct SupplyIndex {
    capacity: FxHashMap<FacilityId, f64>,
}

impl SupplyIndex {
    pub fn new(facilities: impl IntoIterator<Item = Facility>) -> Result<Self> {
        let mut capacity = FxHashMap::default();
        for facility in facilities {
            if !facility.capacity.is_finite() || facility.capacity < 0.0 {
                return Err(Error::InvalidCapacity {
                    facility: facility.id,
                    capacity: facility.capacity,
                });
            }
            if capacity.insert(facility.id, facility.capacity).is_some() {
                return Err(Error::DuplicateFacility(facility.id));
            }
        }
        Ok(Self { capacity })
    }

    pub fn capacity(&self, id: FacilityId) -> Option<f64> {
        self.capacity.get(&id).copied()
    }

    pub fn contains(&self, id: FacilityId) -> bool {
        self.capacity.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.capacity.len()
    }

    pub fn is_empty(&self) -> bool {
        self.capacity.is_empty()
    }

    /// Capacity for the facility on edge `edge`, failing on an unknown id
    pub fn require(&self, id: FacilityId, edge: usize) -> Result<f64> {
        self.capacity(id)
            .ok_or(Error::UnknownFacility { facility: id, edge })
    }
}

/// origin id -> population
#[derive(Debug, Clone, Default)]
pub struct DemandIndex {
    population: FxHashMap<OriginId, f64>,
}

impl DemandIndex {
    pub fn new(units: impl IntoIterator<Item = PopulationUnit>) -> Result<Self> {
        let mut population = FxHashMap::default();
        for unit in units {
            if !unit.population.is_finite() || unit.population < 0.0 {
                return Err(Error::InvalidPopulation {
                    origin: unit.id,
                    population: unit.population,
                });
            }
            if population.insert(unit.id, unit.population).is_some() {
                return Err(Error::DuplicateOrigin(unit.id));
            }
        }
        Ok(Self { population })
    }

    pub fn population(&self, id: OriginId) -> Option<f64> {
        self.population.get(&id).copied()
    }

    pub fn contains(&self, id: OriginId) -> bool {
        self.population.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.population.len()
    }

    pub fn is_empty(&self) -> bool {
        self.population.is_empty()
    }

    /// Population for the origin on edge `edge`, failing on an unknown id
    pub fn require(&self, id: OriginId, edge: usize) -> Result<f64> {
        self.population(id)
            .ok_or(Error::UnknownOrigin { origin: id, edge })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supply_lookup() {
        let supply = SupplyIndex::new(vec![Facility::new(1, 10.0), Facility::new(2, 0.0)]).unwrap();
        assert_eq!(supply.capacity(FacilityId(1)), Some(10.0));
        assert_eq!(supply.capacity(FacilityId(2)), Some(0.0));
        assert_eq!(supply.capacity(FacilityId(3)), None);
        assert_eq!(supply.len(), 2);
        assert!(matches!(
            supply.require(FacilityId(3), 4),
            Err(Error::UnknownFacility { facility: FacilityId(3), edge: 4 })
        ));
    }

    #[test]
    fn test_negative_capacity_rejected() {
        let err = SupplyIndex::new(vec![Facility::new(1, -1.0)]).unwrap_err();
        assert!(matches!(err, Error::InvalidCapacity { .. }));
    }

    #[test]
    fn test_nan_population_rejected() {
        let err = DemandIndex::new(vec![PopulationUnit::new(1, f64::NAN)]).unwrap_err();
        assert!(matches!(err, Error::InvalidPopulation { .. }));
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let err = SupplyIndex::new(vec![Facility::new(1, 1.0), Facility::new(1, 2.0)]).unwrap_err();
        assert!(matches!(err, Error::DuplicateFacility(FacilityId(1))));

        let err = DemandIndex::new(vec![PopulationUnit::new(4, 1.0), PopulationUnit::new(4, 1.0)])
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateOrigin(OriginId(4))));
    }
}
