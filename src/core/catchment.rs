//! Uniform 2SFCA provider-to-population ratios
//!
//! Step one of the two-step floating catchment method: every facility's
//! capacity is divided by the total population of the origins that can reach
//! it, and that ratio is broadcast back onto each edge of the facility.

use rayon::prelude::*;

use crate::core::demand::FacilitySummary;
use crate::core::edges::{EdgeStore, OdEdge};
use crate::core::error::Result;
use crate::core::grouping::guarded_ratio;
use crate::core::index::{DemandIndex, SupplyIndex};

/// Edge carrying the uniform ratio of its destination facility
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatedEdge {
    pub edge: OdEdge,
    pub ratio: f64,
}

/// Output of the uniform ratio pass
#[derive(Debug, Clone)]
pub struct CatchmentRatios {
    pub edges: Vec<RatedEdge>,
    pub facilities: Vec<FacilitySummary>,
}

/// Compute `capacity / catchment population` per facility and broadcast it
///
/// Facilities whose catchment holds no population get a ratio of `0`.
pub fn compute_catchment_ratios(
    store: &EdgeStore,
    supply: &SupplyIndex,
    demand: &DemandIndex,
) -> Result<CatchmentRatios> {
    let edges = store.edges();

    let populations: Vec<f64> = edges
        .par_iter()
        .enumerate()
        .map(|(i, e)| demand.require(e.origin, i))
        .collect::<Result<_>>()?;

    let groups = store.by_facility();
    let catchment_population = groups.sum(&populations, |p| *p);

    let mut facilities = Vec::with_capacity(groups.len());
    for (facility, members) in groups.iter() {
        let capacity = supply.require(facility, members[0])?;
        let population = catchment_population[&facility];
        facilities.push(FacilitySummary {
            facility,
            capacity,
            demand: population,
            ratio: guarded_ratio(capacity, population),
            origin_count: members.len(),
        });
    }

    let zero_demand = facilities.iter().filter(|f| f.demand == 0.0).count();
    if zero_demand > 0 {
        log::warn!("{zero_demand} facilities have no population in their catchment; ratio set to 0");
    }

    let ratio_by_facility = FacilitySummary::ratio_map(&facilities);
    let rated = edges
        .par_iter()
        .map(|e| RatedEdge {
            edge: *e,
            ratio: ratio_by_facility[&e.destination],
        })
        .collect();

    Ok(CatchmentRatios {
        edges: rated,
        facilities,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::edges::FacilityId;
    use crate::core::index::{Facility, PopulationUnit};

    fn ratio_of(result: &CatchmentRatios, id: u64) -> f64 {
        result
            .facilities
            .iter()
            .find(|f| f.facility == FacilityId(id))
            .map(|f| f.ratio)
            .unwrap()
    }

    #[test]
    fn test_single_facility_ratio() {
        let supply = SupplyIndex::new(vec![Facility::new(1, 10.0)]).unwrap();
        let demand = DemandIndex::new(vec![PopulationUnit::new(7, 5.0)]).unwrap();
        let store = EdgeStore::new(vec![OdEdge::new(7, 1, 12.0)], &supply, &demand).unwrap();

        let result = compute_catchment_ratios(&store, &supply, &demand).unwrap();
        assert_eq!(ratio_of(&result, 1), 2.0);
        assert_eq!(result.edges[0].ratio, 2.0);
    }

    #[test]
    fn test_shared_catchment_population() {
        // Facility 2 is reached by origins 7 (5 people) and 8 (15 people)
        let supply = SupplyIndex::new(vec![Facility::new(1, 10.0), Facility::new(2, 20.0)]).unwrap();
        let demand =
            DemandIndex::new(vec![PopulationUnit::new(7, 5.0), PopulationUnit::new(8, 15.0)]).unwrap();
        let store = EdgeStore::new(
            vec![
                OdEdge::new(7, 1, 10.0),
                OdEdge::new(7, 2, 20.0),
                OdEdge::new(8, 2, 5.0),
            ],
            &supply,
            &demand,
        )
        .unwrap();

        let result = compute_catchment_ratios(&store, &supply, &demand).unwrap();
        assert_eq!(ratio_of(&result, 1), 2.0);
        assert_eq!(ratio_of(&result, 2), 1.0);

        let summary = result
            .facilities
            .iter()
            .find(|f| f.facility == FacilityId(2))
            .unwrap();
        assert_eq!(summary.demand, 20.0);
        assert_eq!(summary.origin_count, 2);
    }

    #[test]
    fn test_zero_population_gives_zero_ratio() {
        let supply = SupplyIndex::new(vec![Facility::new(1, 10.0)]).unwrap();
        let demand = DemandIndex::new(vec![PopulationUnit::new(7, 0.0)]).unwrap();
        let store = EdgeStore::new(vec![OdEdge::new(7, 1, 12.0)], &supply, &demand).unwrap();

        let result = compute_catchment_ratios(&store, &supply, &demand).unwrap();
        assert_eq!(ratio_of(&result, 1), 0.0);
        assert!(result.edges.iter().all(|e| e.ratio.is_finite()));
    }

    #[test]
    fn test_edge_order_preserved() {
        let supply = SupplyIndex::new(vec![Facility::new(1, 1.0), Facility::new(2, 1.0)]).unwrap();
        let demand = DemandIndex::new(vec![PopulationUnit::new(7, 1.0)]).unwrap();
        let input = vec![OdEdge::new(7, 2, 3.0), OdEdge::new(7, 1, 4.0)];
        let store = EdgeStore::new(input.clone(), &supply, &demand).unwrap();

        let result = compute_catchment_ratios(&store, &supply, &demand).unwrap();
        let out: Vec<OdEdge> = result.edges.iter().map(|e| e.edge).collect();
        assert_eq!(out, input);
    }
}
