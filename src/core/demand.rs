//! Facility-side demand aggregation
//!
//! In the decay variant a facility's demand is not the raw population of its
//! catchment: each origin contributes its population scaled by the
//! probability it picks this facility and by the distance weight of the trip.

use rayon::prelude::*;
use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::core::decay::ProbabilityEdge;
use crate::core::edges::{EdgeStore, FacilityId, OdEdge};
use crate::core::error::Result;
use crate::core::grouping::guarded_ratio;
use crate::core::index::DemandIndex;

/// Per-facility statistics, one row per facility with at least one edge
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FacilitySummary {
    #[serde(rename = "facility_id")]
    pub facility: FacilityId,
    pub capacity: f64,
    /// Population demand assigned to the facility (weighted in decay mode)
    pub demand: f64,
    /// capacity / demand, `0` when demand is `0`
    pub ratio: f64,
    /// Number of edges (origins) in the catchment
    pub origin_count: usize,
}

impl FacilitySummary {
    pub fn ratio_map(rows: &[FacilitySummary]) -> FxHashMap<FacilityId, f64> {
        rows.iter().map(|f| (f.facility, f.ratio)).collect()
    }
}

/// Edge with its population demand contribution
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DemandEdge {
    pub probability: ProbabilityEdge,
    pub population: f64,
    pub population_demand: f64,
}

/// Edge with the weighted ratio of its destination facility
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FacilityRatioEdge {
    pub demand: DemandEdge,
    pub facility_ratio: f64,
}

impl FacilityRatioEdge {
    pub fn edge(&self) -> &OdEdge {
        &self.demand.probability.decay.edge
    }
}

/// `probability × population × inverse distance weight` per edge
pub fn compute_population_demand(
    demand: &DemandIndex,
    edges: Vec<ProbabilityEdge>,
) -> Result<Vec<DemandEdge>> {
    edges
        .into_par_iter()
        .enumerate()
        .map(|(i, probability)| {
            let population = demand.require(probability.origin(), i)?;
            let population_demand = if probability.selection_probability != 0.0 {
                probability.selection_probability
                    * population
                    * probability.decay.inverse_distance_weight
            } else {
                0.0
            };
            Ok(DemandEdge {
                probability,
                population,
                population_demand,
            })
        })
        .collect()
}

/// Sum demand per facility, derive `capacity / demand` and broadcast it
pub fn compute_facility_ratios(
    store: &EdgeStore,
    edges: Vec<DemandEdge>,
) -> (Vec<FacilityRatioEdge>, Vec<FacilitySummary>) {
    let groups = store.by_facility();
    let facility_demand = groups.sum(&edges, |e| e.population_demand);

    let facilities: Vec<FacilitySummary> = groups
        .iter()
        .map(|(facility, members)| {
            let capacity = edges[members[0]].probability.decay.capacity;
            let demand = facility_demand[&facility];
            FacilitySummary {
                facility,
                capacity,
                demand,
                ratio: guarded_ratio(capacity, demand),
                origin_count: members.len(),
            }
        })
        .collect();

    let zero_demand = facilities.iter().filter(|f| f.demand == 0.0).count();
    if zero_demand > 0 {
        log::warn!("{zero_demand} facilities have zero weighted demand; ratio set to 0");
    }

    let ratio_by_facility = FacilitySummary::ratio_map(&facilities);
    let rated = edges
        .into_par_iter()
        .map(|demand| {
            let facility_ratio = ratio_by_facility[&demand.probability.decay.edge.destination];
            FacilityRatioEdge {
                demand,
                facility_ratio,
            }
        })
        .collect();

    (rated, facilities)
}
