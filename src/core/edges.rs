//! Origin-destination edge set
//!
//! The OD matrix as the pipeline sees it: a flat, immutable list of
//! `(origin, destination, travel_time)` rows plus the key groups every
//! aggregation pass reuses. Catchment filtering happens before the rows get
//! here; an edge present in the store is inside the catchment by definition.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::error::{Error, Result};
use crate::core::grouping::KeyGroups;
use crate::core::index::{DemandIndex, SupplyIndex};

/// Identifier of a population unit (OD origin)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OriginId(pub u64);

/// Identifier of a service facility (OD destination)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FacilityId(pub u64);

impl fmt::Display for OriginId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for FacilityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One OD pair inside the catchment
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OdEdge {
    pub origin: OriginId,
    pub destination: FacilityId,
    /// Network travel time, in whatever unit the OD source used (usually minutes)
    pub travel_time: f64,
}

impl OdEdge {
    pub fn new(origin: u64, destination: u64, travel_time: f64) -> Self {
        Self {
            origin: OriginId(origin),
            destination: FacilityId(destination),
            travel_time,
        }
    }
}

/// Validated edge set with its origin and facility groupings
///
/// Construction checks referential integrity against both indices, so every
/// later stage can look ids up without a fallible path.
#[derive(Debug, Clone)]
pub struct EdgeStore {
    edges: Vec<OdEdge>,
    by_origin: KeyGroups<OriginId>,
    by_facility: KeyGroups<FacilityId>,
}

impl EdgeStore {
    /// Build the store, rejecting edges whose ids do not resolve
    ///
    /// Travel times must be finite and non-negative here; the stricter
    /// `> 0` requirement of decay weighting is checked by the pipeline once
    /// the mode is known.
    pub fn new(edges: Vec<OdEdge>, supply: &SupplyIndex, demand: &DemandIndex) -> Result<Self> {
        for (i, edge) in edges.iter().enumerate() {
            if !supply.contains(edge.destination) {
                return Err(Error::UnknownFacility {
                    facility: edge.destination,
                    edge: i,
                });
            }
            if !demand.contains(edge.origin) {
                return Err(Error::UnknownOrigin {
                    origin: edge.origin,
                    edge: i,
                });
            }
            if !edge.travel_time.is_finite() || edge.travel_time < 0.0 {
                return Err(Error::InvalidTravelTime {
                    origin: edge.origin,
                    destination: edge.destination,
                    travel_time: edge.travel_time,
                });
            }
        }

        let by_origin = KeyGroups::build(&edges, |e| e.origin);
        let by_facility = KeyGroups::build(&edges, |e| e.destination);

        let duplicates = edges.len() - count_distinct_pairs(&edges);
        if duplicates > 0 {
            log::warn!("{duplicates} duplicate OD pairs in edge set; each row is counted");
        }

        log::debug!(
            "Edge store: {} edges, {} origins, {} facilities",
            edges.len(),
            by_origin.len(),
            by_facility.len()
        );

        Ok(Self {
            edges,
            by_origin,
            by_facility,
        })
    }

    pub fn edges(&self) -> &[OdEdge] {
        &self.edges
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Edge indices grouped by origin, in first-seen order
    pub fn by_origin(&self) -> &KeyGroups<OriginId> {
        &self.by_origin
    }

    /// Edge indices grouped by destination facility, in first-seen order
    pub fn by_facility(&self) -> &KeyGroups<FacilityId> {
        &self.by_facility
    }

    /// First edge with a travel time that decay weighting cannot use
    pub(crate) fn first_non_positive_travel_time(&self) -> Option<&OdEdge> {
        self.edges.iter().find(|e| e.travel_time <= 0.0)
    }
}

fn count_distinct_pairs(edges: &[OdEdge]) -> usize {
    let mut seen = rustc_hash::FxHashSet::default();
    seen.reserve(edges.len());
    edges
        .iter()
        .filter(|e| seen.insert((e.origin, e.destination)))
        .count()
}
