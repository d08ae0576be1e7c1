//! Huff-model distance decay and facility selection probability
//!
//! Each edge gets an inverse distance weight `t^-β`. Weighted by capacity it
//! becomes the facility's attractiveness for that origin, and normalising by
//! the origin's total attractiveness gives the probability the origin's
//! population chooses the facility.

use std::fmt;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::core::edges::{EdgeStore, OdEdge, OriginId};
use crate::core::error::{Error, Result};
use crate::core::grouping::{guarded_ratio, Aggregate};
use crate::core::index::SupplyIndex;

/// Commonly used range of decay exponents for healthcare access
pub const TYPICAL_EXPONENT_RANGE: (f64, f64) = (1.0, 3.0);

/// Validated distance-decay exponent β (> 0, finite)
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct DecayExponent(f64);

impl DecayExponent {
    pub fn new(beta: f64) -> Result<Self> {
        if !beta.is_finite() || beta <= 0.0 {
            return Err(Error::InvalidDecayExponent(beta));
        }
        let (lo, hi) = TYPICAL_EXPONENT_RANGE;
        if beta < lo || beta > hi {
            log::warn!("Decay exponent {beta} is outside the usual range [{lo}, {hi}]");
        }
        Ok(Self(beta))
    }

    pub fn value(self) -> f64 {
        self.0
    }

    /// `travel_time ^ -β`
    #[inline]
    pub fn weight(self, travel_time: f64) -> f64 {
        travel_time.powf(-self.0)
    }
}

impl TryFrom<f64> for DecayExponent {
    type Error = Error;

    fn try_from(value: f64) -> Result<Self> {
        Self::new(value)
    }
}

impl From<DecayExponent> for f64 {
    fn from(value: DecayExponent) -> Self {
        value.0
    }
}

impl fmt::Display for DecayExponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Edge after distance decay weighting
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecayEdge {
    pub edge: OdEdge,
    pub capacity: f64,
    pub inverse_distance_weight: f64,
    /// capacity × inverse distance weight
    pub numerator: f64,
}

/// Edge after selection probabilities are known
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbabilityEdge {
    pub decay: DecayEdge,
    /// Sum of numerators over every edge of this edge's origin
    pub denominator: f64,
    pub selection_probability: f64,
}

impl ProbabilityEdge {
    pub fn origin(&self) -> OriginId {
        self.decay.edge.origin
    }
}

/// Capacity of each edge's destination, in edge order
pub fn resolve_capacities(store: &EdgeStore, supply: &SupplyIndex) -> Result<Vec<f64>> {
    store
        .edges()
        .par_iter()
        .enumerate()
        .map(|(i, e)| supply.require(e.destination, i))
        .collect()
}

/// Attach inverse distance weights and numerators to every edge
///
/// `capacities` must come from [`resolve_capacities`] on the same store.
/// Rejects a zero travel time instead of letting `0^-β` become infinity, and
/// any weight or numerator that overflows `f64`.
pub fn apply_decay_weights(store: &EdgeStore, capacities: &[f64], beta: DecayExponent) -> Result<Vec<DecayEdge>> {
    store
        .edges()
        .par_iter()
        .zip(capacities.par_iter())
        .map(|(e, &capacity)| {
            if e.travel_time <= 0.0 {
                return Err(Error::NonPositiveTravelTime {
                    origin: e.origin,
                    destination: e.destination,
                    travel_time: e.travel_time,
                });
            }
            let inverse_distance_weight = beta.weight(e.travel_time);
            let numerator = capacity * inverse_distance_weight;
            if !inverse_distance_weight.is_finite() || !numerator.is_finite() {
                return Err(Error::DecayWeightOverflow {
                    origin: e.origin,
                    destination: e.destination,
                    travel_time: e.travel_time,
                    beta: beta.value(),
                });
            }
            Ok(DecayEdge {
                edge: *e,
                capacity,
                inverse_distance_weight,
                numerator,
            })
        })
        .collect()
}

/// Resolve capacities and apply decay weights in one step
pub fn compute_decay_weights(
    store: &EdgeStore,
    supply: &SupplyIndex,
    beta: DecayExponent,
) -> Result<Vec<DecayEdge>> {
    let capacities = resolve_capacities(store, supply)?;
    apply_decay_weights(store, &capacities, beta)
}

/// Normalise numerators per origin into selection probabilities
///
/// Origins whose reachable facilities all have zero capacity have a zero
/// denominator; their edges get probability `0`.
pub fn compute_selection_probabilities(store: &EdgeStore, edges: Vec<DecayEdge>) -> Vec<ProbabilityEdge> {
    let denominators = store.by_origin().sum(&edges, |e| e.numerator);

    edges
        .into_par_iter()
        .map(|decay| {
            let denominator = denominators[&decay.edge.origin];
            ProbabilityEdge {
                decay,
                denominator,
                selection_probability: guarded_ratio(decay.numerator, denominator),
            }
        })
        .collect()
}

/// Sum of selection probabilities per origin
pub fn probability_mass_by_origin(store: &EdgeStore, edges: &[ProbabilityEdge]) -> Aggregate<OriginId> {
    store.by_origin().sum(edges, |e| e.selection_probability)
}

/// First origin whose probabilities do not sum to 1 within `tolerance`
///
/// Origins with a zero denominator are skipped, their mass is 0 by
/// definition. Returns `None` when every origin passes.
pub fn check_probability_mass(
    store: &EdgeStore,
    edges: &[ProbabilityEdge],
    tolerance: f64,
) -> Option<(OriginId, f64)> {
    let mass = probability_mass_by_origin(store, edges);
    store.by_origin().iter().find_map(|(origin, members)| {
        if edges[members[0]].denominator == 0.0 {
            return None;
        }
        let total = mass[&origin];
        ((total - 1.0).abs() > tolerance).then_some((origin, total))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::edges::FacilityId;
    use crate::core::index::{DemandIndex, Facility, PopulationUnit};

    const EPS: f64 = 1e-12;

    fn two_facility_store() -> (EdgeStore, SupplyIndex) {
        let supply = SupplyIndex::new(vec![Facility::new(1, 10.0), Facility::new(2, 10.0)]).unwrap();
        let demand = DemandIndex::new(vec![PopulationUnit::new(7, 100.0)]).unwrap();
        let store = EdgeStore::new(
            vec![OdEdge::new(7, 1, 10.0), OdEdge::new(7, 2, 20.0)],
            &supply,
            &demand,
        )
        .unwrap();
        (store, supply)
    }

    #[test]
    fn test_exponent_validation() {
        assert!(DecayExponent::new(1.5).is_ok());
        assert!(matches!(DecayExponent::new(0.0), Err(Error::InvalidDecayExponent(_))));
        assert!(matches!(DecayExponent::new(-2.0), Err(Error::InvalidDecayExponent(_))));
        assert!(DecayExponent::new(f64::NAN).is_err());
        assert!(DecayExponent::new(f64::INFINITY).is_err());
    }

    #[test]
    fn test_weights_and_probabilities() {
        let (store, supply) = two_facility_store();
        let beta = DecayExponent::new(2.0).unwrap();

        let decay = compute_decay_weights(&store, &supply, beta).unwrap();
        assert!((decay[0].inverse_distance_weight - 0.01).abs() < EPS);
        assert!((decay[1].inverse_distance_weight - 0.0025).abs() < EPS);
        assert!((decay[0].numerator - 0.1).abs() < EPS);
        assert!((decay[1].numerator - 0.025).abs() < EPS);

        let probs = compute_selection_probabilities(&store, decay);
        assert!((probs[0].denominator - 0.125).abs() < EPS);
        assert!((probs[0].selection_probability - 0.8).abs() < EPS);
        assert!((probs[1].selection_probability - 0.2).abs() < EPS);
        assert_eq!(check_probability_mass(&store, &probs, 1e-9), None);
    }

    #[test]
    fn test_zero_travel_time_rejected() {
        let supply = SupplyIndex::new(vec![Facility::new(1, 10.0)]).unwrap();
        let demand = DemandIndex::new(vec![PopulationUnit::new(7, 1.0)]).unwrap();
        let store = EdgeStore::new(vec![OdEdge::new(7, 1, 0.0)], &supply, &demand).unwrap();

        let err = compute_decay_weights(&store, &supply, DecayExponent::new(2.0).unwrap()).unwrap_err();
        match err {
            Error::NonPositiveTravelTime {
                origin,
                destination,
                ..
            } => {
                assert_eq!(origin, OriginId(7));
                assert_eq!(destination, FacilityId(1));
            }
            other => panic!("Expected NonPositiveTravelTime, got {other:?}"),
        }
    }

    #[test]
    fn test_tiny_travel_time_overflow_rejected() {
        let supply = SupplyIndex::new(vec![Facility::new(1, 10.0)]).unwrap();
        let demand = DemandIndex::new(vec![PopulationUnit::new(7, 5.0)]).unwrap();
        let store = EdgeStore::new(vec![OdEdge::new(7, 1, 1e-200)], &supply, &demand).unwrap();

        let err = compute_decay_weights(&store, &supply, DecayExponent::new(2.0).unwrap()).unwrap_err();
        match err {
            Error::DecayWeightOverflow {
                origin,
                destination,
                beta,
                ..
            } => {
                assert_eq!(origin, OriginId(7));
                assert_eq!(destination, FacilityId(1));
                assert_eq!(beta, 2.0);
            }
            other => panic!("Expected DecayWeightOverflow, got {other:?}"),
        }
        assert_eq!(
            Error::DecayWeightOverflow {
                origin: OriginId(7),
                destination: FacilityId(1),
                travel_time: 1e-200,
                beta: 2.0,
            }
            .kind(),
            crate::core::error::ErrorKind::Domain
        );
    }

    #[test]
    fn test_huge_exponent_overflow_rejected() {
        let supply = SupplyIndex::new(vec![Facility::new(1, 10.0), Facility::new(2, 10.0)]).unwrap();
        let demand = DemandIndex::new(vec![PopulationUnit::new(7, 5.0)]).unwrap();
        let store = EdgeStore::new(
            vec![OdEdge::new(7, 1, 0.5), OdEdge::new(7, 2, 10.0)],
            &supply,
            &demand,
        )
        .unwrap();

        let err = compute_decay_weights(&store, &supply, DecayExponent::new(2000.0).unwrap()).unwrap_err();
        assert!(matches!(
            err,
            Error::DecayWeightOverflow {
                destination: FacilityId(1),
                ..
            }
        ));
    }

    #[test]
    fn test_resolve_capacities_in_edge_order() {
        let (store, supply) = two_facility_store();
        assert_eq!(resolve_capacities(&store, &supply).unwrap(), vec![10.0, 10.0]);
    }

    #[test]
    fn test_zero_capacity_origin_has_zero_probability() {
        let supply = SupplyIndex::new(vec![Facility::new(1, 0.0), Facility::new(2, 0.0)]).unwrap();
        let demand = DemandIndex::new(vec![PopulationUnit::new(7, 50.0)]).unwrap();
        let store = EdgeStore::new(
            vec![OdEdge::new(7, 1, 5.0), OdEdge::new(7, 2, 8.0)],
            &supply,
            &demand,
        )
        .unwrap();

        let decay = compute_decay_weights(&store, &supply, DecayExponent::new(1.5).unwrap()).unwrap();
        let probs = compute_selection_probabilities(&store, decay);
        assert!(probs.iter().all(|p| p.selection_probability == 0.0));
        // Zero-denominator origins are exempt from the mass check
        assert_eq!(check_probability_mass(&store, &probs, 1e-9), None);
    }

    #[test]
    fn test_probability_mass_many_origins() {
        let facilities: Vec<Facility> = (1..=5).map(|i| Facility::new(i, i as f64 * 3.0)).collect();
        let units: Vec<PopulationUnit> = (100..110).map(|i| PopulationUnit::new(i, 10.0)).collect();
        let supply = SupplyIndex::new(facilities).unwrap();
        let demand = DemandIndex::new(units).unwrap();

        let mut edges = Vec::new();
        for o in 100..110u64 {
            for f in 1..=5u64 {
                if (o + f) % 3 != 0 {
                    edges.push(OdEdge::new(o, f, 1.0 + ((o * f) % 29) as f64));
                }
            }
        }
        let store = EdgeStore::new(edges, &supply, &demand).unwrap();
        let decay = compute_decay_weights(&store, &supply, DecayExponent::new(1.7).unwrap()).unwrap();
        let probs = compute_selection_probabilities(&store, decay);

        let mass = probability_mass_by_origin(&store, &probs);
        for total in mass.values() {
            assert!((total - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_exponent_serde_rejects_invalid() {
        let ok: DecayExponent = serde_json::from_str("2.0").unwrap();
        assert_eq!(ok.value(), 2.0);
        assert!(serde_json::from_str::<DecayExponent>("-1.0").is_err());
    }
}
