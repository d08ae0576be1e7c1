//! Per-origin accessibility scores
//!
//! Final pass of both variants. Uniform sums the ratios of every reachable
//! facility; decay first weights each ratio by selection probability and
//! distance weight.

use rayon::prelude::*;
use serde::Serialize;

use crate::core::catchment::RatedEdge;
use crate::core::demand::FacilityRatioEdge;
use crate::core::edges::{EdgeStore, OriginId};
use crate::core::grouping::Aggregate;

/// Accessibility of one origin
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AccessScore {
    #[serde(rename = "origin_id")]
    pub origin: OriginId,
    pub score: f64,
    /// Number of facilities (edges) reachable from the origin
    pub facility_count: usize,
}

/// Scores of one run, ordered by origin id
///
/// Origins without edges are absent rather than zero.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreTable {
    /// Column label used when the table is published
    pub label: String,
    pub scores: Vec<AccessScore>,
}

impl ScoreTable {
    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    pub fn get(&self, origin: OriginId) -> Option<&AccessScore> {
        self.scores
            .binary_search_by_key(&origin, |s| s.origin)
            .ok()
            .map(|i| &self.scores[i])
    }

    pub fn score(&self, origin: OriginId) -> Option<f64> {
        self.get(origin).map(|s| s.score)
    }
}

/// Decay edge with its final weighted contribution
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightedEdge {
    pub rated: FacilityRatioEdge,
    /// facility ratio × selection probability × inverse distance weight
    pub weighted_contribution: f64,
}

/// Uniform 2SFCA step two: `score(o) = Σ ratio(f)` over reachable facilities
pub fn aggregate_uniform(store: &EdgeStore, edges: &[RatedEdge], label: impl Into<String>) -> ScoreTable {
    let sums = store.by_origin().sum(edges, |e| e.ratio);
    collect_scores(store, &sums, label.into())
}

/// Weighted contribution per decay edge
pub fn compute_weighted_contributions(edges: Vec<FacilityRatioEdge>) -> Vec<WeightedEdge> {
    edges
        .into_par_iter()
        .map(|rated| {
            let probability = &rated.demand.probability;
            let weighted_contribution = rated.facility_ratio
                * probability.selection_probability
                * probability.decay.inverse_distance_weight;
            WeightedEdge {
                rated,
                weighted_contribution,
            }
        })
        .collect()
}

/// Decay variant final pass: `score(o) = Σ weighted contribution`
pub fn aggregate_decay(store: &EdgeStore, edges: &[WeightedEdge], label: impl Into<String>) -> ScoreTable {
    let sums = store.by_origin().sum(edges, |e| e.weighted_contribution);
    collect_scores(store, &sums, label.into())
}

fn collect_scores(store: &EdgeStore, sums: &Aggregate<OriginId>, label: String) -> ScoreTable {
    let mut scores: Vec<AccessScore> = store
        .by_origin()
        .iter()
        .map(|(origin, members)| AccessScore {
            origin,
            score: sums[&origin],
            facility_count: members.len(),
        })
        .collect();
    scores.sort_unstable_by_key(|s| s.origin);

    ScoreTable { label, scores }
}
