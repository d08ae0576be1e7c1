//! # Butterfly-access Library
//!
//! Spatial accessibility scoring for healthcare facilities using the
//! two-step floating catchment area method (2SFCA) and its Huff-model
//! distance-decay variant.
//!
//! ## Features
//!
//! - **Two methods**: uniform 2SFCA and decay-weighted Huff 2SFCA
//! - **Deterministic**: per-key sums always run in edge order, so repeated
//!   runs over the same input are bit-identical
//! - **Exponent sweeps**: several decay exponents scored in parallel
//! - **Pluggable output**: results go through a [`ResultPublisher`]
//! - **Progress tracking**: optional state callbacks and cancellation
//!
//! ## Basic Usage
//!
//! ```rust
//! use butterfly_access::{Facility, OdEdge, OriginId, PopulationUnit, RunParameters};
//!
//! # fn main() -> butterfly_access::Result<()> {
//! let facilities = vec![Facility::new(1, 10.0)];
//! let population = vec![PopulationUnit::new(7, 5.0), PopulationUnit::new(8, 15.0)];
//! let edges = vec![OdEdge::new(7, 1, 10.0), OdEdge::new(8, 1, 20.0)];
//!
//! let output = butterfly_access::score(facilities, population, edges, &RunParameters::uniform())?;
//! assert_eq!(output.scores.score(OriginId(7)), Some(0.5));
//! # Ok(())
//! # }
//! ```
//!
//! ## Progress Tracking
//!
//! ```rust
//! use std::sync::Arc;
//! use butterfly_access::{Facility, OdEdge, PipelineState, PopulationUnit, RunOptions, RunParameters};
//!
//! # fn main() -> butterfly_access::Result<()> {
//! let options = RunOptions {
//!     progress: Some(Arc::new(|label: &str, state: PipelineState| eprintln!("[{label}] {state}"))),
//!     ..Default::default()
//! };
//! butterfly_access::score_with_options(
//!     vec![Facility::new(1, 10.0)],
//!     vec![PopulationUnit::new(7, 5.0)],
//!     vec![OdEdge::new(7, 1, 4.0)],
//!     &RunParameters::decay(2.0),
//!     options,
//! )?;
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod io;

// Re-export core types that users might need
pub use crate::core::accessibility::{AccessScore, ScoreTable};
pub use crate::core::config::{AccessConfig, Method, Mode, OverwriteBehavior, RunParameters};
pub use crate::core::demand::FacilitySummary;
pub use crate::core::edges::{EdgeStore, FacilityId, OdEdge, OriginId};
pub use crate::core::error::{Error, ErrorKind, Result};
pub use crate::core::index::{DemandIndex, Facility, PopulationUnit, SupplyIndex};
pub use crate::core::pipeline::{CancelFlag, Pipeline, PipelineState, RunOptions, RunOutput, StateCallback};
pub use crate::core::publish::{MemoryPublisher, ResultPublisher};

/// Score one method over in-memory inputs
///
/// Builds the supply and demand indices and the edge store, validates every
/// edge reference, then runs the pipeline once.
///
/// # Arguments
/// * `facilities` - Facility ids with their capacity
/// * `population` - Origin ids with their population
/// * `edges` - Origin to facility travel times
/// * `params` - Mode and, for the decay variant, the exponent
pub fn score(
    facilities: Vec<Facility>,
    population: Vec<PopulationUnit>,
    edges: Vec<OdEdge>,
    params: &RunParameters,
) -> Result<RunOutput> {
    score_with_options(facilities, population, edges, params, RunOptions::default())
}

/// Score one method with progress callbacks and cancellation
pub fn score_with_options(
    facilities: Vec<Facility>,
    population: Vec<PopulationUnit>,
    edges: Vec<OdEdge>,
    params: &RunParameters,
    options: RunOptions,
) -> Result<RunOutput> {
    let supply = SupplyIndex::new(facilities)?;
    let demand = DemandIndex::new(population)?;
    let store = EdgeStore::new(edges, &supply, &demand)?;

    Pipeline::new(&store, &supply, &demand)
        .with_options(options)
        .run(params)
}

/// Score, then hand the result to `publisher`
///
/// Nothing is published when scoring fails.
pub fn score_and_publish(
    facilities: Vec<Facility>,
    population: Vec<PopulationUnit>,
    edges: Vec<OdEdge>,
    params: &RunParameters,
    publisher: &mut dyn ResultPublisher,
) -> Result<RunOutput> {
    let supply = SupplyIndex::new(facilities)?;
    let demand = DemandIndex::new(population)?;
    let store = EdgeStore::new(edges, &supply, &demand)?;

    let pipeline = Pipeline::new(&store, &supply, &demand);
    let output = pipeline.run(params)?;
    pipeline.publish(std::slice::from_ref(&output), publisher)?;
    Ok(output)
}
