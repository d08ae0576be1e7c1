//! Pipeline orchestration
//!
//! Runs one of the two configurations over a loaded edge store:
//!
//! - uniform: `Loaded → RatiosComputed → Aggregated`
//! - decay: `Loaded → RatiosComputed → DecayComputed → ProbabilitiesComputed
//!   → DemandComputed → FacilityRatiosComputed → Aggregated`
//!
//! In the decay run `RatiosComputed` marks the per-edge capacities being
//! resolved, before any distance weighting.
//!
//! and finally `Published` once a publisher accepted the tables. Each stage
//! takes the previous stage's edges by value and returns a new typed edge set,
//! so nothing is mutated in place and no state survives the run.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;

use crate::core::accessibility::{aggregate_decay, aggregate_uniform, compute_weighted_contributions, ScoreTable};
use crate::core::catchment::compute_catchment_ratios;
use crate::core::config::{Method, RunParameters};
use crate::core::decay::{
    apply_decay_weights, check_probability_mass, compute_selection_probabilities, resolve_capacities, DecayExponent,
};
use crate::core::demand::{compute_facility_ratios, compute_population_demand, FacilitySummary};
use crate::core::edges::EdgeStore;
use crate::core::error::{Error, Result};
use crate::core::index::{DemandIndex, SupplyIndex};
use crate::core::publish::ResultPublisher;

/// Tolerance of the per-origin probability mass check
const PROBABILITY_TOLERANCE: f64 = 1e-9;

/// Pipeline states, in the order they are reached
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Loaded,
    RatiosComputed,
    DecayComputed,
    ProbabilitiesComputed,
    DemandComputed,
    FacilityRatiosComputed,
    Aggregated,
    Published,
}

impl PipelineState {
    /// States a run of `method` passes through before publishing
    pub fn path(method: &Method) -> &'static [PipelineState] {
        match method {
            Method::Uniform => &[
                PipelineState::Loaded,
                PipelineState::RatiosComputed,
                PipelineState::Aggregated,
            ],
            Method::Decay(_) => &[
                PipelineState::Loaded,
                PipelineState::RatiosComputed,
                PipelineState::DecayComputed,
                PipelineState::ProbabilitiesComputed,
                PipelineState::DemandComputed,
                PipelineState::FacilityRatiosComputed,
                PipelineState::Aggregated,
            ],
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineState::Loaded => "loaded",
            PipelineState::RatiosComputed => "ratios computed",
            PipelineState::DecayComputed => "decay weights computed",
            PipelineState::ProbabilitiesComputed => "selection probabilities computed",
            PipelineState::DemandComputed => "population demand computed",
            PipelineState::FacilityRatiosComputed => "facility ratios computed",
            PipelineState::Aggregated => "scores aggregated",
            PipelineState::Published => "published",
        };
        f.write_str(name)
    }
}

/// Called on every state transition with the method label and the new state
pub type StateCallback = Arc<dyn Fn(&str, PipelineState) + Send + Sync>;

/// Whole-run cancellation flag shared with the caller
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Options for pipeline runs
#[derive(Clone, Default)]
pub struct RunOptions {
    /// Optional state observer
    pub progress: Option<StateCallback>,
    /// Checked before every transition; a cancelled run never publishes
    pub cancel: Option<CancelFlag>,
}

/// Result of one scoring run
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutput {
    pub method: Method,
    pub scores: ScoreTable,
    pub facilities: Vec<FacilitySummary>,
}

/// Accessibility pipeline over a loaded edge set
pub struct Pipeline<'a> {
    store: &'a EdgeStore,
    supply: &'a SupplyIndex,
    demand: &'a DemandIndex,
    options: RunOptions,
}

impl<'a> Pipeline<'a> {
    pub fn new(store: &'a EdgeStore, supply: &'a SupplyIndex, demand: &'a DemandIndex) -> Self {
        Self {
            store,
            supply,
            demand,
            options: RunOptions::default(),
        }
    }

    pub fn with_options(mut self, options: RunOptions) -> Self {
        self.options = options;
        self
    }

    /// Validate raw parameters and run
    pub fn run(&self, params: &RunParameters) -> Result<RunOutput> {
        self.run_method(params.method()?)
    }

    /// Run a validated method
    pub fn run_method(&self, method: Method) -> Result<RunOutput> {
        self.validate(&method)?;

        let label = method.label();
        let start = Instant::now();
        log::info!("Scoring {} edges with {method}", self.store.len());
        self.advance(&label, PipelineState::Loaded)?;

        let (scores, facilities) = match method {
            Method::Uniform => self.run_uniform(&label)?,
            Method::Decay(beta) => self.run_decay(&label, beta)?,
        };
        self.advance(&label, PipelineState::Aggregated)?;

        log::info!(
            "{method}: {} origins scored, {} facilities in {:.2}s",
            scores.len(),
            facilities.len(),
            start.elapsed().as_secs_f64()
        );

        Ok(RunOutput {
            method,
            scores,
            facilities,
        })
    }

    /// Run the decay variant once per exponent, in parallel
    ///
    /// All exponents are validated before any computation; outputs keep the
    /// order of `exponents`.
    pub fn sweep(&self, exponents: &[f64]) -> Result<Vec<RunOutput>> {
        let methods = exponents
            .iter()
            .map(|&beta| DecayExponent::new(beta).map(Method::Decay))
            .collect::<Result<Vec<_>>>()?;
        for method in &methods {
            self.validate(method)?;
        }
        self.run_all(&methods)
    }

    /// Run several validated methods in parallel, keeping their order
    pub fn run_all(&self, methods: &[Method]) -> Result<Vec<RunOutput>> {
        methods.par_iter().map(|m| self.run_method(*m)).collect()
    }

    /// Hand finished runs to a publisher
    ///
    /// Cancellation is checked one last time first so partial or abandoned
    /// runs are never written.
    pub fn publish(&self, outputs: &[RunOutput], publisher: &mut dyn ResultPublisher) -> Result<()> {
        self.check_cancelled()?;
        publisher.publish(outputs)?;
        for output in outputs {
            self.notify(&output.method.label(), PipelineState::Published);
        }
        Ok(())
    }

    fn validate(&self, method: &Method) -> Result<()> {
        if let Method::Decay(_) = method {
            if let Some(edge) = self.store.first_non_positive_travel_time() {
                return Err(Error::NonPositiveTravelTime {
                    origin: edge.origin,
                    destination: edge.destination,
                    travel_time: edge.travel_time,
                });
            }
        }
        Ok(())
    }

    fn run_uniform(&self, label: &str) -> Result<(ScoreTable, Vec<FacilitySummary>)> {
        let ratios = compute_catchment_ratios(self.store, self.supply, self.demand)?;
        self.advance(label, PipelineState::RatiosComputed)?;

        let scores = aggregate_uniform(self.store, &ratios.edges, label);
        Ok((scores, ratios.facilities))
    }

    fn run_decay(&self, label: &str, beta: DecayExponent) -> Result<(ScoreTable, Vec<FacilitySummary>)> {
        let capacities = resolve_capacities(self.store, self.supply)?;
        self.advance(label, PipelineState::RatiosComputed)?;

        let decay = apply_decay_weights(self.store, &capacities, beta)?;
        self.advance(label, PipelineState::DecayComputed)?;

        let probabilities = compute_selection_probabilities(self.store, decay);
        if let Some((origin, mass)) = check_probability_mass(self.store, &probabilities, PROBABILITY_TOLERANCE) {
            log::warn!("Selection probabilities of origin {origin} sum to {mass}, expected 1");
        }
        self.advance(label, PipelineState::ProbabilitiesComputed)?;

        let demand = compute_population_demand(self.demand, probabilities)?;
        self.advance(label, PipelineState::DemandComputed)?;

        let (rated, facilities) = compute_facility_ratios(self.store, demand);
        self.advance(label, PipelineState::FacilityRatiosComputed)?;

        let weighted = compute_weighted_contributions(rated);
        let scores = aggregate_decay(self.store, &weighted, label);
        Ok((scores, facilities))
    }

    fn advance(&self, label: &str, state: PipelineState) -> Result<()> {
        self.check_cancelled()?;
        self.notify(label, state);
        Ok(())
    }

    fn notify(&self, label: &str, state: PipelineState) {
        log::debug!("[{label}] {state}");
        if let Some(progress) = &self.options.progress {
            progress(label, state);
        }
    }

    fn check_cancelled(&self) -> Result<()> {
        match &self.options.cancel {
            Some(flag) if flag.is_cancelled() => Err(Error::Cancelled),
            _ => Ok(()),
        }
    }
}
