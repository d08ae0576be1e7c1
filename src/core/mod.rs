//! Core scoring modules for butterfly-access
//!
//! Everything here works on in-memory collections only. Reading and writing
//! tables lives in [`crate::io`].

pub mod accessibility;
pub mod catchment;
pub mod config;
pub mod decay;
pub mod demand;
pub mod edges;
pub mod error;
pub mod grouping;
pub mod index;
pub mod pipeline;
pub mod publish;

// Re-export main types for internal use
pub use accessibility::{AccessScore, ScoreTable};
pub use config::{AccessConfig, Method, Mode, OverwriteBehavior, RunParameters};
pub use demand::FacilitySummary;
pub use edges::{EdgeStore, FacilityId, OdEdge, OriginId};
pub use index::{DemandIndex, Facility, PopulationUnit, SupplyIndex};
pub use pipeline::{CancelFlag, Pipeline, PipelineState, RunOptions, RunOutput};
pub use publish::{MemoryPublisher, ResultPublisher};
