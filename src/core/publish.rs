//! Boundary to whatever persists the results
//!
//! The core only produces score tables; writing them into a relational table,
//! a polygon attribute table or a CSV file is the publisher's job.

use crate::core::error::Result;
use crate::core::pipeline::RunOutput;

/// Receives the finished runs of a pipeline invocation
///
/// Called at most once per invocation and only with complete runs.
pub trait ResultPublisher {
    /// Fail early if `publish` is known to fail (e.g. a destination that may
    /// not be overwritten); must not write anything
    fn check(&self) -> Result<()> {
        Ok(())
    }

    fn publish(&mut self, runs: &[RunOutput]) -> Result<()>;
}

/// Keeps published runs in memory
#[derive(Debug, Default)]
pub struct MemoryPublisher {
    runs: Vec<RunOutput>,
}

impl MemoryPublisher {
    pub fn runs(&self) -> &[RunOutput] {
        &self.runs
    }

    pub fn into_runs(self) -> Vec<RunOutput> {
        self.runs
    }
}

impl ResultPublisher for MemoryPublisher {
    fn publish(&mut self, runs: &[RunOutput]) -> Result<()> {
        self.runs.extend_from_slice(runs);
        Ok(())
    }
}

/// Publishes to each publisher in turn, stopping at the first failure
///
/// Every publisher is checked before the first one writes, so a destination
/// rejected by a later publisher leaves the earlier ones untouched.
impl ResultPublisher for Vec<Box<dyn ResultPublisher>> {
    fn check(&self) -> Result<()> {
        self.iter().try_for_each(|publisher| publisher.check())
    }

    fn publish(&mut self, runs: &[RunOutput]) -> Result<()> {
        self.check()?;
        for publisher in self.iter_mut() {
            publisher.publish(runs)?;
        }
        Ok(())
    }
}
