//! CLI-specific progress handling for butterfly-access
//!
//! Shows a spinner on stderr that follows pipeline state transitions.

use std::sync::Arc;
use std::time::Duration;

use butterfly_access::{PipelineState, StateCallback};
use indicatif::{ProgressBar, ProgressStyle};

/// Creates a spinner for CLI display
pub fn create_spinner() -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

/// Progress manager for a scoring run
pub struct ProgressManager {
    pub pb: ProgressBar,
    runs: usize,
}

impl ProgressManager {
    /// Create a new progress manager expecting `runs` scoring runs
    pub fn new(runs: usize, message: &str) -> Self {
        let pb = create_spinner();

        // Print initial message to stderr
        eprintln!("{message}");

        Self { pb, runs }
    }

    /// Callback to hand to the pipeline through `RunOptions`
    ///
    /// The spinner finishes once every expected run reached `Published`.
    pub fn callback(&self) -> StateCallback {
        let pb = self.pb.clone();
        let runs = self.runs as u64;
        pb.set_length(runs);
        Arc::new(move |label: &str, state: PipelineState| {
            pb.set_message(format!("{label}: {state}"));
            if state == PipelineState::Published {
                pb.inc(1);
                if pb.position() >= runs {
                    pb.finish_with_message("✅ Scores published!");
                }
            }
        })
    }

    /// Clear the spinner after a failed run
    pub fn abandon(&self) {
        if !self.pb.is_finished() {
            self.pb.abandon_with_message("❌ Run aborted");
        }
    }
}
