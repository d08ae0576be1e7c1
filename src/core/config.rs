//! Run parameters and file-based configuration
//!
//! `RunParameters` is what the scoring core needs: a mode and, for the decay
//! variant, an exponent. `AccessConfig` is the TOML document the CLI reads;
//! it adds input locations, column names and output settings for the CSV
//! adapters. Command-line flags are layered over it by the binary.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::decay::DecayExponent;
use crate::core::error::{Error, Result};

/// Which floating catchment variant to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Plain two-step floating catchment (2SFCA)
    #[default]
    Uniform,
    /// Huff-model distance decay weighted variant
    Decay,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Uniform => write!(f, "uniform"),
            Mode::Decay => write!(f, "decay"),
        }
    }
}

/// Raw run parameters as supplied by a caller
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RunParameters {
    pub mode: Mode,
    /// Required iff `mode == Decay`
    pub decay_exponent: Option<f64>,
}

impl RunParameters {
    pub fn uniform() -> Self {
        Self {
            mode: Mode::Uniform,
            decay_exponent: None,
        }
    }

    pub fn decay(beta: f64) -> Self {
        Self {
            mode: Mode::Decay,
            decay_exponent: Some(beta),
        }
    }

    /// Validate into a [`Method`]
    pub fn method(&self) -> Result<Method> {
        match (self.mode, self.decay_exponent) {
            (Mode::Uniform, None) => Ok(Method::Uniform),
            (Mode::Uniform, Some(beta)) => {
                log::warn!("Decay exponent {beta} ignored in uniform mode");
                Ok(Method::Uniform)
            }
            (Mode::Decay, None) => Err(Error::MissingDecayExponent),
            (Mode::Decay, Some(beta)) => Ok(Method::Decay(DecayExponent::new(beta)?)),
        }
    }
}

/// Validated scoring method
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Method {
    Uniform,
    Decay(DecayExponent),
}

impl Method {
    /// Column label for the published score
    pub fn label(&self) -> String {
        match self {
            Method::Uniform => "access_2sfca".to_string(),
            Method::Decay(beta) => format!("access_huff_b{beta}"),
        }
    }

    pub fn mode(&self) -> Mode {
        match self {
            Method::Uniform => Mode::Uniform,
            Method::Decay(_) => Mode::Decay,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Uniform => write!(f, "uniform 2SFCA"),
            Method::Decay(beta) => write!(f, "Huff 2SFCA (beta = {beta})"),
        }
    }
}

/// Behavior when an output file already exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OverwriteBehavior {
    /// Replace the existing file
    Force,
    /// Fail if the destination exists
    #[default]
    NeverOverwrite,
}

/// Input table locations
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InputPaths {
    pub facilities: Option<PathBuf>,
    pub population: Option<PathBuf>,
    pub od_matrix: Option<PathBuf>,
    /// Table the scores are joined onto (e.g. community polygons export)
    pub join: Option<PathBuf>,
}

/// Column names in the input tables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ColumnNames {
    pub facility_id: String,
    pub capacity: String,
    pub population_id: String,
    pub population: String,
    pub origin: String,
    pub destination: String,
    pub travel_time: String,
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self {
            facility_id: "facility_id".to_string(),
            capacity: "Capacity_Doctors".to_string(),
            population_id: "PopID".to_string(),
            population: "Population_2011".to_string(),
            origin: "OriginID".to_string(),
            destination: "DestinationID".to_string(),
            travel_time: "TravelTime".to_string(),
        }
    }
}

/// Scoring settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunSection {
    pub mode: Mode,
    /// One run per exponent in decay mode
    pub decay_exponents: Vec<f64>,
    /// Drop OD rows above this travel time while loading
    pub max_travel_time: Option<f64>,
}

/// Output settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputSection {
    pub scores: Option<PathBuf>,
    pub facility_summary: Option<PathBuf>,
    /// Key column of the join table matched against origin ids
    pub join_key: String,
    pub overwrite: OverwriteBehavior,
}

impl Default for OutputSection {
    fn default() -> Self {
        Self {
            scores: None,
            facility_summary: None,
            join_key: "PopID".to_string(),
            overwrite: OverwriteBehavior::default(),
        }
    }
}

/// Complete configuration of a scoring run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AccessConfig {
    pub inputs: InputPaths,
    pub columns: ColumnNames,
    pub run: RunSection,
    pub output: OutputSection,
}

impl AccessConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::Config(e.to_string()))
    }

    /// Methods to run, one per decay exponent in decay mode
    ///
    /// Duplicate exponents would publish two columns with the same label and
    /// are rejected.
    pub fn methods(&self) -> Result<Vec<Method>> {
        match self.run.mode {
            Mode::Uniform => {
                if !self.run.decay_exponents.is_empty() {
                    log::warn!("decay_exponents ignored in uniform mode");
                }
                Ok(vec![Method::Uniform])
            }
            Mode::Decay => {
                if self.run.decay_exponents.is_empty() {
                    return Err(Error::MissingDecayExponent);
                }
                let mut methods = Vec::with_capacity(self.run.decay_exponents.len());
                for &beta in &self.run.decay_exponents {
                    let method = RunParameters::decay(beta).method()?;
                    if methods.contains(&method) {
                        return Err(Error::Config(format!("decay exponent {beta} listed twice")));
                    }
                    methods.push(method);
                }
                Ok(methods)
            }
        }
    }

    /// Check that everything needed to load and publish is present
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("inputs.facilities", &self.inputs.facilities),
            ("inputs.population", &self.inputs.population),
            ("inputs.od_matrix", &self.inputs.od_matrix),
            ("output.scores", &self.output.scores),
        ];
        for (name, value) in required {
            if value.is_none() {
                return Err(Error::Config(format!("{name} is required")));
            }
        }
        if let Some(limit) = self.run.max_travel_time {
            if !limit.is_finite() || limit <= 0.0 {
                return Err(Error::Config(format!(
                    "run.max_travel_time must be positive, got {limit}"
                )));
            }
        }
        self.methods()?;
        Ok(())
    }
}
