//! Error types for butterfly-access
//!
//! Every failure carries the offending id or file so a run can be diagnosed
//! from the message alone. Zero demand or a zero selection denominator is not
//! an error: those divisions are defined as `0`.

use std::path::PathBuf;

use strsim::{jaro_winkler, normalized_levenshtein};
use thiserror::Error;

use crate::core::edges::{FacilityId, OriginId};

/// Broad classification of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// An edge references an id absent from the supply or demand index
    Reference,
    /// An input value or run parameter is outside its domain
    Domain,
    /// Reading or writing an external table failed
    Io,
    /// The run was cancelled before publishing
    Cancelled,
}

/// Main error type for butterfly-access operations
#[derive(Debug, Error)]
pub enum Error {
    #[error("edge {edge} references facility {facility} which is not in the supply index")]
    UnknownFacility { facility: FacilityId, edge: usize },

    #[error("edge {edge} references origin {origin} which is not in the demand index")]
    UnknownOrigin { origin: OriginId, edge: usize },

    #[error("decay mode requires a distance-decay exponent")]
    MissingDecayExponent,

    #[error("distance-decay exponent must be a positive finite number, got {0}")]
    InvalidDecayExponent(f64),

    #[error("edge {origin} -> {destination} has travel time {travel_time}; decay weighting requires travel time > 0")]
    NonPositiveTravelTime {
        origin: OriginId,
        destination: FacilityId,
        travel_time: f64,
    },

    #[error("edge {origin} -> {destination}: travel time {travel_time} with decay exponent {beta} gives a non-finite weight")]
    DecayWeightOverflow {
        origin: OriginId,
        destination: FacilityId,
        travel_time: f64,
        beta: f64,
    },

    #[error("edge {origin} -> {destination} has invalid travel time {travel_time}")]
    InvalidTravelTime {
        origin: OriginId,
        destination: FacilityId,
        travel_time: f64,
    },

    #[error("facility {facility} has invalid capacity {capacity}; capacity must be finite and >= 0")]
    InvalidCapacity { facility: FacilityId, capacity: f64 },

    #[error("origin {origin} has invalid population {population}; population must be finite and >= 0")]
    InvalidPopulation { origin: OriginId, population: f64 },

    #[error("facility {0} appears more than once in the supply table")]
    DuplicateFacility(FacilityId),

    #[error("origin {0} appears more than once in the population table")]
    DuplicateOrigin(OriginId),

    #[error("{}", missing_column_message(.column, .file, .suggestion.as_deref()))]
    MissingColumn {
        column: String,
        file: PathBuf,
        suggestion: Option<String>,
    },

    #[error("invalid value '{value}' in column '{column}' of {} (row {row})", .file.display())]
    InvalidField {
        column: String,
        file: PathBuf,
        row: usize,
        value: String,
    },

    #[error("output file already exists: {} (use --force to overwrite)", .0.display())]
    OutputExists(PathBuf),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("run cancelled before publishing")]
    Cancelled,
}

impl Error {
    /// Classify the error into the reference / domain / io taxonomy
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::UnknownFacility { .. } | Error::UnknownOrigin { .. } => ErrorKind::Reference,
            Error::MissingDecayExponent
            | Error::InvalidDecayExponent(_)
            | Error::NonPositiveTravelTime { .. }
            | Error::DecayWeightOverflow { .. }
            | Error::InvalidTravelTime { .. }
            | Error::InvalidCapacity { .. }
            | Error::InvalidPopulation { .. }
            | Error::DuplicateFacility(_)
            | Error::DuplicateOrigin(_)
            | Error::Config(_) => ErrorKind::Domain,
            Error::MissingColumn { .. }
            | Error::InvalidField { .. }
            | Error::OutputExists(_)
            | Error::Io(_)
            | Error::Csv(_) => ErrorKind::Io,
            Error::Cancelled => ErrorKind::Cancelled,
        }
    }
}

fn missing_column_message(column: &str, file: &std::path::Path, suggestion: Option<&str>) -> String {
    match suggestion {
        Some(s) => format!(
            "column '{column}' not found in {}; did you mean '{s}'?",
            file.display()
        ),
        None => format!("column '{column}' not found in {}", file.display()),
    }
}

/// Suggest the closest header for a misspelled column name
///
/// Scores candidates with 70% Jaro-Winkler + 30% normalized Levenshtein on
/// lowercased names. Column names are short and typos are mostly
/// transpositions or dropped characters, so the same blend used for region
/// names works here. Returns `None` below a 0.7 similarity.
pub fn suggest_column(wanted: &str, headers: &[String]) -> Option<String> {
    let wanted_lower = wanted.to_lowercase();
    let min_threshold = 0.7;

    let mut best: Option<(&String, f64)> = None;
    for header in headers {
        let header_lower = header.to_lowercase();
        if header_lower == wanted_lower {
            // Case-only mismatch is the most likely mistake
            return Some(header.clone());
        }
        let score = jaro_winkler(&wanted_lower, &header_lower) * 0.7
            + normalized_levenshtein(&wanted_lower, &header_lower) * 0.3;
        if score >= min_threshold && best.map_or(true, |(_, s)| score > s) {
            best = Some((header, score));
        }
    }

    best.map(|(h, _)| h.clone())
}

/// Convenience result type for butterfly-access operations
pub type Result<T> = std::result::Result<T, Error>;
