//! Reading facility, population and OD tables from CSV
//!
//! Column names come from [`ColumnNames`]; a column missing from a header
//! fails with a suggestion for the closest existing header. Ids exported by
//! GIS tools sometimes come out as `12.0`, so integral floats are accepted.

use std::io::Read;
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, StringRecord, Trim};

use crate::core::config::{AccessConfig, ColumnNames};
use crate::core::edges::{EdgeStore, OdEdge};
use crate::core::error::{suggest_column, Error, Result};
use crate::core::index::{DemandIndex, Facility, PopulationUnit, SupplyIndex};

/// Everything a pipeline run needs, loaded and validated
#[derive(Debug)]
pub struct LoadedInputs {
    pub supply: SupplyIndex,
    pub demand: DemandIndex,
    pub store: EdgeStore,
    /// OD rows skipped by the travel-time threshold
    pub dropped_edges: usize,
}

/// Load all three tables named in `config` and build the indices
pub fn load_inputs(config: &AccessConfig) -> Result<LoadedInputs> {
    let facilities_path = required(&config.inputs.facilities, "inputs.facilities")?;
    let population_path = required(&config.inputs.population, "inputs.population")?;
    let od_path = required(&config.inputs.od_matrix, "inputs.od_matrix")?;

    let supply = SupplyIndex::new(read_facilities(facilities_path, &config.columns)?)?;
    let demand = DemandIndex::new(read_population(population_path, &config.columns)?)?;
    let (edges, dropped_edges) = read_od_edges(od_path, &config.columns, config.run.max_travel_time)?;

    log::info!(
        "Loaded {} facilities, {} population units, {} OD edges",
        supply.len(),
        demand.len(),
        edges.len()
    );
    if dropped_edges > 0 {
        log::info!("Dropped {dropped_edges} OD edges above the travel-time threshold");
    }

    let store = EdgeStore::new(edges, &supply, &demand)?;
    Ok(LoadedInputs {
        supply,
        demand,
        store,
        dropped_edges,
    })
}

/// Read `facility id, capacity` rows
pub fn read_facilities(path: &Path, columns: &ColumnNames) -> Result<Vec<Facility>> {
    let reader = open(path)?;
    facilities_from_reader(reader, path, columns)
}

/// Read `origin id, population` rows
pub fn read_population(path: &Path, columns: &ColumnNames) -> Result<Vec<PopulationUnit>> {
    let reader = open(path)?;
    population_from_reader(reader, path, columns)
}

/// Read OD rows, dropping those above `max_travel_time`
///
/// Returns the kept edges and the number of dropped rows.
pub fn read_od_edges(
    path: &Path,
    columns: &ColumnNames,
    max_travel_time: Option<f64>,
) -> Result<(Vec<OdEdge>, usize)> {
    let reader = open(path)?;
    edges_from_reader(reader, path, columns, max_travel_time)
}

fn open(path: &Path) -> Result<csv::Reader<std::fs::File>> {
    if !path.exists() {
        return Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("Input file not found: {}", path.display()),
        )));
    }
    Ok(builder().from_path(path)?)
}

fn builder() -> ReaderBuilder {
    let mut builder = ReaderBuilder::new();
    builder.trim(Trim::All);
    builder
}

fn required<'a>(value: &'a Option<PathBuf>, name: &str) -> Result<&'a Path> {
    value
        .as_deref()
        .ok_or_else(|| Error::Config(format!("{name} is required")))
}

pub(crate) fn facilities_from_reader<R: Read>(
    mut reader: csv::Reader<R>,
    source: &Path,
    columns: &ColumnNames,
) -> Result<Vec<Facility>> {
    let headers = reader.headers()?.clone();
    let id_col = column_index(&headers, &columns.facility_id, source)?;
    let capacity_col = column_index(&headers, &columns.capacity, source)?;

    let mut facilities = Vec::new();
    for record in reader.records() {
        let record = record?;
        let field = Field::new(&record, source);
        facilities.push(Facility::new(
            field.id(id_col, &columns.facility_id)?,
            field.number(capacity_col, &columns.capacity)?,
        ));
    }
    Ok(facilities)
}

pub(crate) fn population_from_reader<R: Read>(
    mut reader: csv::Reader<R>,
    source: &Path,
    columns: &ColumnNames,
) -> Result<Vec<PopulationUnit>> {
    let headers = reader.headers()?.clone();
    let id_col = column_index(&headers, &columns.population_id, source)?;
    let population_col = column_index(&headers, &columns.population, source)?;

    let mut units = Vec::new();
    for record in reader.records() {
        let record = record?;
        let field = Field::new(&record, source);
        units.push(PopulationUnit::new(
            field.id(id_col, &columns.population_id)?,
            field.number(population_col, &columns.population)?,
        ));
    }
    Ok(units)
}

pub(crate) fn edges_from_reader<R: Read>(
    mut reader: csv::Reader<R>,
    source: &Path,
    columns: &ColumnNames,
    max_travel_time: Option<f64>,
) -> Result<(Vec<OdEdge>, usize)> {
    let headers = reader.headers()?.clone();
    let origin_col = column_index(&headers, &columns.origin, source)?;
    let destination_col = column_index(&headers, &columns.destination, source)?;
    let time_col = column_index(&headers, &columns.travel_time, source)?;

    let mut edges = Vec::new();
    let mut dropped = 0usize;
    for record in reader.records() {
        let record = record?;
        let field = Field::new(&record, source);
        let travel_time = field.number(time_col, &columns.travel_time)?;
        if max_travel_time.is_some_and(|limit| travel_time > limit) {
            dropped += 1;
            continue;
        }
        edges.push(OdEdge::new(
            field.id(origin_col, &columns.origin)?,
            field.id(destination_col, &columns.destination)?,
            travel_time,
        ));
    }
    Ok((edges, dropped))
}

/// Position of `name` in `headers`, with a fuzzy suggestion when absent
pub(crate) fn column_index(headers: &StringRecord, name: &str, source: &Path) -> Result<usize> {
    if let Some(i) = headers.iter().position(|h| h == name) {
        return Ok(i);
    }
    let available: Vec<String> = headers.iter().map(str::to_string).collect();
    Err(Error::MissingColumn {
        column: name.to_string(),
        file: source.to_path_buf(),
        suggestion: suggest_column(name, &available),
    })
}

/// Typed access to one CSV record
struct Field<'a> {
    record: &'a StringRecord,
    source: &'a Path,
}

impl<'a> Field<'a> {
    fn new(record: &'a StringRecord, source: &'a Path) -> Self {
        Self { record, source }
    }

    fn raw(&self, index: usize) -> &str {
        self.record.get(index).unwrap_or("")
    }

    fn invalid(&self, index: usize, column: &str) -> Error {
        Error::InvalidField {
            column: column.to_string(),
            file: self.source.to_path_buf(),
            row: self.record.position().map_or(0, |p| p.line() as usize),
            value: self.raw(index).to_string(),
        }
    }

    fn number(&self, index: usize, column: &str) -> Result<f64> {
        self.raw(index)
            .parse::<f64>()
            .map_err(|_| self.invalid(index, column))
    }

    fn id(&self, index: usize, column: &str) -> Result<u64> {
        parse_id(self.raw(index)).ok_or_else(|| self.invalid(index, column))
    }
}

/// Integral floats at or above 2^53 no longer identify a single integer
const FLOAT_ID_LIMIT: f64 = 9_007_199_254_740_992.0;

/// Parse an id written either as an integer or as an integral float
///
/// Float-written ids must stay below 2^53; larger ids must be written as
/// plain integers.
pub(crate) fn parse_id(raw: &str) -> Option<u64> {
    if let Ok(id) = raw.parse::<u64>() {
        return Some(id);
    }
    let value = raw.parse::<f64>().ok()?;
    if value.is_finite() && value >= 0.0 && value.fract() == 0.0 && value < FLOAT_ID_LIMIT {
        Some(value as u64)
    } else {
        None
    }
}
