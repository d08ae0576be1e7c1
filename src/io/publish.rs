//! CSV result publishers
//!
//! All writers go through [`write_atomically`] so an aborted run never leaves
//! a half-written table behind.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, Trim, Writer};
use serde::Serialize;

use crate::core::config::OverwriteBehavior;
use crate::core::edges::OriginId;
use crate::core::error::Result;
use crate::core::pipeline::RunOutput;
use crate::core::publish::ResultPublisher;
use crate::io::loader::{column_index, parse_id};
use crate::io::{check_overwrite_permission, write_atomically};

const FACILITY_COUNT_COLUMN: &str = "facility_count";

/// One row per origin: `origin_id,facility_count,<label>...`
///
/// Origins reached in one run but not another get an empty cell.
#[derive(Debug, Clone)]
pub struct CsvScorePublisher {
    path: PathBuf,
    overwrite: OverwriteBehavior,
}

impl CsvScorePublisher {
    pub fn new(path: impl Into<PathBuf>, overwrite: OverwriteBehavior) -> Self {
        Self {
            path: path.into(),
            overwrite,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ResultPublisher for CsvScorePublisher {
    fn check(&self) -> Result<()> {
        check_overwrite_permission(&self.path, self.overwrite)
    }

    fn publish(&mut self, runs: &[RunOutput]) -> Result<()> {
        let table = WideTable::build(runs);
        write_atomically(&self.path, self.overwrite, |out| {
            let mut writer = Writer::from_writer(out);
            let mut header = vec!["origin_id".to_string(), FACILITY_COUNT_COLUMN.to_string()];
            header.extend(table.labels.iter().cloned());
            writer.write_record(&header)?;

            for (origin, row) in &table.rows {
                let mut record = vec![origin.to_string(), row.facility_count.to_string()];
                record.extend(row.cells());
                writer.write_record(&record)?;
            }
            writer.flush()?;
            Ok(())
        })
    }
}

/// Left-joins the scores onto an existing attribute table
///
/// Score columns already present in the join table are dropped first, so
/// re-running a method replaces its column instead of duplicating it. Rows
/// whose key matches no scored origin keep an empty score.
#[derive(Debug, Clone)]
pub struct JoinedCsvPublisher {
    join_table: PathBuf,
    key_column: String,
    output: PathBuf,
    overwrite: OverwriteBehavior,
}

impl JoinedCsvPublisher {
    pub fn new(
        join_table: impl Into<PathBuf>,
        key_column: impl Into<String>,
        output: impl Into<PathBuf>,
        overwrite: OverwriteBehavior,
    ) -> Self {
        Self {
            join_table: join_table.into(),
            key_column: key_column.into(),
            output: output.into(),
            overwrite,
        }
    }
}

impl ResultPublisher for JoinedCsvPublisher {
    fn check(&self) -> Result<()> {
        check_overwrite_permission(&self.output, self.overwrite)?;
        let mut reader = ReaderBuilder::new().trim(Trim::All).from_path(&self.join_table)?;
        column_index(reader.headers()?, &self.key_column, &self.join_table)?;
        Ok(())
    }

    fn publish(&mut self, runs: &[RunOutput]) -> Result<()> {
        let table = WideTable::build(runs);
        let mut reader = ReaderBuilder::new().trim(Trim::All).from_path(&self.join_table)?;
        let headers = reader.headers()?.clone();
        let key_col = column_index(&headers, &self.key_column, &self.join_table)?;

        let replaced = |h: &str| h == FACILITY_COUNT_COLUMN || table.labels.iter().any(|l| l == h);
        let kept: Vec<usize> = (0..headers.len()).filter(|&i| !replaced(&headers[i])).collect();
        if kept.len() < headers.len() {
            log::info!(
                "Replacing {} existing score columns in {}",
                headers.len() - kept.len(),
                self.join_table.display()
            );
        }

        let mut unmatched = 0usize;
        write_atomically(&self.output, self.overwrite, |out| {
            let mut writer = Writer::from_writer(out);
            let mut header: Vec<String> = kept.iter().map(|&i| headers[i].to_string()).collect();
            header.push(FACILITY_COUNT_COLUMN.to_string());
            header.extend(table.labels.iter().cloned());
            writer.write_record(&header)?;

            for record in reader.records() {
                let record = record?;
                let mut out_record: Vec<String> =
                    kept.iter().map(|&i| record.get(i).unwrap_or("").to_string()).collect();

                let row = record
                    .get(key_col)
                    .and_then(parse_id)
                    .and_then(|id| table.rows.get(&OriginId(id)));
                match row {
                    Some(row) => {
                        out_record.push(row.facility_count.to_string());
                        out_record.extend(row.cells());
                    }
                    None => {
                        unmatched += 1;
                        out_record.extend(std::iter::repeat(String::new()).take(table.labels.len() + 1));
                    }
                }
                writer.write_record(&out_record)?;
            }
            writer.flush()?;
            Ok(())
        })?;

        if unmatched > 0 {
            log::info!("{unmatched} rows of {} have no reachable facility", self.join_table.display());
        }
        Ok(())
    }
}

/// Per-facility statistics of every run, one row per (run, facility)
#[derive(Debug, Clone)]
pub struct FacilitySummaryPublisher {
    path: PathBuf,
    overwrite: OverwriteBehavior,
}

impl FacilitySummaryPublisher {
    pub fn new(path: impl Into<PathBuf>, overwrite: OverwriteBehavior) -> Self {
        Self {
            path: path.into(),
            overwrite,
        }
    }
}

#[derive(Serialize)]
struct FacilitySummaryRow<'a> {
    method: &'a str,
    facility_id: u64,
    capacity: f64,
    demand: f64,
    ratio: f64,
    origin_count: usize,
}

impl ResultPublisher for FacilitySummaryPublisher {
    fn check(&self) -> Result<()> {
        check_overwrite_permission(&self.path, self.overwrite)
    }

    fn publish(&mut self, runs: &[RunOutput]) -> Result<()> {
        write_atomically(&self.path, self.overwrite, |out| {
            let mut writer = Writer::from_writer(out);
            for run in runs {
                let label = run.method.label();
                let mut facilities = run.facilities.clone();
                facilities.sort_by_key(|f| f.facility);
                for f in facilities {
                    writer.serialize(FacilitySummaryRow {
                        method: &label,
                        facility_id: f.facility.0,
                        capacity: f.capacity,
                        demand: f.demand,
                        ratio: f.ratio,
                        origin_count: f.origin_count,
                    })?;
                }
            }
            writer.flush()?;
            Ok(())
        })
    }
}

/// Scores of several runs outer-joined on origin id
struct WideTable {
    labels: Vec<String>,
    rows: BTreeMap<OriginId, WideRow>,
}

struct WideRow {
    facility_count: usize,
    scores: Vec<Option<f64>>,
}

impl WideRow {
    fn cells(&self) -> impl Iterator<Item = String> + '_ {
        self.scores
            .iter()
            .map(|s| s.map(|v| v.to_string()).unwrap_or_default())
    }
}

impl WideTable {
    fn build(runs: &[RunOutput]) -> Self {
        let labels: Vec<String> = runs.iter().map(|r| r.scores.label.clone()).collect();
        let mut rows: BTreeMap<OriginId, WideRow> = BTreeMap::new();
        for (column, run) in runs.iter().enumerate() {
            for score in &run.scores.scores {
                let row = rows.entry(score.origin).or_insert_with(|| WideRow {
                    facility_count: score.facility_count,
                    scores: vec![None; labels.len()],
                });
                row.scores[column] = Some(score.score);
            }
        }
        Self { labels, rows }
    }
}
