//! CSV adapters around the scoring core
//!
//! The core takes plain collections and hands back score tables. These
//! modules are the concrete external layer used by the CLI: they read the
//! facility, population and OD tables exported from a GIS, and write scores
//! either as a standalone table or joined onto an existing attribute table.

pub mod loader;
pub mod publish;

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::core::config::OverwriteBehavior;
use crate::core::error::{Error, Result};

pub use loader::{load_inputs, read_facilities, read_od_edges, read_population, LoadedInputs};
pub use publish::{CsvScorePublisher, FacilitySummaryPublisher, JoinedCsvPublisher};

/// Check whether `path` may be written under `behavior`
pub fn check_overwrite_permission(path: &Path, behavior: OverwriteBehavior) -> Result<()> {
    if !path.exists() {
        return Ok(());
    }
    match behavior {
        OverwriteBehavior::Force => {
            log::warn!("Overwriting existing file: {}", path.display());
            Ok(())
        }
        OverwriteBehavior::NeverOverwrite => Err(Error::OutputExists(path.to_path_buf())),
    }
}

/// Write a file through a sibling `.partial` file renamed into place
///
/// A failure half-way leaves the destination untouched.
pub fn write_atomically<F>(path: &Path, behavior: OverwriteBehavior, write: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<()>,
{
    check_overwrite_permission(path, behavior)?;

    let partial = partial_path(path);
    let result: Result<()> = (|| {
        let mut writer = BufWriter::new(File::create(&partial)?);
        write(&mut writer)?;
        writer.flush()?;
        Ok(())
    })();

    match result {
        Ok(()) => {
            std::fs::rename(&partial, path)?;
            log::info!("Wrote {}", path.display());
            Ok(())
        }
        Err(e) => {
            let _ = std::fs::remove_file(&partial);
            Err(e)
        }
    }
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".partial");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_never_overwrite_existing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("scores.csv");
        std::fs::write(&path, "old").unwrap();

        let err = check_overwrite_permission(&path, OverwriteBehavior::NeverOverwrite).unwrap_err();
        assert!(matches!(err, Error::OutputExists(_)));
        assert!(check_overwrite_permission(&path, OverwriteBehavior::Force).is_ok());
    }

    #[test]
    fn test_failed_write_leaves_destination_untouched() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("scores.csv");
        std::fs::write(&path, "old").unwrap();

        let result = write_atomically(&path, OverwriteBehavior::Force, |w| {
            w.write_all(b"new")?;
            Err(Error::Cancelled)
        });
        assert!(result.is_err());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "old");
        assert!(!partial_path(&path).exists());
    }

    #[test]
    fn test_successful_write_replaces_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("scores.csv");

        write_atomically(&path, OverwriteBehavior::NeverOverwrite, |w| {
            w.write_all(b"origin_id\n")?;
            Ok(())
        })
        .unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "origin_id\n");
    }
}
