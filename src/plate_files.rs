//! Purpose: Resolve input CSV files and their plate numbering for a run.
//! Exports: `PlateFile`, `discover_plates`, `plate_label`.
//! Role: Keep input-directory semantics in one place for the CLI and tests.
//! Invariants: Plate numbers are 1-based in sorted file-name order.
//! Invariants: Previous planner outputs (`*sub-pooling.csv`) are never inputs.

use std::io;
use std::path::{Path, PathBuf};

use equipool::core::error::{Error, ErrorKind};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlateFile {
    pub path: PathBuf,
    pub name: String,
    pub plate: u32,
}

/// List the plate CSVs in `dir`, sorted by file name and numbered from 1.
///
/// The scan is non-recursive, so a previous run's `output/` directory never
/// feeds back into the next run.
pub fn discover_plates(dir: &Path) -> Result<Vec<PlateFile>, Error> {
    let entries = std::fs::read_dir(dir).map_err(|err| match err.kind() {
        io::ErrorKind::NotFound => Error::new(ErrorKind::NotFound)
            .with_message("input directory not found")
            .with_path(dir),
        io::ErrorKind::PermissionDenied => Error::new(ErrorKind::Permission)
            .with_message("cannot read input directory")
            .with_path(dir)
            .with_source(err),
        _ => Error::new(ErrorKind::Io)
            .with_message("failed to read input directory")
            .with_path(dir)
            .with_source(err),
    })?;

    let mut found: Vec<(String, PathBuf)> = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to read directory entry")
                .with_path(dir)
                .with_source(err)
        })?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
            continue;
        };
        if !has_csv_extension(name) || is_planner_output(name) {
            continue;
        }
        found.push((name.to_string(), path));
    }

    if found.is_empty() {
        return Err(Error::new(ErrorKind::NotFound)
            .with_message("no input CSV files found")
            .with_path(dir)
            .with_hint("Export compact region tables as .csv into this directory."));
    }

    found.sort();
    Ok(found
        .into_iter()
        .enumerate()
        .map(|(idx, (name, path))| PlateFile {
            path,
            name,
            plate: idx as u32 + 1,
        })
        .collect())
}

fn has_csv_extension(name: &str) -> bool {
    Path::new(name)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
}

fn is_planner_output(name: &str) -> bool {
    name.to_ascii_lowercase().ends_with("sub-pooling.csv")
}

pub fn plate_label(plate: u32) -> String {
    format!("Plate {plate:03}")
}
