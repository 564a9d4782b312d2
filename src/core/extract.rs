//! Purpose: Turn raw electrophoresis region rows into one `Sample` per well.
//! Exports: `RegionRow`, `RegionClass`, `classify_region`, `extract_samples`, `Extraction`.
//! Role: Pure extraction layer between CSV ingestion and pool planning.
//! Invariants: At most one dimer and one library region per well; violations
//! fail that well only and leave its siblings untouched.
//! Invariants: Output molarities are nmol/l; pmol/l inputs are converted here.
use std::collections::BTreeMap;

use crate::core::error::{Error, ErrorKind};
use crate::core::sample::{MolarityUnit, Sample};

pub const DIMER_MAX_FROM_BP: f64 = 160.0;
pub const DIMER_MAX_TO_BP: f64 = 200.0;
pub const LIBRARY_MIN_FROM_BP: f64 = 160.0;

/// One measured region from a compact region table, as parsed from the CSV.
#[derive(Clone, Debug, PartialEq)]
pub struct RegionRow {
    pub well: String,
    pub from_bp: f64,
    pub to_bp: f64,
    pub conc: Option<f64>,
    pub molarity: Option<f64>,
    pub unit: MolarityUnit,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RegionClass {
    Dimer,
    Library,
    Unclassified,
}

/// Classify a region by its base-pair span. Small fragments are adapter
/// dimers; everything starting at or above the library threshold is library
/// product. Spans matching neither rule are ignored.
pub fn classify_region(from_bp: f64, to_bp: f64) -> RegionClass {
    if from_bp <= DIMER_MAX_FROM_BP && to_bp <= DIMER_MAX_TO_BP {
        RegionClass::Dimer
    } else if from_bp >= LIBRARY_MIN_FROM_BP {
        RegionClass::Library
    } else {
        RegionClass::Unclassified
    }
}

/// Extraction outcome for one file: the samples that parsed cleanly plus the
/// per-well errors that did not stop the rest of the file.
#[derive(Debug, Default)]
pub struct Extraction {
    pub samples: Vec<Sample>,
    pub well_errors: Vec<Error>,
}

/// Group region rows by well and build one immutable `Sample` per well.
///
/// Wells iterate in sorted order so extraction output is deterministic for a
/// given input file regardless of row order.
pub fn extract_samples(file: &str, plate: u32, rows: &[RegionRow]) -> Extraction {
    let mut by_well: BTreeMap<&str, Vec<&RegionRow>> = BTreeMap::new();
    for row in rows {
        by_well.entry(row.well.as_str()).or_default().push(row);
    }

    let mut extraction = Extraction::default();
    for (well, well_rows) in by_well {
        match extract_well(file, plate, well, &well_rows) {
            Ok(sample) => extraction.samples.push(sample),
            Err(err) => extraction.well_errors.push(err),
        }
    }
    extraction
}

fn extract_well(
    file: &str,
    plate: u32,
    well: &str,
    rows: &[&RegionRow],
) -> Result<Sample, Error> {
    let mut dimer: Option<&RegionRow> = None;
    let mut library: Option<&RegionRow> = None;

    for &row in rows {
        match classify_region(row.from_bp, row.to_bp) {
            RegionClass::Dimer => {
                if dimer.replace(row).is_some() {
                    return Err(Error::new(ErrorKind::Data)
                        .with_message("multiple dimer regions in one well")
                        .with_path(file)
                        .with_well(well));
                }
            }
            RegionClass::Library => {
                if library.replace(row).is_some() {
                    return Err(Error::new(ErrorKind::Data)
                        .with_message("multiple library regions in one well")
                        .with_path(file)
                        .with_well(well));
                }
            }
            RegionClass::Unclassified => {}
        }
    }

    Ok(Sample {
        file: file.to_string(),
        plate,
        well: well.to_string(),
        dimer_conc: dimer.and_then(|row| row.conc),
        dimer_molarity: normalized_molarity(dimer),
        lib_conc: library.and_then(|row| row.conc),
        lib_molarity: normalized_molarity(library),
    })
}

fn normalized_molarity(row: Option<&RegionRow>) -> Option<f64> {
    let row = row?;
    row.molarity.map(|value| row.unit.to_nmol(value))
}
