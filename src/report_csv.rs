//! Purpose: Assemble and write the sub-pooling report CSV.
//! Exports: `columns`, `build_rows`, `write_report`, `default_output_path`.
//! Role: Output formatter; owns column names, row ordering, and cell text.
//! Invariants: Column order is stable once published; downstream liquid
//! handlers key on these exact names.
//! Invariants: Pooled rows sort by pool number then library molarity
//! descending; unpooled rows sort last with empty pool cells.
use std::path::{Path, PathBuf};

use equipool::core::error::{Error, ErrorKind};
use equipool::core::plan::{PoolingPlan, SampleAssignment};
use equipool::core::sample::Sample;
use equipool::core::well::well_position;

pub mod columns {
    // ── measurement block ──
    pub const FILE_NAME: &str = "FileName";
    pub const TAPE_WELL: &str = "Tape Well";
    pub const DIMER_CONC: &str = "Dimer Conc.";
    pub const DIMER_MOLARITY: &str = "Dimer Molarity";
    pub const LIB_CONC: &str = "Lib Conc.";
    pub const LIB_MOLARITY: &str = "Lib Molarity";
    pub const TARGET_RATIO: &str = "target ratio";

    // ── pooling block ──
    pub const SUB_POOL_NUMBER: &str = "sub-pool number";
    pub const VOLUME_ADDED: &str = "volume added";
    pub const TARGET_CONTRIBUTION: &str = "target molarity contribution";
    pub const SUB_POOL_VOLUME: &str = "sub-pool volume";
    pub const SUB_POOL_SAMPLES: &str = "sub-pool samples";
    pub const NOTES: &str = "notes";

    // ── liquid handling block ──
    pub const SOURCE_PLATE_LOCATION: &str = "SourcePlateLocation";
    pub const SOURCE_WELL_POSITION: &str = "SourceWellPosition";
    pub const VOL_SAMPLE: &str = "VolSample";
    pub const BUFFER_LOCATION: &str = "BufferLocation";
    pub const BUFFER_WELL_POSITION: &str = "BufferWellPosition";
    pub const VOL_BUFFER: &str = "VolBuffer";
    pub const DESTINATION_PLATE: &str = "DestinationPlate";
    pub const DESTINATION_WELL_POSITION: &str = "DestinationWellPosition";

    pub const ALL: [&str; 21] = [
        FILE_NAME,
        TAPE_WELL,
        DIMER_CONC,
        DIMER_MOLARITY,
        LIB_CONC,
        LIB_MOLARITY,
        TARGET_RATIO,
        SUB_POOL_NUMBER,
        VOLUME_ADDED,
        TARGET_CONTRIBUTION,
        SUB_POOL_VOLUME,
        SUB_POOL_SAMPLES,
        NOTES,
        SOURCE_PLATE_LOCATION,
        SOURCE_WELL_POSITION,
        VOL_SAMPLE,
        BUFFER_LOCATION,
        BUFFER_WELL_POSITION,
        VOL_BUFFER,
        DESTINATION_PLATE,
        DESTINATION_WELL_POSITION,
    ];
}

const BUFFER_LOCATION_VALUE: &str = "TEBuffer[001]";
const BUFFER_WELL_POSITION_VALUE: &str = "1";
const DESTINATION_PLATE_VALUE: &str = "DestinationPlate[001]";

/// Build the report rows in output order.
///
/// `ratios` and `unpooled_notes` run parallel to `samples`; every sample is
/// either covered by a plan assignment (keyed by sample index) or carries an
/// unpooled note, never both.
pub fn build_rows(
    samples: &[Sample],
    ratios: &[Option<f64>],
    plan: &PoolingPlan,
    unpooled_notes: &[Option<String>],
) -> Vec<Vec<String>> {
    let mut rows = Vec::with_capacity(samples.len());
    for assignment in &plan.assignments {
        let sample = &samples[assignment.id];
        let ratio = ratios.get(assignment.id).copied().flatten();
        rows.push(pooled_row(sample, ratio, assignment));
    }
    for (idx, note) in unpooled_notes.iter().enumerate() {
        if let Some(note) = note {
            let sample = &samples[idx];
            let ratio = ratios.get(idx).copied().flatten();
            rows.push(unpooled_row(sample, ratio, note));
        }
    }
    rows
}

fn pooled_row(sample: &Sample, ratio: Option<f64>, assignment: &SampleAssignment) -> Vec<String> {
    let notes = assignment
        .advisories
        .iter()
        .map(|advisory| advisory.as_str())
        .collect::<Vec<_>>()
        .join("; ");
    vec![
        sample.file.clone(),
        sample.well.clone(),
        fmt_opt_num(sample.dimer_conc),
        fmt_opt_num(sample.dimer_molarity),
        fmt_opt_num(sample.lib_conc),
        fmt_opt_num(sample.lib_molarity),
        ratio.map(fmt_2dp).unwrap_or_default(),
        assignment.pool.to_string(),
        fmt_2dp(assignment.volume),
        fmt_2dp(assignment.target),
        fmt_2dp(assignment.pool_volume),
        assignment.pool_samples.to_string(),
        notes,
        source_plate_location(sample.plate),
        source_well_position(&sample.well),
        fmt_2dp(assignment.volume),
        BUFFER_LOCATION_VALUE.to_string(),
        BUFFER_WELL_POSITION_VALUE.to_string(),
        fmt_2dp(0.0),
        DESTINATION_PLATE_VALUE.to_string(),
        assignment.pool.to_string(),
    ]
}

fn unpooled_row(sample: &Sample, ratio: Option<f64>, note: &str) -> Vec<String> {
    vec![
        sample.file.clone(),
        sample.well.clone(),
        fmt_opt_num(sample.dimer_conc),
        fmt_opt_num(sample.dimer_molarity),
        fmt_opt_num(sample.lib_conc),
        fmt_opt_num(sample.lib_molarity),
        ratio.map(fmt_2dp).unwrap_or_default(),
        String::new(),
        String::new(),
        String::new(),
        String::new(),
        String::new(),
        note.to_string(),
        source_plate_location(sample.plate),
        source_well_position(&sample.well),
        String::new(),
        String::new(),
        String::new(),
        String::new(),
        String::new(),
        String::new(),
    ]
}

fn source_plate_location(plate: u32) -> String {
    format!("SourcePlate[{plate:03}]")
}

fn source_well_position(well: &str) -> String {
    well_position(well).unwrap_or(0).to_string()
}

/// Measured values echo back the way they parsed, without trailing zeros.
fn fmt_opt_num(value: Option<f64>) -> String {
    value.map(|value| format!("{value}")).unwrap_or_default()
}

fn fmt_2dp(value: f64) -> String {
    format!("{value:.2}")
}

/// `<input-dir>/output/<timestamp>_sub-pooling.csv`, local time when the
/// offset is known, UTC otherwise.
pub fn default_output_path(input_dir: &Path) -> PathBuf {
    input_dir
        .join("output")
        .join(format!("{}_sub-pooling.csv", path_timestamp()))
}

fn path_timestamp() -> String {
    let now =
        time::OffsetDateTime::now_local().unwrap_or_else(|_| time::OffsetDateTime::now_utc());
    format!(
        "{:04}-{:02}-{:02}_{:02}{:02}{:02}",
        now.year(),
        u8::from(now.month()),
        now.day(),
        now.hour(),
        now.minute(),
        now.second()
    )
}

pub fn write_report(path: &Path, rows: &[Vec<String>]) -> Result<(), Error> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to create output directory")
                .with_path(parent)
                .with_source(err)
        })?;
    }

    let mut writer = csv::Writer::from_path(path).map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message("failed to open report for writing")
            .with_path(path)
            .with_source(err)
    })?;
    writer.write_record(columns::ALL).map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message("failed to write report header")
            .with_path(path)
            .with_source(err)
    })?;
    for row in rows {
        writer.write_record(row).map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to write report row")
                .with_path(path)
                .with_source(err)
        })?;
    }
    writer.flush().map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message("failed to flush report")
            .with_path(path)
            .with_source(err)
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{build_rows, columns, default_output_path, write_report};
    use equipool::core::plan::{PoolCandidate, PoolParams, plan_pools};
    use equipool::core::sample::Sample;
    use std::path::Path;

    fn sample(well: &str, plate: u32, lib: Option<f64>) -> Sample {
        Sample {
            file: "plate.csv".to_string(),
            plate,
            well: well.to_string(),
            dimer_conc: Some(102.0),
            dimer_molarity: Some(1.2),
            lib_conc: Some(3240.0),
            lib_molarity: lib,
        }
    }

    #[test]
    fn pooled_rows_come_first_with_liquid_handling_cells() {
        let samples = vec![
            sample("A1", 2, Some(20.0)),
            sample("B7", 2, Some(18.0)),
            sample("C3", 2, None),
        ];
        let ratios = vec![Some(16.67), Some(15.0), None];
        let candidates = vec![
            PoolCandidate {
                id: 0,
                molarity: 20.0,
            },
            PoolCandidate {
                id: 1,
                molarity: 18.0,
            },
        ];
        let plan = plan_pools(&candidates, &PoolParams::default()).expect("plan");
        let unpooled = vec![None, None, Some("No library region detected".to_string())];

        let rows = build_rows(&samples, &ratios, &plan, &unpooled);
        assert_eq!(rows.len(), 3);

        let first = &rows[0];
        assert_eq!(first.len(), columns::ALL.len());
        assert_eq!(first[1], "A1");
        assert_eq!(first[5], "20");
        assert_eq!(first[6], "16.67");
        assert_eq!(first[7], "1");
        assert_eq!(first[8], "3.00");
        assert_eq!(first[9], "60.00");
        assert_eq!(first[13], "SourcePlate[002]");
        assert_eq!(first[14], "1");
        assert_eq!(first[15], "3.00");
        assert_eq!(first[16], "TEBuffer[001]");
        assert_eq!(first[17], "1");
        assert_eq!(first[18], "0.00");
        assert_eq!(first[19], "DestinationPlate[001]");
        assert_eq!(first[20], "1");

        let second = &rows[1];
        assert_eq!(second[1], "B7");
        assert_eq!(second[8], "3.33");

        let last = &rows[2];
        assert_eq!(last[1], "C3");
        assert_eq!(last[7], "");
        assert_eq!(last[12], "No library region detected");
        assert_eq!(last[14], "27");
        assert_eq!(last[20], "");
    }

    #[test]
    fn invalid_wells_encode_source_position_zero() {
        let samples = vec![sample("Z99", 1, Some(6.0))];
        let ratios = vec![None];
        let candidates = vec![PoolCandidate {
            id: 0,
            molarity: 6.0,
        }];
        let plan = plan_pools(&candidates, &PoolParams::default()).expect("plan");
        let rows = build_rows(&samples, &ratios, &plan, &[None]);
        assert_eq!(rows[0][14], "0");
    }

    #[test]
    fn report_round_trips_through_the_csv_writer() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("out").join("report.csv");
        let rows = vec![vec![String::from("x"); columns::ALL.len()]];
        write_report(&path, &rows).expect("write");

        let mut reader = csv::Reader::from_path(&path).expect("read");
        let headers = reader.headers().expect("headers").clone();
        assert_eq!(headers.len(), columns::ALL.len());
        assert_eq!(&headers[0], "FileName");
        assert_eq!(&headers[20], "DestinationWellPosition");
        assert_eq!(reader.records().count(), 1);
    }

    #[test]
    fn default_output_path_lands_in_output_with_timestamped_name() {
        let path = default_output_path(Path::new("/data/run4"));
        assert_eq!(path.parent().unwrap(), Path::new("/data/run4/output"));
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.ends_with("_sub-pooling.csv"));
        // timestamp shape: 2026-01-05_101500
        assert_eq!(name.len(), "2026-01-05_101500_sub-pooling.csv".len());
        assert!(name[..4].chars().all(|c| c.is_ascii_digit()));
    }
}
