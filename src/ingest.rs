//! Purpose: Parse plate CSV exports into samples with explicit, testable schema mapping.
//! Exports: `ColumnSchema`, `PlateIngest`, `ingest_plate`, `decode_text`.
//! Role: Input ingestion engine used by the CLI; isolates file decoding from main.
//! Invariants: The column schema is validated once per file; a missing column
//! fails that file, never the whole run.
//! Invariants: Molarity units come from the matched header and are normalized
//! to nmol/l during extraction.
use std::path::Path;

use bstr::ByteSlice;
use tracing::debug;

use equipool::core::error::{Error, ErrorKind};
use equipool::core::extract::{RegionRow, extract_samples};
use equipool::core::sample::{MolarityUnit, Sample};

pub const COL_WELL: &str = "WellId";
pub const COL_FROM_BP: &str = "From [bp]";
pub const COL_TO_BP: &str = "To [bp]";
pub const COL_FILE_NAME: &str = "FileName";
const CONC_MARKER: &str = "Conc.";
const MOLARITY_MARKER: &str = "Region Molarity";
const MAX_SNIPPET_BYTES: usize = 120;

/// Column indexes for one file, resolved once from its header row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnSchema {
    pub well: usize,
    pub from_bp: usize,
    pub to_bp: usize,
    pub conc: usize,
    pub molarity: usize,
    pub unit: MolarityUnit,
    pub file_name: Option<usize>,
}

impl ColumnSchema {
    /// Match the header row against the export format: exact names for the
    /// well and bp-span columns, marker matches for the concentration and
    /// molarity columns (whose full names embed instrument units).
    pub fn detect(headers: &csv::StringRecord) -> Result<Self, Error> {
        let mut well = None;
        let mut from_bp = None;
        let mut to_bp = None;
        let mut conc = None;
        let mut molarity = None;
        let mut file_name = None;

        for (idx, raw) in headers.iter().enumerate() {
            let header = raw.trim();
            match header {
                COL_WELL => well = Some(idx),
                COL_FROM_BP => from_bp = Some(idx),
                COL_TO_BP => to_bp = Some(idx),
                COL_FILE_NAME => file_name = Some(idx),
                _ => {
                    if header.contains(CONC_MARKER) && conc.is_none() {
                        conc = Some(idx);
                    }
                    if header.contains(MOLARITY_MARKER) && molarity.is_none() {
                        let lowered = header.to_lowercase();
                        if lowered.contains("pmol") {
                            molarity = Some((idx, MolarityUnit::PmolPerL));
                        } else if lowered.contains("nmol") {
                            molarity = Some((idx, MolarityUnit::NmolPerL));
                        }
                    }
                }
            }
        }

        let mut missing = Vec::new();
        if well.is_none() {
            missing.push(COL_WELL);
        }
        if from_bp.is_none() {
            missing.push(COL_FROM_BP);
        }
        if to_bp.is_none() {
            missing.push(COL_TO_BP);
        }
        if conc.is_none() {
            missing.push("Conc.");
        }
        if molarity.is_none() {
            missing.push("Region Molarity (nmol/l or pmol/l)");
        }
        if !missing.is_empty() {
            let available = headers
                .iter()
                .map(str::trim)
                .collect::<Vec<_>>()
                .join(", ");
            return Err(Error::new(ErrorKind::Data).with_message(format!(
                "required columns missing: {}; available columns: {available}",
                missing.join(", ")
            )));
        }

        let (molarity, unit) = molarity.unwrap_or((0, MolarityUnit::NmolPerL));
        Ok(Self {
            well: well.unwrap_or(0),
            from_bp: from_bp.unwrap_or(0),
            to_bp: to_bp.unwrap_or(0),
            conc: conc.unwrap_or(0),
            molarity,
            unit,
            file_name,
        })
    }
}

/// Ingestion outcome for one plate file.
#[derive(Debug)]
pub struct PlateIngest {
    /// Source-file label used in the report: the export's own `FileName`
    /// column when present, otherwise the on-disk name.
    pub file: String,
    pub plate: u32,
    pub encoding: &'static str,
    pub rows_total: usize,
    pub rows_skipped: usize,
    pub samples: Vec<Sample>,
    pub well_errors: Vec<Error>,
}

/// Read, decode, and extract one plate CSV. Any error returned here means
/// the whole file is unusable; callers skip it and keep going.
pub fn ingest_plate(path: &Path, name: &str, plate: u32) -> Result<PlateIngest, Error> {
    let bytes = std::fs::read(path).map_err(|err| match err.kind() {
        std::io::ErrorKind::PermissionDenied => Error::new(ErrorKind::Permission)
            .with_message("cannot read input file")
            .with_path(path)
            .with_source(err),
        _ => Error::new(ErrorKind::Io)
            .with_message("failed to read input file")
            .with_path(path)
            .with_source(err),
    })?;
    let (text, encoding) = decode_text(bytes);
    debug!(file = name, encoding, "decoded plate csv");

    let mut reader = csv::Reader::from_reader(text.as_bytes());
    let headers = reader
        .headers()
        .map_err(|err| {
            Error::new(ErrorKind::Data)
                .with_message("failed to read CSV header row")
                .with_path(path)
                .with_source(err)
        })?
        .clone();
    let schema = ColumnSchema::detect(&headers).map_err(|err| err.with_path(path))?;

    let mut rows: Vec<RegionRow> = Vec::new();
    let mut rows_total = 0usize;
    let mut rows_skipped = 0usize;
    let mut file_label: Option<String> = None;

    for record in reader.records() {
        let record = record.map_err(|err| record_error(path, &text, err))?;
        rows_total += 1;

        if file_label.is_none()
            && let Some(idx) = schema.file_name
        {
            let value = record.get(idx).unwrap_or("").trim();
            if !value.is_empty() {
                file_label = Some(value.to_string());
            }
        }

        let well = record.get(schema.well).unwrap_or("").trim();
        if well.is_empty() {
            rows_skipped += 1;
            continue;
        }
        let (Some(from_bp), Some(to_bp)) = (
            parse_number(record.get(schema.from_bp)),
            parse_number(record.get(schema.to_bp)),
        ) else {
            rows_skipped += 1;
            debug!(file = name, well, "skipping region row without a usable bp span");
            continue;
        };

        rows.push(RegionRow {
            well: well.to_string(),
            from_bp,
            to_bp,
            conc: parse_number(record.get(schema.conc)),
            molarity: parse_number(record.get(schema.molarity)),
            unit: schema.unit,
        });
    }

    let file = file_label.unwrap_or_else(|| name.to_string());
    let extraction = extract_samples(&file, plate, &rows);
    Ok(PlateIngest {
        file,
        plate,
        encoding,
        rows_total,
        rows_skipped,
        samples: extraction.samples,
        well_errors: extraction.well_errors,
    })
}

/// Decode file bytes as UTF-8 with a Latin-1 fallback, stripping a UTF-8 BOM.
/// The fallback covers the µ-bearing single-byte encodings these instruments
/// export with. Returns the text and the encoding label used.
pub fn decode_text(bytes: Vec<u8>) -> (String, &'static str) {
    match String::from_utf8(bytes) {
        Ok(text) => match text.strip_prefix('\u{feff}') {
            Some(rest) => (rest.to_string(), "utf-8"),
            None => (text, "utf-8"),
        },
        Err(err) => {
            let bytes = err.into_bytes();
            (bytes.iter().map(|&byte| byte as char).collect(), "latin-1")
        }
    }
}

fn parse_number(field: Option<&str>) -> Option<f64> {
    let text = field?.trim();
    if text.is_empty() || text == "-" {
        return None;
    }
    text.parse().ok()
}

fn record_error(path: &Path, text: &str, err: csv::Error) -> Error {
    let message = match err.position() {
        Some(position) => format!(
            "malformed CSV record at line {}: {}",
            position.line(),
            line_snippet(text.as_bytes(), position.byte() as usize)
        ),
        None => "malformed CSV record".to_string(),
    };
    Error::new(ErrorKind::Data)
        .with_message(message)
        .with_path(path)
        .with_source(err)
}

fn line_snippet(bytes: &[u8], offset: usize) -> String {
    let start = offset.min(bytes.len());
    let rest = &bytes[start..];
    let end = rest.find_byte(b'\n').unwrap_or(rest.len());
    truncate_snippet(&rest[..end].to_str_lossy(), MAX_SNIPPET_BYTES)
}

fn truncate_snippet(input: &str, max: usize) -> String {
    let mut snippet = String::new();
    if input.len() <= max {
        snippet.push_str(input);
        return snippet;
    }
    let suffix = "...";
    if max <= suffix.len() {
        snippet.push_str(&suffix[..max]);
        return snippet;
    }
    let mut take = max - suffix.len();
    while !input.is_char_boundary(take) {
        take -= 1;
    }
    snippet.push_str(&input[..take]);
    snippet.push_str(suffix);
    snippet
}
