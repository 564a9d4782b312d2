//! Purpose: `equipool` CLI entry point and command dispatch.
//! Role: Binary crate root; parses args, runs the planner, writes the report.
//! Invariants: Commands emit stable stdout formats (human or JSON by command/flags).
//! Invariants: Non-interactive errors are emitted as JSON on stderr.
//! Invariants: Process exit code is derived from `core::error::to_exit_code`.
//! Invariants: Skipped files, dropped wells, and unpooled samples surface as
//! stderr notices, never as silent omissions.
#![allow(clippy::result_large_err)]
use std::ffi::OsString;
use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::{
    CommandFactory, Parser, Subcommand, ValueEnum, ValueHint,
    error::ErrorKind as ClapErrorKind,
};
use clap_complete::aot::Shell;
use serde_json::{Map, Value, json};
use tracing::debug;
use tracing_subscriber::EnvFilter;

mod command_dispatch;
mod ingest;
mod plate_files;
mod report_csv;

use equipool::core::error::{Error, ErrorKind, to_exit_code};
use equipool::core::plan::{PoolCandidate, PoolParams, PoolingPlan, plan_pools};
use equipool::core::sample::{Sample, target_ratio};
use equipool::notice::{Notice, notice_json};
use plate_files::{PlateFile, discover_plates, plate_label};

#[derive(Copy, Clone, Debug)]
struct RunOutcome {
    exit_code: i32,
}

impl RunOutcome {
    fn ok() -> Self {
        Self { exit_code: 0 }
    }

    fn with_code(exit_code: i32) -> Self {
        Self { exit_code }
    }
}

fn main() {
    let exit_code = match run() {
        Ok(outcome) => outcome.exit_code,
        Err((err, color_mode)) => {
            emit_error(&err, color_mode);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run() -> Result<RunOutcome, (Error, ColorMode)> {
    let cli = match Cli::try_parse_from(normalize_args(std::env::args_os())) {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp
            | ClapErrorKind::DisplayVersion
            | ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                err.print().map_err(|io_err| {
                    (
                        Error::new(ErrorKind::Io)
                            .with_message("failed to write help")
                            .with_source(io_err),
                        ColorMode::Auto,
                    )
                })?;
                let exit_code = if matches!(
                    err.kind(),
                    ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
                ) {
                    2
                } else {
                    0
                };
                return Ok(RunOutcome::with_code(exit_code));
            }
            _ => {
                let message = clap_error_summary(&err);
                let hint = clap_error_hint(&err);
                return Err((
                    Error::new(ErrorKind::Usage)
                        .with_message(message)
                        .with_hint(hint),
                    ColorMode::Auto,
                ));
            }
        },
    };

    init_tracing();
    let color_mode = cli.color;

    let result = command_dispatch::dispatch_command(cli.command, color_mode);

    result
        .map_err(add_io_hint)
        .map_err(add_data_hint)
        .map_err(add_internal_hint)
        .map_err(|err| (err, color_mode))
}

fn normalize_args<I>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = OsString>,
{
    args.into_iter()
        .map(|arg| {
            let replacement = arg.to_str().and_then(|value| match value {
                "---help" => Some("--help"),
                "---version" => Some("--version"),
                _ => None,
            });
            replacement.map(OsString::from).unwrap_or_else(|| arg)
        })
        .collect()
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

#[derive(Parser)]
#[command(
    name = "equipool",
    version,
    about = "Equimolar sub-pool planning for sequencing libraries",
    help_template = r#"{about-with-newline}
{before-help}USAGE
  {usage}

COMMANDS
{subcommands}

OPTIONS
{options}

{after-help}
"#,
    long_about = None,
    before_help = r#"Reads compact region-table exports (one CSV per plate), pairs each well's
dimer and library regions, and plans equimolar sub-pools.

Mental model:
  - `plan` turns a folder of plate exports into one pooling strategy CSV
  - the strongest unassigned sample seeds each pool at its type's minimum volume
  - samples join while their required volume stays pipettable
"#,
    after_help = r#"EXAMPLES
  $ equipool plan ./hsd1000-exports
  $ equipool plan ./hsd1000-exports --max-samples 24
  $ equipool plan ./hsd1000-exports --json | jq '.plan.pools'

LEARN MORE
  $ equipool <command> --help"#,
    arg_required_else_help = true,
    disable_help_subcommand = false
)]
struct Cli {
    #[arg(
        long,
        default_value = "auto",
        value_enum,
        help = "Colorize stderr diagnostics and pretty-print piped JSON: auto|always|never"
    )]
    color: ColorMode,

    #[command(subcommand)]
    command: Command,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ColorMode {
    Auto,
    Always,
    Never,
}

impl ColorMode {
    fn use_color(self, is_tty: bool) -> bool {
        match self {
            ColorMode::Auto => is_tty,
            ColorMode::Always => true,
            ColorMode::Never => false,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    #[command(
        arg_required_else_help = true,
        about = "Plan sub-pools from a folder of plate exports",
        long_about = r#"Read every region-table export in INPUT_DIR, pair dimer and library
regions per well, and write a timestamped sub-pooling strategy CSV.

Exports are assigned plate numbers in file-name order. Prior strategy
outputs (files ending in sub-pooling.csv) are ignored."#,
        after_help = r#"EXAMPLES
  $ equipool plan ./hsd1000-exports
  $ equipool plan ./hsd1000-exports --max-samples 24
  $ equipool plan ./hsd1000-exports --output strategy.csv
  $ equipool plan ./hsd1000-exports --json

NOTES
  - Default report path: INPUT_DIR/output/<timestamp>_sub-pooling.csv
  - Skipped files, dropped wells, and unpooled samples are stderr notices"#
    )]
    Plan {
        #[arg(
            value_name = "INPUT_DIR",
            help = "Folder of plate region exports (.csv)",
            value_hint = ValueHint::DirPath
        )]
        input_dir: PathBuf,
        #[arg(
            long,
            default_value_t = 48,
            value_parser = clap::value_parser!(u32).range(1..),
            help = "Largest sample count per sub-pool"
        )]
        max_samples: u32,
        #[arg(
            long,
            help = "Report path (default: timestamped file under INPUT_DIR/output)",
            value_hint = ValueHint::FilePath
        )]
        output: Option<PathBuf>,
        #[arg(long, help = "Emit JSON instead of human-readable output")]
        json: bool,
    },
    #[command(
        about = "Print version info as JSON",
        long_about = r#"Emit version info as JSON (stable, machine-readable)."#,
        after_help = r#"EXAMPLES
  $ equipool version"#
    )]
    Version,
    #[command(
        arg_required_else_help = true,
        about = "Generate shell completions",
        long_about = r#"Generate shell completion scripts.

Prints a completion script for the given shell to stdout.
Install the generated file in your shell's completion directory (or source it)
to enable tab completion."#,
        after_help = r#"EXAMPLES
  $ equipool completion bash > /etc/bash_completion.d/equipool
  $ equipool completion zsh > ~/.zfunc/_equipool
  $ autoload -U compinit && compinit
  $ equipool completion fish > ~/.config/fish/completions/equipool.fish"#
    )]
    Completion {
        #[arg(help = "Shell to generate completions for")]
        shell: Shell,
    },
}

struct PlanRequest {
    input_dir: PathBuf,
    max_samples: u32,
    output: Option<PathBuf>,
    json: bool,
}

struct PlanReport {
    plan: PoolingPlan,
    report_path: PathBuf,
    samples_total: usize,
    samples_unpooled: usize,
}

fn run_plan(request: PlanRequest, color_mode: ColorMode) -> Result<RunOutcome, Error> {
    let plates = discover_plates(&request.input_dir)?;

    let mut samples: Vec<Sample> = Vec::new();
    for plate in &plates {
        match ingest::ingest_plate(&plate.path, &plate.name, plate.plate) {
            Ok(ingest) => {
                debug!(
                    file = %ingest.file,
                    plate = ingest.plate,
                    encoding = ingest.encoding,
                    rows = ingest.rows_total,
                    skipped = ingest.rows_skipped,
                    "ingested region table"
                );
                for err in &ingest.well_errors {
                    emit_notice(&well_error_notice(&plate.name, err), color_mode);
                }
                samples.extend(ingest.samples);
            }
            Err(err) => {
                emit_notice(&skipped_file_notice(&plate.name, &err), color_mode);
            }
        }
    }
    if samples.is_empty() {
        return Err(Error::new(ErrorKind::Data)
            .with_message("no usable samples in any region export")
            .with_path(&request.input_dir)
            .with_hint("Check that the exports are compact region tables with dimer and library rows."));
    }

    let mut ratios: Vec<Option<f64>> = Vec::with_capacity(samples.len());
    let mut unpooled_notes: Vec<Option<String>> = vec![None; samples.len()];
    let mut candidates = Vec::new();
    for (idx, sample) in samples.iter().enumerate() {
        match target_ratio(sample) {
            Ok(ratio) => ratios.push(Some(ratio)),
            Err(err) => {
                ratios.push(None);
                emit_notice(&no_ratio_notice(sample, &err), color_mode);
            }
        }
        match sample.poolable_molarity() {
            Some(molarity) => candidates.push(PoolCandidate { id: idx, molarity }),
            None => {
                let note = unpooled_note(sample);
                emit_notice(&unpooled_notice(sample, &note), color_mode);
                unpooled_notes[idx] = Some(note);
            }
        }
    }
    if candidates.is_empty() {
        return Err(Error::new(ErrorKind::Data)
            .with_message("no poolable samples")
            .with_path(&request.input_dir)
            .with_hint("Every sample is missing a usable library molarity; check the region tables."));
    }

    let params = PoolParams {
        max_samples_per_pool: request.max_samples as usize,
    };
    let plan = plan_pools(&candidates, &params)?;

    let report_path = request
        .output
        .clone()
        .unwrap_or_else(|| report_csv::default_output_path(&request.input_dir));
    let rows = report_csv::build_rows(&samples, &ratios, &plan, &unpooled_notes);
    report_csv::write_report(&report_path, &rows)?;

    let report = PlanReport {
        plan,
        report_path,
        samples_total: samples.len(),
        samples_unpooled: unpooled_notes.iter().flatten().count(),
    };
    if request.json {
        emit_json(plan_json(&plates, &report), color_mode);
    } else {
        for line in build_plan_summary_lines(&plates, &report) {
            println!("{line}");
        }
    }
    Ok(RunOutcome::ok())
}

fn unpooled_note(sample: &Sample) -> String {
    match sample.lib_molarity {
        None => "Not pooled - no library molarity".to_string(),
        Some(_) => "Not pooled - library molarity not usable".to_string(),
    }
}

fn skipped_file_notice(file: &str, err: &Error) -> Notice {
    let mut details = Map::new();
    details.insert("error".to_string(), error_json(err)["error"].clone());
    Notice {
        kind: "skipped-file".to_string(),
        time: notice_time_now().unwrap_or_default(),
        cmd: "plan".to_string(),
        file: file.to_string(),
        well: None,
        message: error_message(err),
        details,
    }
}

fn well_error_notice(file: &str, err: &Error) -> Notice {
    Notice {
        kind: "skipped-well".to_string(),
        time: notice_time_now().unwrap_or_default(),
        cmd: "plan".to_string(),
        file: file.to_string(),
        well: err.well().map(str::to_string),
        message: error_message(err),
        details: Map::new(),
    }
}

fn no_ratio_notice(sample: &Sample, err: &Error) -> Notice {
    Notice {
        kind: "no-ratio".to_string(),
        time: notice_time_now().unwrap_or_default(),
        cmd: "plan".to_string(),
        file: sample.file.clone(),
        well: Some(sample.well.clone()),
        message: error_message(err),
        details: Map::new(),
    }
}

fn unpooled_notice(sample: &Sample, note: &str) -> Notice {
    Notice {
        kind: "unpooled-sample".to_string(),
        time: notice_time_now().unwrap_or_default(),
        cmd: "plan".to_string(),
        file: sample.file.clone(),
        well: Some(sample.well.clone()),
        message: note.to_string(),
        details: Map::new(),
    }
}

fn build_plan_summary_lines(plates: &[PlateFile], report: &PlanReport) -> Vec<String> {
    let mut lines = Vec::new();
    lines.push("Plate Assignment:".to_string());
    for plate in plates {
        lines.push(format!("  {}: {}", plate_label(plate.plate), plate.name));
    }
    lines.push(String::new());
    lines.push(format!(
        "Pooling strategy saved to: {}",
        report.report_path.display()
    ));
    lines.push(format!(
        "Processed {} samples into {} sub-pools",
        report.samples_total,
        report.plan.pools.len()
    ));
    if report.samples_unpooled > 0 {
        lines.push(format!(
            "Unpooled samples: {} (see the notes column)",
            report.samples_unpooled
        ));
    }
    lines.push(String::new());
    lines.push("Sub-pool Summary:".to_string());
    for pool in &report.plan.pools {
        lines.push(format!(
            "Pool {}: {} samples, {:.1}ul total",
            pool.number, pool.samples, pool.volume
        ));
    }
    lines
}

fn plan_json(plates: &[PlateFile], report: &PlanReport) -> Value {
    let plate_values = plates
        .iter()
        .map(|plate| {
            json!({
                "plate": plate.plate,
                "label": plate_label(plate.plate),
                "file": plate.name,
            })
        })
        .collect::<Vec<_>>();
    let pool_values = report
        .plan
        .pools
        .iter()
        .map(|pool| {
            json!({
                "number": pool.number,
                "type": pool.pool_type.label(),
                "volume_ul": pool.volume,
                "samples": pool.samples,
            })
        })
        .collect::<Vec<_>>();
    json!({
        "plan": {
            "plates": plate_values,
            "samples": {
                "total": report.samples_total,
                "pooled": report.samples_total - report.samples_unpooled,
                "unpooled": report.samples_unpooled,
            },
            "pools": pool_values,
            "report": report.report_path.display().to_string(),
        }
    })
}

fn add_io_hint(err: Error) -> Error {
    if err.hint().is_some() {
        return err;
    }
    match err.kind() {
        ErrorKind::Permission => err.with_hint(
            "Permission denied. Check permissions on the export folder and its output directory.",
        ),
        ErrorKind::Io => err.with_hint("I/O error. Check the path, filesystem, and disk space."),
        _ => err,
    }
}

fn add_data_hint(err: Error) -> Error {
    if err.kind() != ErrorKind::Data || err.hint().is_some() {
        return err;
    }
    err.with_hint("Input did not match a compact region-table export. Check the CSV columns.")
}

fn add_internal_hint(err: Error) -> Error {
    if err.kind() != ErrorKind::Internal || err.hint().is_some() {
        return err;
    }
    err.with_hint(
        "Unexpected internal failure. Retry with RUST_BACKTRACE=1 and share command/context if it persists.",
    )
}

fn emit_version_output(color_mode: ColorMode) {
    if io::stdout().is_terminal() {
        println!("equipool {}", env!("CARGO_PKG_VERSION"));
    } else {
        emit_json(
            json!({
                "name": "equipool",
                "version": env!("CARGO_PKG_VERSION"),
            }),
            color_mode,
        );
    }
}

fn emit_json(value: serde_json::Value, color_mode: ColorMode) {
    let is_tty = io::stdout().is_terminal();
    let pretty = is_tty || color_mode.use_color(is_tty);
    let json = if pretty {
        serde_json::to_string_pretty(&value)
            .unwrap_or_else(|_| "{\"error\":\"json encode failed\"}".to_string())
    } else {
        serde_json::to_string(&value)
            .unwrap_or_else(|_| "{\"error\":\"json encode failed\"}".to_string())
    };
    println!("{json}");
}

#[derive(Copy, Clone, Debug)]
enum AnsiColor {
    Red,
    Yellow,
}

fn colorize_label(label: &str, enabled: bool, color: AnsiColor) -> String {
    if !enabled {
        return label.to_string();
    }
    let code = match color {
        AnsiColor::Red => "31",
        AnsiColor::Yellow => "33",
    };
    format!("\u{1b}[{code}m{label}\u{1b}[0m")
}

fn emit_error(err: &Error, color_mode: ColorMode) {
    let is_tty = io::stderr().is_terminal();
    if is_tty {
        eprintln!("{}", error_text(err, color_mode.use_color(is_tty)));
        return;
    }

    let value = error_json(err);
    let json = serde_json::to_string(&value).unwrap_or_else(|_| {
        "{\"error\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn notice_time_now() -> Option<String> {
    use time::format_description::well_known::Rfc3339;
    let duration = SystemTime::now().duration_since(UNIX_EPOCH).ok()?;
    let ts = time::OffsetDateTime::from_unix_timestamp_nanos(duration.as_nanos() as i128).ok()?;
    ts.format(&Rfc3339).ok()
}

fn emit_notice(notice: &Notice, color_mode: ColorMode) {
    let is_tty = io::stderr().is_terminal();
    if is_tty {
        let label = colorize_label("notice:", color_mode.use_color(is_tty), AnsiColor::Yellow);
        if let Some(well) = &notice.well {
            eprintln!(
                "{label} {} (file: {}, well: {well})",
                notice.message, notice.file
            );
        } else {
            eprintln!("{label} {} (file: {})", notice.message, notice.file);
        }
        return;
    }

    let value = notice_json(notice);
    let json = serde_json::to_string(&value).unwrap_or_else(|_| {
        "{\"notice\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn error_message(err: &Error) -> String {
    if let Some(message) = err.message() {
        return message.to_string();
    }
    match err.kind() {
        ErrorKind::Internal => "internal error".to_string(),
        ErrorKind::Usage => "usage error".to_string(),
        ErrorKind::NotFound => "not found".to_string(),
        ErrorKind::Data => "invalid data".to_string(),
        ErrorKind::Permission => "permission denied".to_string(),
        ErrorKind::Io => "i/o error".to_string(),
    }
}

fn error_causes(err: &Error) -> Vec<String> {
    use std::error::Error as StdError;
    let mut causes = Vec::new();
    let mut cur = StdError::source(err);
    while let Some(source) = cur {
        causes.push(source.to_string());
        cur = source.source();
    }
    causes
}

fn error_json(err: &Error) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(format!("{:?}", err.kind())));
    inner.insert("message".to_string(), json!(error_message(err)));
    if let Some(hint) = err.hint() {
        inner.insert("hint".to_string(), json!(hint));
    }
    if let Some(path) = err.path() {
        inner.insert("path".to_string(), json!(path.display().to_string()));
    }
    if let Some(well) = err.well() {
        inner.insert("well".to_string(), json!(well));
    }
    let causes = error_causes(err);
    if !causes.is_empty() {
        inner.insert("causes".to_string(), json!(causes));
    }

    let mut outer = Map::new();
    outer.insert("error".to_string(), Value::Object(inner));
    Value::Object(outer)
}

fn error_text(err: &Error, use_color: bool) -> String {
    let mut lines = Vec::new();
    lines.push(format!(
        "{} {}",
        colorize_label("error:", use_color, AnsiColor::Red),
        error_message(err)
    ));

    if let Some(hint) = err.hint() {
        lines.push(format!(
            "{} {hint}",
            colorize_label("hint:", use_color, AnsiColor::Yellow)
        ));
    }
    if let Some(path) = err.path() {
        lines.push(format!(
            "{} {}",
            colorize_label("path:", use_color, AnsiColor::Yellow),
            path.display()
        ));
    }
    if let Some(well) = err.well() {
        lines.push(format!(
            "{} {well}",
            colorize_label("well:", use_color, AnsiColor::Yellow)
        ));
    }

    let causes = error_causes(err);
    if let Some(cause) = causes.first() {
        lines.push(format!(
            "{} {cause}",
            colorize_label("caused by:", use_color, AnsiColor::Yellow)
        ));
    }

    lines.join("\n")
}

fn clap_error_summary(err: &clap::Error) -> String {
    for line in err.to_string().lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix("error:") {
            return rest.trim().to_string();
        }
        return trimmed.to_string();
    }
    "invalid arguments".to_string()
}

fn clap_error_hint(err: &clap::Error) -> String {
    let rendered = err.to_string();
    let usage = rendered
        .lines()
        .find_map(|line| line.trim().strip_prefix("Usage: "))
        .map(str::trim);

    let Some(usage) = usage else {
        return "Try `equipool --help`.".to_string();
    };

    let tokens: Vec<&str> = usage.split_whitespace().collect();
    let Some(pos) = tokens.iter().position(|t| *t == "equipool") else {
        return "Try `equipool --help`.".to_string();
    };

    let mut parts = Vec::new();
    for token in tokens.iter().skip(pos + 1) {
        if token.starts_with('-') || token.starts_with('<') || token.starts_with('[') {
            break;
        }
        parts.push(*token);
    }

    if parts.is_empty() {
        return "Try `equipool --help`.".to_string();
    }

    format!("Try `equipool {} --help`.", parts.join(" "))
}

#[cfg(test)]
mod tests {
    use super::{
        AnsiColor, ColorMode, PlanReport, build_plan_summary_lines, clap_error_hint,
        clap_error_summary, colorize_label, error_json, error_text, normalize_args, plan_json,
        unpooled_note,
    };
    use clap::Parser;
    use equipool::core::error::{Error, ErrorKind};
    use equipool::core::plan::{PoolCandidate, PoolParams, plan_pools};
    use equipool::core::sample::Sample;
    use std::ffi::OsString;
    use std::path::PathBuf;

    fn report_fixture() -> PlanReport {
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
        PlanReport {
            plan,
            report_path: PathBuf::from("/data/run4/output/2026-01-05_101500_sub-pooling.csv"),
            samples_total: 3,
            samples_unpooled: 1,
        }
    }

    #[test]
    fn normalize_args_maps_triple_dash_flags() {
        let args = vec![OsString::from("equipool"), OsString::from("---help")];
        let normalized = normalize_args(args);
        assert_eq!(normalized[1], OsString::from("--help"));
    }

    #[test]
    fn clap_errors_map_to_usage_summary_and_hint() {
        let err = super::Cli::try_parse_from(["equipool", "--bogus"])
            .err()
            .expect("parse fails");
        let summary = clap_error_summary(&err);
        assert!(!summary.is_empty());
        assert!(!summary.starts_with("error:"));
        let hint = clap_error_hint(&err);
        assert!(hint.contains("--help"));
    }

    #[test]
    fn color_mode_gates_on_tty() {
        assert!(ColorMode::Always.use_color(false));
        assert!(!ColorMode::Never.use_color(true));
        assert!(ColorMode::Auto.use_color(true));
        assert!(!ColorMode::Auto.use_color(false));
    }

    #[test]
    fn colorize_label_wraps_ansi_codes_only_when_enabled() {
        assert_eq!(colorize_label("error:", false, AnsiColor::Red), "error:");
        assert_eq!(
            colorize_label("error:", true, AnsiColor::Red),
            "\u{1b}[31merror:\u{1b}[0m"
        );
    }

    #[test]
    fn error_json_carries_well_and_causes() {
        let err = Error::new(ErrorKind::Data)
            .with_message("multiple library regions in one well")
            .with_well("B3")
            .with_source(std::io::Error::other("boom"));
        let value = error_json(&err);
        assert_eq!(value["error"]["kind"], "Data");
        assert_eq!(value["error"]["well"], "B3");
        assert_eq!(value["error"]["causes"][0], "boom");
    }

    #[test]
    fn error_text_lists_labelled_context_lines() {
        let err = Error::new(ErrorKind::Data)
            .with_message("multiple dimer regions in one well")
            .with_well("A5")
            .with_hint("Re-export the region table with one dimer region per well.");
        let text = error_text(&err, false);
        assert!(text.starts_with("error: multiple dimer regions in one well"));
        assert!(text.contains("hint: Re-export"));
        assert!(text.contains("well: A5"));
    }

    #[test]
    fn unpooled_note_distinguishes_missing_from_unusable() {
        let mut sample = Sample {
            file: "plate.csv".to_string(),
            plate: 1,
            well: "A1".to_string(),
            dimer_conc: None,
            dimer_molarity: None,
            lib_conc: None,
            lib_molarity: None,
        };
        assert_eq!(unpooled_note(&sample), "Not pooled - no library molarity");
        sample.lib_molarity = Some(0.0);
        assert_eq!(
            unpooled_note(&sample),
            "Not pooled - library molarity not usable"
        );
    }

    #[test]
    fn plan_summary_lines_follow_the_report_shape() {
        let plates = vec![super::PlateFile {
            path: PathBuf::from("/data/run4/a.csv"),
            name: "a.csv".to_string(),
            plate: 1,
        }];
        let lines = build_plan_summary_lines(&plates, &report_fixture());
        assert_eq!(lines[0], "Plate Assignment:");
        assert_eq!(lines[1], "  Plate 001: a.csv");
        assert!(lines.contains(&"Processed 3 samples into 1 sub-pools".to_string()));
        assert!(lines.contains(&"Unpooled samples: 1 (see the notes column)".to_string()));
        assert!(lines.contains(&"Pool 1: 2 samples, 6.3ul total".to_string()));
    }

    #[test]
    fn plan_json_summary_has_stable_keys() {
        let plates = vec![super::PlateFile {
            path: PathBuf::from("/data/run4/a.csv"),
            name: "a.csv".to_string(),
            plate: 1,
        }];
        let value = plan_json(&plates, &report_fixture());
        assert_eq!(value["plan"]["plates"][0]["label"], "Plate 001");
        assert_eq!(value["plan"]["samples"]["total"], 3);
        assert_eq!(value["plan"]["samples"]["pooled"], 2);
        assert_eq!(value["plan"]["pools"][0]["type"], "strong");
        assert_eq!(value["plan"]["pools"][0]["samples"], 2);
    }
}
