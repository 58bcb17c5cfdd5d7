//! `dartfuse`: replay recorded throws through the fusion engine.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use clap::{ArgAction, Parser, Subcommand};
use dartfuse::core::{init_with_level, level_from_verbosity, CalibrationSource};
use dartfuse::{BaselineResult, ConfigError, FusionDecision, FusionEngine, FusionParams, ThrowInput};
use log::info;
use serde::{Deserialize, Serialize};

#[derive(Debug, Parser)]
#[command(author, version, about = "Multi-camera dart score fusion")]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Emit structured tracing spans instead of plain log lines.
    #[cfg(feature = "tracing")]
    #[arg(long, global = true)]
    trace_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run every throw in a replay file and print the decisions.
    Replay {
        /// JSON file with `calibrations`, `throws` and optional `flags`.
        input: PathBuf,

        /// Flag override, applied after the file's own flags.
        #[arg(short = 'f', long = "flag", value_name = "KEY=VALUE")]
        flags: Vec<String>,

        /// Print full decisions as JSON instead of one line per throw.
        #[arg(long)]
        json: bool,
    },
    /// List the accepted flag names.
    Flags,
}

#[derive(thiserror::Error, Debug)]
enum ReplayError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid replay file: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("malformed flag `{0}`, expected KEY=VALUE with an integer value")]
    BadFlag(String),
}

/// On-disk replay: calibrations keyed by camera id plus recorded throws.
#[derive(Debug, Deserialize)]
struct ReplayFile {
    #[serde(default)]
    flags: BTreeMap<String, i32>,
    calibrations: BTreeMap<String, CalibrationSource>,
    throws: Vec<ThrowInput>,
}

#[derive(Debug, Serialize)]
struct ThrowReport<'a> {
    index: usize,
    baseline: &'a BaselineResult,
    result: &'a BaselineResult,
    decision: &'a FusionDecision,
}

fn parse_flag(arg: &str) -> Result<(&str, i32), ReplayError> {
    let (key, value) = arg
        .split_once('=')
        .ok_or_else(|| ReplayError::BadFlag(arg.to_string()))?;
    let value = value
        .trim()
        .parse::<i32>()
        .map_err(|_| ReplayError::BadFlag(arg.to_string()))?;
    Ok((key.trim(), value))
}

fn load_replay(path: &Path) -> Result<ReplayFile, ReplayError> {
    let data = fs::read_to_string(path).map_err(|source| ReplayError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_json::from_str(&data)?)
}

fn build_params(
    file_flags: &BTreeMap<String, i32>,
    overrides: &[String],
) -> Result<FusionParams, ReplayError> {
    let mut params = FusionParams::default();
    for (key, value) in file_flags {
        params.set_flag(key, *value)?;
    }
    for arg in overrides {
        let (key, value) = parse_flag(arg)?;
        params.set_flag(key, value)?;
    }
    Ok(params)
}

/// Short dartboard notation: `miss`, `bull`, `25`, `S5`, `D20`, `T19`.
fn score_label(r: &BaselineResult) -> String {
    match (r.segment, r.multiplier) {
        (_, 0) => "miss".to_string(),
        (25, _) => "bull".to_string(),
        (0, _) => "25".to_string(),
        (s, 1) => format!("S{s}"),
        (s, 2) => format!("D{s}"),
        (s, _) => format!("T{s}"),
    }
}

fn describe(index: usize, baseline: &BaselineResult, decision: &FusionDecision) -> String {
    let result = decision.final_result(baseline);
    let mut line = format!(
        "throw {index}: {} ({}) [{}]",
        score_label(baseline),
        baseline.score,
        baseline.method
    );
    if decision.outcome.is_override() {
        line.push_str(&format!(
            " -> {} ({}) [{}]",
            score_label(result),
            result.score,
            result.method
        ));
    } else {
        line.push_str(" kept");
    }

    let mut notes = Vec::new();
    if let Some(sel) = &decision.selection {
        if let Some((_, reason)) = sel.selected {
            notes.push(format!("hhs: {reason}"));
        } else if let Some(abstain) = &sel.abstain {
            notes.push(format!("hhs: {abstain:?}"));
        }
    }
    if let Some(sap) = &decision.soft_accept {
        match sap.failed_gate {
            Some(gate) => notes.push(format!("sap: {gate}")),
            None if sap.applied => notes.push("sap: accepted".to_string()),
            None => {}
        }
    }
    if !notes.is_empty() {
        line.push_str(&format!(" ({})", notes.join(", ")));
    }
    line
}

fn run_replay(input: &Path, overrides: &[String], json: bool) -> Result<String, ReplayError> {
    let replay = load_replay(input)?;
    let params = build_params(&replay.flags, overrides)?;
    let engine = FusionEngine::from_sources(replay.calibrations, params);
    info!(
        "replaying {} throws with {} cameras",
        replay.throws.len(),
        engine.calibrations().len()
    );

    let decisions: Vec<FusionDecision> =
        replay.throws.iter().map(|t| engine.evaluate(t)).collect();
    if json {
        let reports: Vec<ThrowReport<'_>> = replay
            .throws
            .iter()
            .zip(&decisions)
            .enumerate()
            .map(|(index, (t, d))| ThrowReport {
                index,
                baseline: &t.baseline,
                result: d.final_result(&t.baseline),
                decision: d,
            })
            .collect();
        return Ok(serde_json::to_string_pretty(&reports)?);
    }

    let lines: Vec<String> = replay
        .throws
        .iter()
        .zip(&decisions)
        .enumerate()
        .map(|(i, (t, d))| describe(i, &t.baseline, d))
        .collect();
    Ok(lines.join("\n"))
}

fn init_logging(cli: &Cli) {
    #[cfg(feature = "tracing")]
    {
        if cli.trace_json {
            dartfuse::core::init_tracing(true);
            return;
        }
    }
    // A second logger can only come from a test harness; keep going.
    let _ = init_with_level(level_from_verbosity(cli.verbose));
}

fn main() {
    let cli = Cli::parse();
    init_logging(&cli);
    if let Err(err) = try_main(cli) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn try_main(cli: Cli) -> Result<(), ReplayError> {
    match cli.command {
        Command::Replay { input, flags, json } => {
            println!("{}", run_replay(&input, &flags, json)?);
        }
        Command::Flags => {
            for name in FusionParams::FLAG_NAMES {
                println!("{name}");
            }
        }
    }
    Ok(())
}
