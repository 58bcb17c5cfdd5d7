//! Stderr logging for the `log` facade.
//!
//! Each record becomes one line,
//! `[  0.012s DEBUG hypothesis] hhs: 3 cameras, 7 candidates`, with the
//! elapsed time since installation and the target shortened to the module
//! path inside the workspace crates. Records from other crates are capped at
//! `Warn` so `-vvv` stays readable.
//!
//! [`init_with_level`] installs the logger on first use and only moves the
//! level afterwards, so a binary can raise verbosity after parsing its
//! arguments. Library code only uses the `log` macros.

use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::OnceLock;
use std::time::Instant;

use log::{Level, LevelFilter, Log, Metadata, Record};

#[cfg(feature = "tracing")]
use tracing_subscriber::fmt::format::FmtSpan;
#[cfg(feature = "tracing")]
use tracing_subscriber::util::SubscriberInitExt;
#[cfg(feature = "tracing")]
use tracing_subscriber::{fmt, EnvFilter};

const WORKSPACE_PREFIXES: [&str; 2] = ["dartfuse_core::", "dartfuse::"];

/// The `log` facade already holds a logger that is not ours.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("another logger is already installed")]
pub struct LoggerTaken;

fn is_workspace_target(target: &str) -> bool {
    target.starts_with("dartfuse")
}

/// Module path below the crate root for workspace targets, else the target.
fn short_target(target: &str) -> &str {
    WORKSPACE_PREFIXES
        .iter()
        .find_map(|p| target.strip_prefix(p))
        .unwrap_or(target)
}

fn passes(filter: LevelFilter, level: Level, target: &str) -> bool {
    let cap = if is_workspace_target(target) {
        filter
    } else {
        filter.min(LevelFilter::Warn)
    };
    level <= cap
}

fn format_line(
    elapsed_s: f64,
    level: Level,
    target: &str,
    msg: &std::fmt::Arguments<'_>,
) -> String {
    format!("[{elapsed_s:7.3}s {level:>5} {}] {msg}", short_target(target))
}

fn filter_from_index(i: usize) -> LevelFilter {
    LevelFilter::iter().nth(i).unwrap_or(LevelFilter::Trace)
}

struct FusionLogger {
    level: AtomicUsize,
    started: Instant,
}

impl FusionLogger {
    fn filter(&self) -> LevelFilter {
        filter_from_index(self.level.load(Ordering::Relaxed))
    }
}

impl Log for FusionLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        passes(self.filter(), metadata.level(), metadata.target())
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format_line(
            self.started.elapsed().as_secs_f64(),
            record.level(),
            record.target(),
            record.args(),
        );
        let _ = writeln!(std::io::stderr().lock(), "{line}");
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

static LOGGER: OnceLock<FusionLogger> = OnceLock::new();
static INSTALLED: OnceLock<bool> = OnceLock::new();

/// Install the stderr logger, or change its level if already installed.
pub fn init_with_level(level: LevelFilter) -> Result<(), LoggerTaken> {
    let logger = LOGGER.get_or_init(|| FusionLogger {
        level: AtomicUsize::new(level as usize),
        started: Instant::now(),
    });
    if !*INSTALLED.get_or_init(|| log::set_logger(logger).is_ok()) {
        return Err(LoggerTaken);
    }
    logger.level.store(level as usize, Ordering::Relaxed);
    log::set_max_level(level);
    Ok(())
}

/// Map a `-v` count to a level filter: 0 warn, 1 info, 2 debug, 3+ trace.
pub fn level_from_verbosity(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

#[cfg(feature = "tracing")]
pub fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json {
        let _ = fmt()
            .with_env_filter(filter)
            .with_span_events(FmtSpan::CLOSE)
            .json()
            .flatten_event(true)
            .with_writer(std::io::stderr)
            .finish()
            .try_init();
    } else {
        let _ = fmt()
            .with_env_filter(filter)
            .with_span_events(FmtSpan::CLOSE)
            .with_writer(std::io::stderr)
            .with_timer(fmt::time::Uptime::default())
            .finish()
            .try_init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_maps_to_levels() {
        assert_eq!(level_from_verbosity(0), LevelFilter::Warn);
        assert_eq!(level_from_verbosity(2), LevelFilter::Debug);
        assert_eq!(level_from_verbosity(9), LevelFilter::Trace);
    }

    #[test]
    fn workspace_targets_are_shortened() {
        assert_eq!(short_target("dartfuse::hypothesis"), "hypothesis");
        assert_eq!(short_target("dartfuse_core::axis"), "axis");
        assert_eq!(short_target("dartfuse"), "dartfuse");
        assert_eq!(short_target("serde_json::de"), "serde_json::de");
    }

    #[test]
    fn other_crates_are_capped_at_warn() {
        let f = LevelFilter::Trace;
        assert!(passes(f, Level::Trace, "dartfuse::soft_accept"));
        assert!(passes(f, Level::Warn, "rand::rngs"));
        assert!(!passes(f, Level::Info, "rand::rngs"));
        assert!(!passes(LevelFilter::Error, Level::Warn, "dartfuse::engine"));
    }

    #[test]
    fn line_layout() {
        let line = format_line(
            1.5,
            Level::Debug,
            "dartfuse::engine",
            &format_args!("throw: baseline {} -> {}", 0, 40),
        );
        assert_eq!(line, "[  1.500s DEBUG engine] throw: baseline 0 -> 40");
    }

    #[test]
    fn level_index_round_trips() {
        for f in LevelFilter::iter() {
            assert_eq!(filter_from_index(f as usize), f);
        }
    }

    #[test]
    fn reinit_moves_the_level() {
        assert_eq!(init_with_level(LevelFilter::Debug), Ok(()));
        assert_eq!(log::max_level(), LevelFilter::Debug);
        assert_eq!(init_with_level(LevelFilter::Warn), Ok(()));
        assert_eq!(log::max_level(), LevelFilter::Warn);
    }
}
