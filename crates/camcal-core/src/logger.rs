//! Console logger for calibration runs.
//!
//! Records are printed to stderr as `[elapsed LEVEL] message`; debug and
//! trace records also carry their module path. Install once at startup with
//! [`init_with_level`].

use std::io::Write;
use std::sync::OnceLock;
use std::time::Instant;

use log::{Level, LevelFilter, Log, Metadata, Record};

#[cfg(feature = "tracing")]
use tracing_subscriber::fmt::format::FmtSpan;
#[cfg(feature = "tracing")]
use tracing_subscriber::util::SubscriberInitExt;
#[cfg(feature = "tracing")]
use tracing_subscriber::{fmt, EnvFilter};

struct StderrLogger {
    level: LevelFilter,
    started: Instant,
}

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let elapsed = self.started.elapsed().as_secs_f64();
        let mut stderr = std::io::stderr().lock();
        let _ = if record.level() >= Level::Debug {
            writeln!(
                stderr,
                "[{:7.3}s {:>5}] {}: {}",
                elapsed,
                record.level(),
                record.target(),
                record.args()
            )
        } else {
            writeln!(
                stderr,
                "[{:7.3}s {:>5}] {}",
                elapsed,
                record.level(),
                record.args()
            )
        };
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

static LOGGER: OnceLock<StderrLogger> = OnceLock::new();

/// Install the stderr logger at `level`.
///
/// The process-wide `log` logger can be set once; a second call returns the
/// `log` error and leaves the first logger (and its level) in place.
pub fn init_with_level(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    let logger = LOGGER.get_or_init(|| StderrLogger {
        level,
        started: Instant::now(),
    });
    log::set_logger(logger)?;
    log::set_max_level(logger.level);
    Ok(())
}

/// `RUST_LOG` when set and valid, `level` otherwise.
#[cfg(feature = "tracing")]
fn env_filter_or(level: LevelFilter) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_ascii_lowercase()))
}

/// Install a `tracing` subscriber instead of the plain logger.
///
/// Events go to stderr. `level` applies when `RUST_LOG` is not set. With `json` every event is one
/// flattened JSON object per line; otherwise events are human-readable and
/// stamped with the time since start. Span closings are reported in both
/// layouts, and `log` records reach the subscriber too. Returns `false` if a
/// global subscriber was already installed.
#[cfg(feature = "tracing")]
pub fn init_tracing(level: LevelFilter, json: bool) -> bool {
    let builder = fmt()
        .with_env_filter(env_filter_or(level))
        .with_span_events(FmtSpan::CLOSE)
        .with_writer(std::io::stderr)
        .with_target(level >= LevelFilter::Debug);
    let installed = if json {
        builder.json().flatten_event(true).finish().try_init()
    } else {
        builder
            .with_timer(fmt::time::Uptime::default())
            .finish()
            .try_init()
    };
    installed.is_ok()
}
