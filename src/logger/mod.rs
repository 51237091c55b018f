//! Tagged console logging.
//!
//! Thin structured logging layer used by every subsystem:
//!
//! ```rust
//! use trendhound::logger::{self, LogTag};
//!
//! logger::info(LogTag::Pipeline, "Session started");
//! logger::warning(LogTag::Llm, "Health check failed, proceeding anyway");
//! logger::debug(LogTag::Stream, "Frame received"); // only with --verbose
//! ```
//!
//! Call `logger::init()` once at startup before any logging occurs. It
//! enables debug output when `--verbose` is present on the command line or
//! `TRENDHOUND_VERBOSE` is set in the environment.

mod tags;

pub use tags::LogTag;

use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use colored::Colorize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogLevel {
    Error,
    Warning,
    Info,
    Debug,
}

impl LogLevel {
    fn colored_label(&self) -> String {
        match self {
            LogLevel::Error => "ERROR".red().bold().to_string(),
            LogLevel::Warning => " WARN".yellow().bold().to_string(),
            LogLevel::Info => " INFO".green().to_string(),
            LogLevel::Debug => "DEBUG".bright_black().to_string(),
        }
    }
}

static VERBOSE_ENABLED: AtomicBool = AtomicBool::new(false);

/// Initialize the logger. Must be called once at startup.
pub fn init() {
    let from_args = std::env::args().any(|a| a == "--verbose" || a == "-v");
    let from_env = std::env::var("TRENDHOUND_VERBOSE")
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);

    VERBOSE_ENABLED.store(from_args || from_env, Ordering::Relaxed);
}

/// Enable or disable debug output at runtime
pub fn set_verbose(enabled: bool) {
    VERBOSE_ENABLED.store(enabled, Ordering::Relaxed);
}

pub fn is_verbose() -> bool {
    VERBOSE_ENABLED.load(Ordering::Relaxed)
}

fn log_internal(tag: LogTag, level: LogLevel, message: &str) {
    if level == LogLevel::Debug && !is_verbose() {
        return;
    }

    let timestamp = Utc::now().format("%Y-%m-%d %H:%M:%S%.3f");
    let line = format!(
        "{} {} {} {}",
        timestamp.to_string().bright_black(),
        level.colored_label(),
        tag.colored_label(),
        message
    );

    if level == LogLevel::Error {
        eprintln!("{}", line);
    } else {
        println!("{}", line);
    }
}

/// Log at ERROR level (always shown)
pub fn error(tag: LogTag, message: &str) {
    log_internal(tag, LogLevel::Error, message);
}

/// Log at WARNING level (important issues)
pub fn warning(tag: LogTag, message: &str) {
    log_internal(tag, LogLevel::Warning, message);
}

/// Log at INFO level (standard operations)
pub fn info(tag: LogTag, message: &str) {
    log_internal(tag, LogLevel::Info, message);
}

/// Log at DEBUG level, shown only in verbose mode
pub fn debug(tag: LogTag, message: &str) {
    log_internal(tag, LogLevel::Debug, message);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbose_toggle_gates_debug() {
        set_verbose(false);
        assert!(!is_verbose());
        set_verbose(true);
        assert!(is_verbose());
        set_verbose(false);
    }
}
