//! Per-module debug loggers.
//!
//! Control via the DEBUG environment variable:
//! - `DEBUG=*` - Enable every logger
//! - `DEBUG=vm` - Enable only the VM logger
//! - `DEBUG=vm,compiler` - Enable several loggers
//!
//! Verbosity via DEBUG_VERBOSITY (0-3, default 1). Level 2 adds per-step
//! detail, level 3 adds instruction-level tracing from the VM.

use std::collections::HashSet;
use std::env;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::OnceLock;

// ============================================================================
// Configuration
// ============================================================================

const ENV_ENABLED: &str = "DEBUG";
const ENV_VERBOSITY: &str = "DEBUG_VERBOSITY";
const DEFAULT_VERBOSITY: u8 = 1;
const MAX_VERBOSITY: u8 = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Selection {
    All,
    None,
    Only(HashSet<String>),
}

impl Selection {
    fn parse(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            None | Some("") | Some("0") | Some("false") => Selection::None,
            Some("*") | Some("1") | Some("true") => Selection::All,
            Some(list) => {
                let names: HashSet<String> = list
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect();
                if names.is_empty() {
                    Selection::None
                } else {
                    Selection::Only(names)
                }
            }
        }
    }

    fn contains(&self, name: &str) -> bool {
        match self {
            Selection::None => false,
            Selection::All => true,
            Selection::Only(names) => names.contains(name),
        }
    }
}

fn parse_verbosity(value: Option<&str>) -> u8 {
    value
        .and_then(|v| v.trim().parse::<u8>().ok())
        .map(|v| v.min(MAX_VERBOSITY))
        .unwrap_or(DEFAULT_VERBOSITY)
}

struct Config {
    selection: Selection,
    verbosity: u8,
}

static CONFIG: OnceLock<Config> = OnceLock::new();

fn config() -> &'static Config {
    CONFIG.get_or_init(|| Config {
        selection: Selection::parse(env::var(ENV_ENABLED).ok().as_deref()),
        verbosity: parse_verbosity(env::var(ENV_VERBOSITY).ok().as_deref()),
    })
}

/// Verbosity level configured through `DEBUG_VERBOSITY`.
pub fn verbosity() -> u8 {
    config().verbosity
}

// ============================================================================
// Logger
// ============================================================================

/// A named logger writing to stderr.
///
/// Disabled loggers cost one branch per call site when used through the
/// macros below. The indent counter is atomic so a logger can live inside
/// structures that are shared between threads.
pub struct Logger {
    name: &'static str,
    enabled: bool,
    indent: AtomicUsize,
}

impl Logger {
    pub const fn disabled() -> Self {
        Self { name: "", enabled: false, indent: AtomicUsize::new(0) }
    }

    const fn active(name: &'static str) -> Self {
        Self { name, enabled: true, indent: AtomicUsize::new(0) }
    }

    #[inline]
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// True when instruction-level tracing was requested.
    #[inline]
    pub fn tracing(&self) -> bool {
        self.enabled && verbosity() >= MAX_VERBOSITY
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    fn emit(&self, tag: &str, msg: &str) {
        let indent = self.indent.load(Ordering::Relaxed);
        eprintln!("{}[{}]{} {}", "  ".repeat(indent), self.name, tag, msg);
    }

    #[inline]
    pub fn log(&self, msg: &str) {
        if self.enabled && verbosity() >= 1 {
            self.emit("", msg);
        }
    }

    #[inline]
    pub fn detail(&self, msg: &str) {
        if self.enabled && verbosity() >= 2 {
            self.emit("", msg);
        }
    }

    #[inline]
    pub fn trace(&self, msg: &str) {
        if self.tracing() {
            self.emit(" trace:", msg);
        }
    }

    #[inline]
    pub fn success(&self, msg: &str) {
        if self.enabled && verbosity() >= 1 {
            self.emit(" OK:", msg);
        }
    }

    #[inline]
    pub fn fail(&self, msg: &str) {
        if self.enabled && verbosity() >= 1 {
            self.emit(" FAIL:", msg);
        }
    }

    #[inline]
    pub fn push_indent(&self) {
        if self.enabled {
            self.indent.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[inline]
    pub fn pop_indent(&self) {
        if self.enabled {
            let _ = self
                .indent
                .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| Some(v.saturating_sub(1)));
        }
    }
}

// ============================================================================
// Factory
// ============================================================================

/// Create a logger. The name must be a static string.
pub fn create_logger(name: &'static str) -> Logger {
    if config().selection.contains(name) {
        Logger::active(name)
    } else {
        Logger::disabled()
    }
}

/// Create a logger that is always on, regardless of `DEBUG`.
///
/// Used when tracing is requested explicitly, e.g. by a command line flag.
pub fn forced_logger(name: &'static str) -> Logger {
    Logger::active(name)
}

// ============================================================================
// Macros - avoid format! cost when disabled
// ============================================================================

#[macro_export]
macro_rules! log {
    ($logger:expr, $($arg:tt)*) => {
        if $logger.enabled() {
            $logger.log(&format!($($arg)*));
        }
    };
}

#[macro_export]
macro_rules! log_detail {
    ($logger:expr, $($arg:tt)*) => {
        if $logger.enabled() {
            $logger.detail(&format!($($arg)*));
        }
    };
}

#[macro_export]
macro_rules! log_trace {
    ($logger:expr, $($arg:tt)*) => {
        if $logger.tracing() {
            $logger.trace(&format!($($arg)*));
        }
    };
}

#[macro_export]
macro_rules! log_success {
    ($logger:expr, $($arg:tt)*) => {
        if $logger.enabled() {
            $logger.success(&format!($($arg)*));
        }
    };
}

#[macro_export]
macro_rules! log_fail {
    ($logger:expr, $($arg:tt)*) => {
        if $logger.enabled() {
            $logger.fail(&format!($($arg)*));
        }
    };
}
