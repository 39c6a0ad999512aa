//! FILENAME: core/table-engine/src/logging.rs
// PURPOSE: Categorized, sequence-numbered logging for the table engine.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use once_cell::sync::Lazy;

// ============================================================================
// UNIFIED LOGGING SYSTEM
// ============================================================================

/// Global sequence counter, so interleaved lines from concurrent pipelines
/// can be put back in order.
static LOG_SEQ: AtomicU64 = AtomicU64::new(0);

/// Optional file mirror. Lines always go to the `log` facade.
static LOG_FILE: Lazy<Mutex<Option<(PathBuf, File)>>> = Lazy::new(|| Mutex::new(None));

/// Get next sequence number
pub fn next_seq() -> u64 {
    LOG_SEQ.fetch_add(1, Ordering::SeqCst) + 1
}

/// Mirror every subsequent log line to `path` (truncated on open).
pub fn init_log_file(path: impl AsRef<Path>) -> std::io::Result<()> {
    let path = path.as_ref().to_path_buf();
    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&path)?;

    let mut guard = LOG_FILE.lock().unwrap_or_else(|e| e.into_inner());
    *guard = Some((path, file));
    Ok(())
}

/// Path of the file mirror, if one was initialized.
pub fn log_file_path() -> Option<PathBuf> {
    let guard = LOG_FILE.lock().unwrap_or_else(|e| e.into_inner());
    guard.as_ref().map(|(path, _)| path.clone())
}

fn level_of(level: &str) -> log::Level {
    match level {
        "E" => log::Level::Error,
        "W" => log::Level::Warn,
        "I" => log::Level::Info,
        "T" => log::Level::Trace,
        _ => log::Level::Debug,
    }
}

/// Write a log line in unified format: `seq|level|category|message`.
pub fn write_log(level: &str, category: &str, message: &str) {
    let seq = next_seq();
    let lvl = level_of(level);

    if log::log_enabled!(target: "table_engine", lvl) {
        log::log!(target: "table_engine", lvl, "{}|{}|{}", seq, category, message);
    }

    if let Ok(mut guard) = LOG_FILE.lock() {
        if let Some((_, ref mut file)) = *guard {
            let line = format!("{}|{}|{}|{}", seq, level, category, message);
            if writeln!(file, "{}", line).is_ok() {
                let _ = file.flush();
            }
        }
    }
}

/// Write an ENTER log line for function entry
pub fn write_log_enter(level: &str, category: &str, func_name: &str, params: &str) {
    let message = if params.is_empty() {
        format!("ENTER {}", func_name)
    } else {
        format!("ENTER {} {}", func_name, params)
    };
    write_log(level, category, &message);
}

/// Write an EXIT log line for function exit
pub fn write_log_exit(level: &str, category: &str, func_name: &str, result: &str) {
    let message = if result.is_empty() {
        format!("EXIT {}", func_name)
    } else {
        format!("EXIT {} {}", func_name, result)
    };
    write_log(level, category, &message);
}

// ============================================================================
// MACRO DEFINITIONS & EXPORTS
// ============================================================================

#[macro_export]
macro_rules! log_debug {
    ($cat:expr, $($arg:tt)*) => {
        $crate::logging::write_log("D", $cat, &format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_info {
    ($cat:expr, $($arg:tt)*) => {
        $crate::logging::write_log("I", $cat, &format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_warn {
    ($cat:expr, $($arg:tt)*) => {
        $crate::logging::write_log("W", $cat, &format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_error {
    ($cat:expr, $($arg:tt)*) => {
        $crate::logging::write_log("E", $cat, &format!($($arg)*))
    };
}

// ENTER/EXIT macros for function tracing

#[macro_export]
macro_rules! log_enter {
    ($cat:expr, $func:expr) => {
        $crate::logging::write_log_enter("D", $cat, $func, "")
    };
    ($cat:expr, $func:expr, $($arg:tt)*) => {
        $crate::logging::write_log_enter("D", $cat, $func, &format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_exit {
    ($cat:expr, $func:expr) => {
        $crate::logging::write_log_exit("D", $cat, $func, "")
    };
    ($cat:expr, $func:expr, $($arg:tt)*) => {
        $crate::logging::write_log_exit("D", $cat, $func, &format!($($arg)*))
    };
}

pub use crate::log_debug;
pub use crate::log_enter;
pub use crate::log_error;
pub use crate::log_exit;
pub use crate::log_info;
pub use crate::log_warn;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_is_monotonic() {
        let a = next_seq();
        let b = next_seq();
        assert!(b > a);
    }

    #[test]
    fn test_file_mirror_receives_lines() {
        let path = std::env::temp_dir().join(format!("table-engine-log-{}.log", std::process::id()));
        init_log_file(&path).unwrap();
        assert_eq!(log_file_path(), Some(path.clone()));

        crate::log_info!("TEST", "hello {}", 42);

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.lines().any(|l| l.ends_with("|I|TEST|hello 42")));
        let _ = std::fs::remove_file(&path);
    }
}
