//! Tracing subscriber setup for the `claude-usage` binary.
//!
//! `RUST_LOG` overrides the default filter. The dashboard owns the terminal,
//! so in that mode log lines go to a file instead of stderr.

use crate::error::{Result, UsageError};
use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Where log lines are written
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    Stderr,
    File(PathBuf),
}

/// Default filter: the crate at `debug` when asked for, otherwise warnings only
pub fn default_filter(debug: bool) -> String {
    if debug {
        "claude_usage_monitor=debug,warn".to_string()
    } else {
        "warn".to_string()
    }
}

/// Initialize the logging system; a second call is a no-op
pub fn setup_logging(debug: bool, target: LogTarget) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(debug)));

    match target {
        LogTarget::Stderr => {
            let _ = tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_target(debug)
                        .with_thread_ids(false)
                        .with_file(false)
                        .with_line_number(false),
                )
                .try_init();
        }
        LogTarget::File(path) => {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).map_err(|e| UsageError::io(parent, e))?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .map_err(|e| UsageError::io(&path, e))?;

            let _ = tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    fmt::layer()
                        .with_writer(Mutex::new(file))
                        .with_ansi(false)
                        .with_target(true)
                        .with_thread_ids(false),
                )
                .try_init();
        }
    }

    Ok(())
}
