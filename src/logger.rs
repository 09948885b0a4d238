//! Diagnostic logging for subst
//!
//! Diagnostics go to stderr (stdout may carry the transformed data) or, when a
//! log file is configured, are appended to that file. `RUST_LOG` overrides the
//! level chosen from the command line.

use anyhow::{Context, Result};
use std::fs;
use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, prelude::*, registry, EnvFilter};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    #[default]
    Quiet,
    Verbose,
    Debug,
}

impl Verbosity {
    pub fn from_flags(verbose: bool, debug: bool) -> Self {
        if debug {
            Verbosity::Debug
        } else if verbose {
            Verbosity::Verbose
        } else {
            Verbosity::Quiet
        }
    }

    /// Default filter directive for this level
    pub fn directive(self) -> &'static str {
        match self {
            Verbosity::Quiet => "subst=warn",
            Verbosity::Verbose => "subst=info",
            Verbosity::Debug => "subst=debug",
        }
    }
}

fn build_filter(verbosity: Verbosity) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(verbosity.directive()))
}

/// Initialize the logging system
///
/// Returns the log file path when logging to a file.
pub fn init_logging(verbosity: Verbosity, log_file: Option<&Path>) -> Result<Option<PathBuf>> {
    let filter = build_filter(verbosity);

    match log_file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create log directory: {}", parent.display())
                })?;
            }

            let file = fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file: {}", path.display()))?;

            let subscriber = registry()
                .with(
                    fmt::layer()
                        .with_writer(file)
                        .with_ansi(false)
                        .with_target(false)
                        .with_thread_ids(false)
                        .with_file(false)
                        .with_line_number(false),
                )
                .with(filter);

            tracing::subscriber::set_global_default(subscriber)
                .map_err(|e| anyhow::anyhow!("Failed to set tracing subscriber: {}", e))?;

            Ok(Some(path.to_path_buf()))
        }
        None => {
            let subscriber = registry()
                .with(
                    fmt::layer()
                        .with_writer(io::stderr)
                        .with_ansi(io::stderr().is_terminal())
                        .with_target(false)
                        .without_time(),
                )
                .with(filter);

            tracing::subscriber::set_global_default(subscriber)
                .map_err(|e| anyhow::anyhow!("Failed to set tracing subscriber: {}", e))?;

            Ok(None)
        }
    }
}
