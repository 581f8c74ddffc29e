//! Tracing subscriber setup.
//!
//! Human-readable events go to stderr. When a log file is configured, every
//! event is also written there as JSON lines through a non-blocking writer.
//!
//! Log file resolution, first match wins:
//! 1. `RUNE_SEER_LOG_PATH` (exact file)
//! 2. `RUNE_SEER_LOG_DIR` (directory, daily-rotated `rune-seer.jsonl`)
//! 3. `log_dir` from configuration

use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::RollingFileAppender;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

const LOG_PATH_ENV: &str = "RUNE_SEER_LOG_PATH";
const LOG_DIR_ENV: &str = "RUNE_SEER_LOG_DIR";
const LOG_FILE_NAME: &str = "rune-seer.jsonl";

/// Where (if anywhere) to write the JSON log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogFile {
    /// Write to exactly this file, appending.
    Exact(PathBuf),
    /// Daily-rotated file inside this directory.
    Rolling(PathBuf),
}

/// Resolved observability settings.
#[derive(Debug, Clone, Default)]
pub struct ObservabilityConfig {
    /// JSON log destination; stderr only when `None`.
    pub log_file: Option<LogFile>,
}

impl ObservabilityConfig {
    /// Read the environment, falling back to the configured log directory.
    pub fn from_env_with_overrides(config_log_dir: Option<PathBuf>) -> Self {
        Self::resolve(
            std::env::var_os(LOG_PATH_ENV).map(PathBuf::from),
            std::env::var_os(LOG_DIR_ENV).map(PathBuf::from),
            config_log_dir,
        )
    }

    fn resolve(
        env_path: Option<PathBuf>,
        env_dir: Option<PathBuf>,
        config_dir: Option<PathBuf>,
    ) -> Self {
        let non_empty = |p: &PathBuf| !p.as_os_str().is_empty();
        let log_file = env_path
            .filter(non_empty)
            .map(LogFile::Exact)
            .or_else(|| {
                env_dir
                    .filter(non_empty)
                    .or_else(|| config_dir.filter(non_empty))
                    .map(LogFile::Rolling)
            });
        Self { log_file }
    }
}

/// Keeps the background log writer alive; flushes on drop.
#[must_use = "dropping the guard stops file logging"]
pub struct ObservabilityGuard {
    _file: Option<WorkerGuard>,
}

/// Filter directive for the CLI flags and configured level.
fn directive(quiet: bool, verbose: u8, config_level: &str) -> &str {
    if quiet {
        return "error";
    }
    match verbose {
        0 => config_level,
        1 => "debug",
        _ => "trace",
    }
}

/// Build the event filter. `RUST_LOG` wins when set.
pub fn env_filter(quiet: bool, verbose: u8, config_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(directive(quiet, verbose, config_level)))
}

/// Install the global subscriber.
pub fn init_observability(
    config: &ObservabilityConfig,
    filter: EnvFilter,
) -> anyhow::Result<ObservabilityGuard> {
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    let (file_layer, guard) = match config.log_file {
        Some(ref target) => {
            let appender = file_appender(target)?;
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .context("a global tracing subscriber is already installed")?;

    Ok(ObservabilityGuard { _file: guard })
}

fn file_appender(target: &LogFile) -> anyhow::Result<RollingFileAppender> {
    let (dir, appender) = match target {
        LogFile::Exact(path) => {
            let dir = path.parent().unwrap_or_else(|| Path::new(".")).to_path_buf();
            let name = path
                .file_name()
                .with_context(|| format!("log path has no file name: {}", path.display()))?
                .to_os_string();
            (dir.clone(), tracing_appender::rolling::never(dir, name))
        }
        LogFile::Rolling(dir) => (
            dir.clone(),
            tracing_appender::rolling::daily(dir, LOG_FILE_NAME),
        ),
    };
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create log directory {}", dir.display()))?;
    Ok(appender)
}
