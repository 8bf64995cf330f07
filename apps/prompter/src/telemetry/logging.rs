//! Global `tracing` subscriber for the prompter binary.
use clap::ValueEnum;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::OnceLock;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Overrides the computed filter with a raw `EnvFilter` directive string.
pub const FILTER_ENV: &str = "PROMPTER_LOG_FILTER";

#[derive(Clone, Copy, Debug, Default, ValueEnum, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Error,
    #[default]
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Directive string for this level. Verbose levels only open up our own
    /// `prompter.*` targets so websocket internals stay quiet.
    pub fn directives(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "warn,prompter=info",
            LogLevel::Debug => "info,prompter=debug,prompter_bus=debug",
            LogLevel::Trace => "info,prompter=trace,prompter_bus=trace,tungstenite=debug",
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct LogConfig {
    pub level: LogLevel,
    pub file: Option<PathBuf>,
}

#[derive(thiserror::Error, Debug)]
pub enum InitError {
    #[error("failed to open log file {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to install subscriber: {0}")]
    Configure(String),
}

// Holds the appender's worker for the life of the process; dropping it would
// stop log delivery.
static WRITER_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Installs the global subscriber. Only the first call has any effect.
pub fn init(config: &LogConfig) -> Result<(), InitError> {
    if WRITER_GUARD.get().is_some() {
        return Ok(());
    }

    let (writer, guard) = match &config.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|source| InitError::Io {
                    path: path.clone(),
                    source,
                })?;
            tracing_appender::non_blocking(file)
        }
        None => tracing_appender::non_blocking(std::io::stderr()),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter_for(config.level))
        .with_target(true)
        .with_ansi(config.file.is_none())
        .with_writer(writer)
        .try_init()
        .map_err(|err| InitError::Configure(err.to_string()))?;

    let _ = WRITER_GUARD.set(guard);
    Ok(())
}

fn filter_for(level: LogLevel) -> EnvFilter {
    std::env::var(FILTER_ENV)
        .ok()
        .filter(|raw| !raw.trim().is_empty())
        .map(EnvFilter::new)
        .unwrap_or_else(|| EnvFilter::new(level.directives()))
}
