//! Tracing setup for the command-line tool.
//!
//! Diagnostics go to stderr so merge progress on stdout stays readable. Each
//! launch can also write a plain-text log under `.vocabmerge/logs`; only the
//! newest [`MAX_LOG_FILES`] of those are kept.

use std::{
    fs::{self, OpenOptions},
    path::{Path, PathBuf},
    sync::OnceLock,
    time::SystemTime,
};

use time::{OffsetDateTime, UtcOffset, format_description::FormatItem, macros::format_description};
use tracing_appender::{
    non_blocking::{NonBlocking, WorkerGuard},
    rolling,
};
use tracing_subscriber::{EnvFilter, Registry, fmt, prelude::*};

use crate::app_dirs;

/// Maximum number of launch logs kept in the log directory.
pub const MAX_LOG_FILES: usize = 10;
const LOG_FILE_PREFIX: &str = "vocabmerge_";
const LOG_FILE_EXTENSION: &str = "log";
const FILTER_ENV: &str = "RUST_LOG";

static LOG_GUARD: OnceLock<Option<WorkerGuard>> = OnceLock::new();

/// Errors that may occur while initializing logging.
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("No suitable data directory available for logs")]
    NoDataDir,
    #[error("Failed to prepare log directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to read log directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to remove old log file {path}: {source}")]
    RemoveFile {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to format log filename time: {0}")]
    FormatTime(time::error::Format),
    #[error("Failed to install global tracing subscriber: {0}")]
    SetGlobal(tracing::subscriber::SetGlobalDefaultError),
    #[error("Failed to create log file at {path}: {source}")]
    CreateLogFile {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// How the subscriber should be built for this launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Filter directive used when `RUST_LOG` is unset or blank.
    pub default_filter: String,
    /// Also write a per-launch log file in the app directory.
    pub log_file: bool,
}

impl LogConfig {
    pub fn new(default_filter: impl Into<String>) -> Self {
        Self {
            default_filter: default_filter.into(),
            log_file: true,
        }
    }

    /// Same filter, stderr only.
    pub fn without_file(&self) -> Self {
        Self {
            log_file: false,
            ..self.clone()
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::new("info")
    }
}

struct LaunchLog {
    path: PathBuf,
    writer: NonBlocking,
    guard: WorkerGuard,
}

/// Install the global subscriber.
///
/// Returns the path of this launch's log file, if one was opened. Calls after
/// the first successful one are no-ops and return `None`.
pub fn init(config: &LogConfig) -> Result<Option<PathBuf>, LoggingError> {
    if LOG_GUARD.get().is_some() {
        return Ok(None);
    }

    let launch_log = if config.log_file {
        let dir = app_dirs::logs_dir().map_err(map_app_dir_error)?;
        Some(open_launch_log(&dir, now_local_or_utc())?)
    } else {
        None
    };

    let directive = filter_directive(
        std::env::var(FILTER_ENV).ok().as_deref(),
        &config.default_filter,
    );
    let timer = build_timer();
    let stderr_layer = fmt::layer()
        .with_timer(timer.clone())
        .with_target(false)
        .with_writer(std::io::stderr);
    let (path, file_layer, guard) = match launch_log {
        Some(LaunchLog {
            path,
            writer,
            guard,
        }) => {
            let layer = fmt::layer()
                .with_ansi(false)
                .with_timer(timer)
                .with_writer(writer);
            (Some(path), Some(layer), Some(guard))
        }
        None => (None, None, None),
    };

    let subscriber = Registry::default()
        .with(build_env_filter(&directive, &config.default_filter))
        .with(stderr_layer)
        .with(file_layer);
    tracing::subscriber::set_global_default(subscriber).map_err(LoggingError::SetGlobal)?;
    let _ = LOG_GUARD.set(guard);

    match &path {
        Some(path) => tracing::debug!(
            version = env!("CARGO_PKG_VERSION"),
            filter = %directive,
            "Logging to {}",
            path.display()
        ),
        None => tracing::debug!(
            version = env!("CARGO_PKG_VERSION"),
            filter = %directive,
            "Logging to stderr only"
        ),
    }
    Ok(path)
}

/// Pick the filter directive: a non-blank `RUST_LOG` wins over the CLI default.
fn filter_directive(env_value: Option<&str>, default_filter: &str) -> String {
    match env_value.map(str::trim) {
        Some(value) if !value.is_empty() => value.to_string(),
        _ => default_filter.to_string(),
    }
}

fn build_env_filter(directive: &str, default_filter: &str) -> EnvFilter {
    EnvFilter::try_new(directive).unwrap_or_else(|err| {
        eprintln!("Ignoring invalid {FILTER_ENV} value {directive:?}: {err}");
        EnvFilter::new(default_filter)
    })
}

fn open_launch_log(dir: &Path, now: OffsetDateTime) -> Result<LaunchLog, LoggingError> {
    let file_name = log_file_name(now)?;
    let path = dir.join(&file_name);
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|source| LoggingError::CreateLogFile {
            path: path.clone(),
            source,
        })?;
    prune_old_logs(dir, MAX_LOG_FILES)?;
    let (writer, guard) = tracing_appender::non_blocking(rolling::never(dir, file_name));
    Ok(LaunchLog {
        path,
        writer,
        guard,
    })
}

fn is_launch_log(path: &Path) -> bool {
    let has_prefix = path
        .file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with(LOG_FILE_PREFIX));
    has_prefix && path.extension().and_then(|ext| ext.to_str()) == Some(LOG_FILE_EXTENSION)
}

/// Remove the oldest launch logs so at most `max_files` remain.
fn prune_old_logs(dir: &Path, max_files: usize) -> Result<(), LoggingError> {
    let mut logs = fs::read_dir(dir)
        .map_err(|source| LoggingError::ReadDir {
            path: dir.to_path_buf(),
            source,
        })?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_ok_and(|kind| kind.is_file()))
        .map(|entry| entry.path())
        .filter(|path| is_launch_log(path))
        .map(|path| {
            let modified = fs::metadata(&path)
                .and_then(|meta| meta.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            (modified, path)
        })
        .collect::<Vec<_>>();

    let Some(excess) = logs.len().checked_sub(max_files).filter(|excess| *excess > 0) else {
        return Ok(());
    };
    // Names embed the launch time, so they break ties between equal mtimes.
    logs.sort();
    for (_, path) in logs.into_iter().take(excess) {
        tracing::trace!("Removing old log {}", path.display());
        fs::remove_file(&path).map_err(|source| LoggingError::RemoveFile { path, source })?;
    }
    Ok(())
}

fn log_file_name(now: OffsetDateTime) -> Result<String, LoggingError> {
    const NAME_FORMAT: &[FormatItem<'_>] =
        format_description!("[year]-[month]-[day]_[hour]-[minute]-[second]");
    let stamp = now.format(NAME_FORMAT).map_err(LoggingError::FormatTime)?;
    Ok(format!("{LOG_FILE_PREFIX}{stamp}.{LOG_FILE_EXTENSION}"))
}

fn build_timer() -> fmt::time::OffsetTime<time::format_description::BorrowedFormatItem<'static>> {
    const DISPLAY_FORMAT: &[FormatItem<'static>] =
        format_description!("[hour]:[minute]:[second]");
    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
    fmt::time::OffsetTime::new(offset, DISPLAY_FORMAT.into())
}

fn now_local_or_utc() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}

fn map_app_dir_error(error: app_dirs::AppDirError) -> LoggingError {
    match error {
        app_dirs::AppDirError::NoBaseDir => LoggingError::NoDataDir,
        app_dirs::AppDirError::CreateDir { path, source } => LoggingError::CreateDir { path, source },
    }
}
