//! Run-scoped logging
//!
//! One subscriber per run: console output plus `<log_dir>/<dd-mm-yyyy>/app.log`.
//! It is installed as the default for the current thread only and removed
//! again when the [`RunLogger`] is dropped.

use crate::storage::DATE_DIR_FORMAT;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::subscriber::DefaultGuard;
use tracing::warn;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_FILTER: &str = "hashtag_harvester=info";
const LOG_FILE_NAME: &str = "app.log";

pub struct RunLogger {
    log_file: Option<PathBuf>,
    _file_guard: Option<WorkerGuard>,
    _default: DefaultGuard,
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

impl RunLogger {
    /// Console plus dated log file. If the log directory cannot be created
    /// the run continues with console logging only.
    pub fn install(log_dir: &Path) -> Self {
        let date_dir = log_dir.join(chrono::Local::now().format(DATE_DIR_FORMAT).to_string());

        let (file_layer, file_guard, log_file, dir_error) = match fs::create_dir_all(&date_dir) {
            Ok(()) => {
                let appender = tracing_appender::rolling::never(&date_dir, LOG_FILE_NAME);
                let (writer, guard) = tracing_appender::non_blocking(appender);
                let layer = fmt::layer().with_ansi(false).with_writer(writer);
                (Some(layer), Some(guard), Some(date_dir.join(LOG_FILE_NAME)), None)
            }
            Err(e) => (None, None, None, Some(e)),
        };

        let subscriber = tracing_subscriber::registry()
            .with(env_filter())
            .with(fmt::layer().with_target(false))
            .with(file_layer);
        let default = tracing::subscriber::set_default(subscriber);

        if let Some(e) = dir_error {
            warn!(dir = %date_dir.display(), error = %e, "Log directory unavailable, console logging only");
        }

        Self {
            log_file,
            _file_guard: file_guard,
            _default: default,
        }
    }

    pub fn console_only() -> Self {
        let subscriber = tracing_subscriber::registry()
            .with(env_filter())
            .with(fmt::layer().with_target(false));

        Self {
            log_file: None,
            _file_guard: None,
            _default: tracing::subscriber::set_default(subscriber),
        }
    }

    pub fn log_file(&self) -> Option<&Path> {
        self.log_file.as_deref()
    }
}
