//! Tracing subscriber setup
//!
//! Console output always; a daily-rotated `sealbatch.log` when the log
//! directory is writable and `logging.file` is on. `RUST_LOG` overrides the
//! configured level.

use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

pub const LOG_FILE: &str = "sealbatch.log";
const DEFAULT_LOG_DIR: &str = "/var/log/sealbatch";

/// `warn` for dependencies, the configured level for this crate.
pub fn default_filter(level: &str) -> String {
    format!("warn,sealbatch={}", level.to_ascii_lowercase())
}

/// Env override, then `logging.dir`, then the system default.
pub fn resolve_log_dir(config: &LoggingConfig, env_dir: Option<String>) -> PathBuf {
    env_dir
        .filter(|d| !d.trim().is_empty())
        .or_else(|| config.dir.clone())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_DIR))
}

/// Create `dir` and check a file can be appended there.
///
/// `rolling::daily` panics when it cannot open its first file.
pub fn preflight_log_dir(dir: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)?;
    let marker = dir.join(".sealbatch_write_test");
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&marker)?;
    let _ = std::fs::remove_file(&marker);
    Ok(())
}

/// Install the global subscriber.
///
/// Keep the returned guard alive for the life of the process; dropping it
/// flushes and closes the file writer.
pub fn init(config: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(&config.level)));

    let mut file_problem = None;
    let mut guard = None;
    let mut file_dir = None;
    let file_layer = if config.file {
        let dir = resolve_log_dir(config, std::env::var("SEALBATCH_LOG_DIR").ok());
        match preflight_log_dir(&dir) {
            Ok(()) => {
                let appender = tracing_appender::rolling::daily(&dir, LOG_FILE);
                let (writer, file_guard) = tracing_appender::non_blocking(appender);
                guard = Some(file_guard);
                file_dir = Some(dir);
                Some(
                    tracing_subscriber::fmt::layer()
                        .with_writer(writer)
                        .with_ansi(false)
                        .with_target(true),
                )
            }
            Err(e) => {
                file_problem = Some(format!("{}: {}", dir.display(), e));
                None
            }
        }
    } else {
        None
    };

    let json_layer = config
        .json
        .then(|| tracing_subscriber::fmt::layer().json().with_target(true));
    let console_layer = (!config.json).then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_file(false)
            .with_line_number(false)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(json_layer)
        .with(file_layer)
        .init();

    // Reported once the subscriber exists so it lands in the console log
    if let Some(problem) = file_problem {
        tracing::warn!("File logging disabled, log directory not writable ({})", problem);
    }
    if let Some(dir) = file_dir {
        tracing::info!("File logging enabled: {}", dir.join(LOG_FILE).display());
    }
    guard
}

/// Warnings only, for one-shot commands.
pub fn init_quiet() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .try_init();
}
