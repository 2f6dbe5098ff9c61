use std::fs::OpenOptions;
use std::io;
use std::path::Path;
use std::sync::Mutex;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

const LOG_FILTER_ENV: &str = "DUMPVIEW_LOG";
const LOG_FILE_ENV: &str = "DUMPVIEW_LOG_FILE";

#[derive(Debug, Error)]
pub enum InitLoggingError {
    #[error("failed to open log file {path}: {source}")]
    OpenLogFile { path: String, source: io::Error },
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_FILTER_ENV).unwrap_or_else(|_| EnvFilter::new("warn"))
}

/// Logs to stderr; used by the non-interactive subcommands.
pub fn init_stderr_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

/// Logs to `DUMPVIEW_LOG_FILE` when set; the terminal UI owns stderr otherwise.
pub fn init_file_logging() -> Result<(), InitLoggingError> {
    let Some(path) = std::env::var_os(LOG_FILE_ENV) else {
        return Ok(());
    };
    let path = Path::new(&path);
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| InitLoggingError::OpenLogFile {
            path: path.display().to_string(),
            source,
        })?;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .try_init();
    Ok(())
}
