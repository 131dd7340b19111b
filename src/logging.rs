//! Tracing configuration and log routing.
//!
//! The server logs to stdout through a compact formatter and to a file: `PDFQA_LOG_FILE` when
//! set, `logs/pdfqa.log` otherwise. The file layer writes through a non-blocking appender whose
//! guard lives for the rest of the process. The command-line tool logs to stderr only so its
//! answers stay clean on stdout.
use std::path::PathBuf;
use std::sync::OnceLock;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

const LOG_FILE_VAR: &str = "PDFQA_LOG_FILE";
const DEFAULT_LOG_DIR: &str = "logs";
const DEFAULT_LOG_NAME: &str = "pdfqa.log";

/// Where file logs are written.
#[derive(Debug, Clone, PartialEq, Eq)]
enum LogTarget {
    /// Explicit file, opened in append mode.
    File(PathBuf),
    /// Default file inside a directory created on demand.
    Directory { dir: PathBuf, name: &'static str },
}

fn resolve_log_target(explicit: Option<String>) -> LogTarget {
    match explicit.filter(|value| !value.trim().is_empty()) {
        Some(path) => LogTarget::File(PathBuf::from(path)),
        None => LogTarget::Directory {
            dir: PathBuf::from(DEFAULT_LOG_DIR),
            name: DEFAULT_LOG_NAME,
        },
    }
}

/// Configure tracing for the HTTP server: stdout plus file.
///
/// Respects `RUST_LOG` for filtering (defaults to `info`).
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stdout_layer = fmt::layer().with_target(false).compact();

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer);

    let target = resolve_log_target(std::env::var(LOG_FILE_VAR).ok());
    if let Some(writer) = configure_file_writer(&target) {
        let file_layer = fmt::layer()
            .with_writer(writer)
            .with_target(true)
            .with_ansi(false)
            .compact();

        registry.with(file_layer).init();
    } else {
        registry.init();
    }
}

/// Configure tracing for the command-line tool: stderr only, `warn` unless `RUST_LOG` says
/// otherwise.
pub fn init_cli_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .compact(),
        )
        .init();
}

/// Build a non-blocking writer for `target`, or `None` when it cannot be opened.
fn configure_file_writer(target: &LogTarget) -> Option<NonBlocking> {
    let (non_blocking, guard) = match target {
        LogTarget::File(path) => {
            match std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
            {
                Ok(file) => tracing_appender::non_blocking(file),
                Err(err) => {
                    eprintln!("Failed to open log file {}: {err}", path.display());
                    return None;
                }
            }
        }
        LogTarget::Directory { dir, name } => {
            if let Err(err) = std::fs::create_dir_all(dir) {
                eprintln!("Failed to create logs directory {}: {err}", dir.display());
                return None;
            }
            tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name))
        }
    };
    let _ = LOG_GUARD.set(guard);
    Some(non_blocking)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_log_file_wins() {
        assert_eq!(
            resolve_log_target(Some("/tmp/pdfqa-test.log".into())),
            LogTarget::File(PathBuf::from("/tmp/pdfqa-test.log"))
        );
    }

    #[test]
    fn blank_or_missing_variable_uses_default_directory() {
        let expected = LogTarget::Directory {
            dir: PathBuf::from("logs"),
            name: "pdfqa.log",
        };
        assert_eq!(resolve_log_target(None), expected);
        assert_eq!(resolve_log_target(Some("  ".into())), expected);
    }

    #[test]
    fn unopenable_file_disables_file_layer() {
        let dir = tempfile::tempdir().unwrap();
        let target = LogTarget::File(dir.path().join("missing").join("pdfqa.log"));
        assert!(configure_file_writer(&target).is_none());
    }
}
