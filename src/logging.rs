//! Tracing configuration and log routing.
//!
//! Each binary logs to stdout with a compact formatter and appends to its own
//! file under `logs/` (`logs/ragchat.log`, `logs/ragchat-gateway.log`). Setting
//! `RAGCHAT_LOG_FILE` redirects the file output to an explicit path instead. A
//! non-blocking writer keeps file I/O off the request path.

use std::path::PathBuf;
use std::sync::OnceLock;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Configure tracing subscribers for stdout and per-component file logging.
///
/// - Respects `RUST_LOG` for filtering (defaults to `info`).
/// - Installs a compact stdout layer and, when the log file can be opened, a
///   file layer writing to `component`'s own log file.
/// - Uses a global guard to keep the non-blocking writer alive for the process
///   lifetime.
pub fn init_tracing(component: &str) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stdout_layer = fmt::layer().with_target(false).compact();

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer);

    if let Some(writer) = configure_file_writer(component) {
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

/// Destination for a component's file log: the `RAGCHAT_LOG_FILE` override when
/// set, otherwise `logs/<component>.log`.
fn log_file_path(component: &str) -> PathBuf {
    match std::env::var("RAGCHAT_LOG_FILE") {
        Ok(path) if !path.trim().is_empty() => PathBuf::from(path),
        _ => PathBuf::from("logs").join(format!("{component}.log")),
    }
}

/// Build a non-blocking appender for the component's log file.
///
/// Returns `None` when the parent directory cannot be created or the file
/// cannot be opened; the process then logs to stdout only.
fn configure_file_writer(component: &str) -> Option<NonBlocking> {
    let path = log_file_path(component);
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && let Err(err) = std::fs::create_dir_all(parent)
    {
        eprintln!("Failed to create log directory {}: {err}", parent.display());
        return None;
    }

    match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
    {
        Ok(file) => {
            let (non_blocking, guard) = tracing_appender::non_blocking(file);
            let _ = LOG_GUARD.set(guard);
            Some(non_blocking)
        }
        Err(err) => {
            eprintln!("Failed to open log file {}: {err}", path.display());
            None
        }
    }
}
