use std::env;
use std::path::Path;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

fn filter_layer() -> EnvFilter {
    let filter = env::var("TRACING_LEVEL").unwrap_or_else(|_| "info".to_string());
    EnvFilter::new(filter)
}

/// Log to stdout and append to `log_path`. Keep the guard alive for the
/// whole run or the tail of the file log is lost.
pub fn init_logger(log_path: &Path) -> WorkerGuard {
    let dir = log_path.parent().unwrap_or_else(|| Path::new("."));
    let file_name = log_path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "moss-batch.log".into());

    let file_appender = tracing_appender::rolling::never(dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stdout)
                .with_file(false)
                .with_target(false)
                .without_time()
                .with_ansi(true),
        )
        .with(
            fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false),
        )
        .with(filter_layer())
        .init();

    info!("Logging to stdout and {}", log_path.display());

    guard
}

/// Stdout only, for commands that do not touch a job directory.
pub fn init_console_logger() {
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stdout)
                .with_file(false)
                .with_target(false)
                .without_time()
                .with_ansi(true),
        )
        .with(filter_layer())
        .init();
}
