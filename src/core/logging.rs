//! Tracing setup: stdout plus a daily-rolling file under the app data dir.

use std::sync::OnceLock;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::core::config::AppPaths;

// The worker guard must outlive the process or buffered log lines are lost.
static FILE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

pub fn init(paths: &AppPaths) {
    std::fs::create_dir_all(&paths.log_dir).ok();

    let rolling = tracing_appender::rolling::daily(&paths.log_dir, "quorum-backend.log");
    let (file_writer, guard) = tracing_appender::non_blocking(rolling);
    let _ = FILE_GUARD.set(guard);

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .with(
            fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(file_writer),
        )
        .try_init();
}
