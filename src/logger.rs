//! Process-wide logger construction.
//!
//! Structured JSON records go to stdout and to `mongosync.log` in the
//! working directory; error records are mirrored to stderr.  Timestamps are
//! RFC 3339, caller info is short file:line.

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

const LOG_FILE_NAME: &str = "mongosync.log";

/// Install the global subscriber.  The returned guards flush the
/// non-blocking writers and must be held for the life of the process.
pub fn init_logger() -> Vec<WorkerGuard> {
    let (stdout_writer, stdout_guard) = tracing_appender::non_blocking(std::io::stdout());
    let file_appender = tracing_appender::rolling::never(".", LOG_FILE_NAME);
    let (file_writer, file_guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .json()
                .with_file(true)
                .with_line_number(true)
                .with_writer(stdout_writer),
        )
        .with(
            fmt::layer()
                .json()
                .with_file(true)
                .with_line_number(true)
                .with_writer(file_writer),
        )
        .with(
            fmt::layer()
                .json()
                .with_file(true)
                .with_line_number(true)
                .with_writer(std::io::stderr)
                .with_filter(LevelFilter::ERROR),
        )
        .init();

    vec![stdout_guard, file_guard]
}
