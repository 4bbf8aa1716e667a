//! Logging bootstrap.
//!
//! Thin wrapper over the `observability` crate so binaries configure
//! tracing from a [`Config`](crate::Config) level in one call.

use crate::Paths;
use observability::LogConfig;

/// Initialize tracing for a biogate binary.
///
/// Structured JSONL goes to `~/.biogate/logs/biogate.jsonl`; `RUST_LOG`
/// overrides `level`. Set `also_stderr` for foreground debugging only,
/// since stderr lines interleave with the interactive transcript.
pub fn init_logging(service_name: &str, level: &str, paths: Option<&Paths>, also_stderr: bool) {
    observability::init_with_config(LogConfig {
        service_name: service_name.into(),
        default_level: level.into(),
        log_path: paths.map(Paths::log_file),
        also_stderr,
    });
}

/// Parse a log level string into a tracing Level.
pub fn parse_level(level: &str) -> tracing::Level {
    match level.to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "warn" | "warning" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    }
}
