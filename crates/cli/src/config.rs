//! Logging setup shared by every subcommand.

use chord_core::LogLevel;

/// Install a `tracing-subscriber` fmt layer at `level`, honoring `RUST_LOG`
/// if set. A `LogLevel::Null` node runs silent, matching the core's own
/// "stabilization errors are logged, never surfaced" policy.
pub fn init_tracing(level: LogLevel) {
    let Some(level) = level.as_tracing_level() else {
        return;
    };
    let filter = tracing_subscriber::EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
