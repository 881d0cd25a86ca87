//! Log subscriber setup.
//!
//! Library crates only emit `tracing` events; a subscriber is installed here,
//! by the `meltshop` binary or by tests that want to see the output.
//!
//! `RUST_LOG` filters as usual (default `info`), for example
//! `RUST_LOG=meltshop_core=debug` or `RUST_LOG=warn,meltshop_stats=trace`.

use tracing_subscriber::{EnvFilter, fmt};

/// Output style of the subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

fn filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber. Logs go to stderr so stdout stays free
/// for the run summary.
pub fn init(format: LogFormat) {
    let builder = fmt()
        .with_env_filter(filter())
        .with_target(true)
        .with_line_number(true)
        .with_writer(std::io::stderr);
    // A second call (or a subscriber set by an embedding program) wins.
    let _ = match format {
        LogFormat::Pretty => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}

/// Verbose subscriber for tests, captured by the test harness.
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}
