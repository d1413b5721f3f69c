//! Telemetry initialization.
//!
//! Logging goes to stderr, filtered by `RUST_LOG` (default: `warn`).
//! `BACKPORT_LOG_FORMAT=json` switches to JSON events for pipelines that
//! collect structured logs; anything else gets the compact human format.

use tracing_subscriber::EnvFilter;

/// Initialize the tracing subscriber. Call once, from `main`.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let json = std::env::var("BACKPORT_LOG_FORMAT").is_ok_and(|v| v == "json");

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .compact()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}
