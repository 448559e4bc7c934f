//! Logging and tracing initialization for Mazurka.
//!
//! The engine logs through `tracing` at every lifecycle transition:
//! session creation/eviction at `info`, conflicted-write retries at
//! `warn`, and refresh-token reuse detection at `error`. Call one of the
//! init functions once at startup, before touching the database.
//!
//! The log level is controlled via the `RUST_LOG` environment variable:
//!
//! ```bash
//! RUST_LOG=mazurka_core=debug,sqlx=warn cargo run
//! ```

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize logging with sensible defaults.
///
/// The log level is controlled by the `RUST_LOG` environment variable
/// and defaults to `info`.
///
/// # Panics
///
/// Panics if called multiple times. Only call it once at startup.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Initialize JSON-formatted logging (recommended for production).
///
/// Outputs logs in JSON format for log aggregation systems.
///
/// # Panics
///
/// Panics if called multiple times. Only call it once at startup.
pub fn init_logging_json() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().json())
        .init();
}
