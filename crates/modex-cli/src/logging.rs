//! Logging initialization for the host binary.
//!
//! stdout carries protocol frames, so every layer writes to stderr.

use modex_core::Config;
use std::io;
use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter, Layer};

/// Level for the `modex` crates at a given `-v` count.
fn level_for(verbosity: u8) -> Level {
    match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Install the global subscriber.
///
/// `RUST_LOG` sets the baseline (default `warn`); `-v` raises the level of
/// the `modex` crates on top of it.
pub fn init(config: &Config) {
    let level = level_for(config.verbosity);
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"))
        .add_directive(
            format!("modex={level}")
                .parse()
                .unwrap_or_else(|_| level.into()),
        );

    let output = if config.json_logs {
        fmt::layer()
            .json()
            .with_current_span(true)
            .with_writer(io::stderr)
            .boxed()
    } else {
        fmt::layer()
            .with_target(false)
            .with_ansi(false)
            .with_writer(io::stderr)
            .boxed()
    };

    // only fails if a subscriber is already installed
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(output)
        .try_init();
}
