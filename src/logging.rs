//! Tracing setup for the projection runner.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Installs a compact subscriber. `RUST_LOG` overrides `default_level`.
pub fn init_with_level(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}
