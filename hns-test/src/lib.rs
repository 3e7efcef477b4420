//! Miscellaneous test code for the workspace.

use std::sync::Once;

use tracing_error::ErrorLayer;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

pub mod prelude;

static INIT: Once = Once::new();

/// Initialize a test: install a tracing subscriber driven by
/// `RUST_LOG` and color-eyre panic/error reports.
///
/// Call at the top of every test. Idempotent: only the first call in a
/// process does anything.
pub fn init() {
    INIT.call_once(|| {
        let fmt_layer = fmt::layer().with_target(false);
        // Use the RUST_LOG env var, or by default only print errors
        let filter_layer = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("error"));

        tracing_subscriber::registry()
            .with(filter_layer)
            .with(fmt_layer)
            .with(ErrorLayer::default())
            .init();

        color_eyre::install().expect("failed to install color_eyre");
    })
}
