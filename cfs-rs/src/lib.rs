//! Closed-form script compiler.
//!
//! See [`script`] for the compiler itself and [`cli`] for the `cfs` command.

pub mod cli;
pub mod config;
pub mod script;

use tracing_subscriber::{fmt, EnvFilter};

/// Initialize stderr logging.
///
/// `RUST_LOG` overrides the default filter, which is `warn`, or `trace` for
/// this crate when `debug` is set.
pub fn init_logging(debug: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if debug { "warn,cfs=trace" } else { "warn" })
    });

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
