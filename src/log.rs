//! Diagnostic sink handed to the scanner.
//!
//! The scanner never depends on what a sink does with a line; the sink only
//! observes. `TracingLog` is what the binary uses.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

pub trait ScanLog {
    fn info(&self, message: &str);

    fn debug(&self, message: &str) {
        self.info(message);
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLog;

impl ScanLog for TracingLog {
    fn info(&self, message: &str) {
        tracing::info!(target: "known_defects", "{message}");
    }

    fn debug(&self, message: &str) {
        tracing::debug!(target: "known_defects", "{message}");
    }
}

/// Send `tracing` output to stderr. `RUST_LOG` wins over `verbosity`.
pub fn init_logging(verbosity: u8) {
    let default_level = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .try_init();
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullLog;

impl ScanLog for NullLog {
    fn info(&self, _message: &str) {}

    fn debug(&self, _message: &str) {}
}
