//! Logging setup.
//!
//! The crate itself only emits `tracing` events. Binaries and tests that want
//! to see them call [`init`] once at startup; `RUST_LOG` takes precedence over
//! the level passed in:
//!
//! ```bash
//! RUST_LOG=docqa=debug my-service
//! ```

use std::sync::Once;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

static INIT: Once = Once::new();

/// Install a formatted stderr subscriber filtered at `default_level`
/// (`error`, `warn`, `info`, `debug` or `trace`).
///
/// Safe to call more than once; only the first call has an effect. If another
/// global subscriber is already installed, that one is kept.
pub fn init(default_level: &str) {
    INIT.call_once(|| {
        let filter = if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            EnvFilter::try_new(default_level).unwrap_or_else(|_| EnvFilter::new("info"))
        };

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_level(true)
            .with_writer(std::io::stderr);

        let _ = tracing_subscriber::registry().with(filter).with(fmt_layer).try_init();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent() {
        init("debug");
        init("not a level");
        tracing::info!("logging initialized");
    }
}
