#![cfg(feature = "net")]

use std::env;

use tracing_subscriber::EnvFilter;

/// Initialize logging with a filter taken from the `ARMADA_LOG` environment
/// variable, falling back to `RUST_LOG` and then to `info`.
///
/// Safe to call more than once; only the first call installs a subscriber.
pub fn init_logging() {
    let filter = env::var("ARMADA_LOG")
        .ok()
        .and_then(|spec| EnvFilter::try_new(spec).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
