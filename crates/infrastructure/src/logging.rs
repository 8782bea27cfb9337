use std::sync::Once;

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

static INIT: Once = Once::new();

/// Initialize structured logging to stdout.
///
/// Uses `RUST_LOG` if set, otherwise falls back to `default_directive`.
/// Idempotent: the engine is loaded as a plugin and the host may call its
/// logging toggle more than once; only the first call installs a
/// subscriber.
pub fn init_logging(default_directive: &str) {
    INIT.call_once(|| {
        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_directive));

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(true).with_ansi(false))
            .init();
    });
}
