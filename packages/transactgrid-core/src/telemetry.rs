//! Logging setup and span helpers

use tracing::Span;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install a global fmt subscriber filtered by `RUST_LOG`
///
/// Falls back to `default_directive` (e.g. `"info"` or
/// `"transactgrid_core=debug"`) when `RUST_LOG` is unset or invalid. Returns
/// `false` if a global subscriber was already installed; calling it again is
/// harmless.
pub fn init_tracing(default_directive: &str) -> bool {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true))
        .try_init()
        .is_ok()
}

/// Span for one core operation on behalf of an owner
#[must_use]
pub fn operation_span(operation: &'static str, owner_key: &str) -> Span {
    tracing::info_span!("core", op = operation, owner = owner_key)
}
