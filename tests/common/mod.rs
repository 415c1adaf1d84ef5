//! Shared test scaffolding for the integration test binaries.

use std::sync::Once;

static TRACING_INIT: Once = Once::new();

/// Initializes a `tracing` subscriber once per test process, so failures in
/// these integration tests surface the engine's own log lines (set
/// `RUST_LOG=attachment_cryptov2=debug` to see them).
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}
