//! Shared test setup.

use std::sync::Once;

static INIT: Once = Once::new();

/// Initialize tracing and error reporting for a test.
///
/// Call at the start of every test. The subscriber respects `RUST_LOG`,
/// so a failing test can be re-run with full trace output. Repeated calls
/// are no-ops, and parallel test threads share the one subscriber.
pub fn init() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .with_test_writer()
            .init();

        color_eyre::install().expect("color_eyre installs once");
    })
}
