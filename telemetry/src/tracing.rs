use std::sync::Once;

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Environment variable turning on log output in tests.
const ENABLE_TEST_LOGS_ENV_NAME: &str = "ENABLE_TEST_LOGS";

static INIT_TEST_TRACING: Once = Once::new();

/// Installs the global subscriber.
///
/// `RUST_LOG` takes precedence over `default_directive` when set. Fails if a global subscriber
/// is already installed.
pub fn init_tracing(default_directive: &str) -> Result<(), tracing_subscriber::util::TryInitError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .try_init()
}

/// Installs a subscriber writing through the test harness capture, at most once per process.
///
/// Output is only produced when `ENABLE_TEST_LOGS` is set, so test runs stay quiet by default.
pub fn init_test_tracing() {
    INIT_TEST_TRACING.call_once(|| {
        if std::env::var(ENABLE_TEST_LOGS_ENV_NAME).is_err() {
            return;
        }

        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("reconcile=debug,info"));

        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_test_writer())
            .try_init();
    });
}
