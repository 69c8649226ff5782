use std::sync::Once;

static INIT: Once = Once::new();

/// Initialize test logging once per test binary. Honors `RUST_LOG`; output
/// goes through the test writer so it only shows for failing tests.
pub fn init_test_logging() {
    INIT.call_once(|| {
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .finish();

        // Another harness may already have installed a subscriber
        let _ = tracing::subscriber::set_global_default(subscriber);
    });
}
