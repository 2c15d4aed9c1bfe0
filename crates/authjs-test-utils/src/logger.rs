// Test logging setup.

use tracing_subscriber::EnvFilter;

/// Install a test-writer subscriber. Safe to call from every test.
pub fn init_test_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("authjs_test_utils=info,authjs_cosmosdb=debug"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
