//! Test harness helpers.

use tracing_subscriber::EnvFilter;

/// Install a test-friendly subscriber once per process.
///
/// Honors `RUST_LOG`; defaults to `dhara_hil=debug`. Later calls are no-ops.
pub fn init_test_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("dhara_hil=debug"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
