//! Test logging utilities
//!
//! Routes `tracing` events emitted by the polymorphic crates to the test
//! harness output.

use std::sync::Once;

static INIT: Once = Once::new();

/// Initialize logging for tests (call once)
///
/// The filter is read from `RUST_LOG`, falling back to `warn`.
///
/// # Examples
///
/// ```
/// use reinhardt_polymodels_test::logging::init_test_logging;
///
/// init_test_logging();
/// init_test_logging();
/// ```
pub fn init_test_logging() {
	INIT.call_once(|| {
		let filter = tracing_subscriber::EnvFilter::try_from_default_env()
			.unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
		let _ = tracing_subscriber::fmt()
			.with_env_filter(filter)
			.with_test_writer()
			.try_init();
	});
}
