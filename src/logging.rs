use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Default filter when `RUST_LOG` is not set
pub const DEFAULT_FILTER: &str = "info";

/// Setup tracing based on environment
///
/// Priority (first match wins):
/// 1. If RUST_LOG_DISABLE is set - disable tracing completely
/// 2. If RUST_LOG is set and valid - use environment configuration
/// 3. Otherwise - `info` for every target
///
/// # Examples
/// ```bash
/// # Environment-driven (standard approach)
/// RUST_LOG=bbq_bridge_core=debug,rumqttc=warn bbq-bridge
///
/// # Force disable even if RUST_LOG is set
/// RUST_LOG_DISABLE=1 bbq-bridge
/// ```
pub fn setup() {
	if std::env::var("RUST_LOG_DISABLE").is_ok() {
		return;
	}

	let filter = tracing_subscriber::EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| DEFAULT_FILTER.into());

	tracing_subscriber::registry()
		.with(filter)
		.with(
			tracing_subscriber::fmt::layer()
				.with_target(true)
				.with_thread_ids(false)
				.with_thread_names(false)
				.with_file(false)
				.with_line_number(false)
				.compact(),
		)
		.init();
}
