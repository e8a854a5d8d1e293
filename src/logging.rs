//! Tracing initialization.

use tracing_subscriber::{fmt, EnvFilter};

use crate::config::AppConfig;

/// Initializes tracing using the provided log level as the default filter.
///
/// `RUST_LOG` overrides the configured level when set. Safe to call more
/// than once; later calls are no-ops.
pub fn init_tracing(level: &str, json: bool) {
    let default_directive = format!("stockroom_api={}", level);
    let filter_directive = std::env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    if json {
        let _ = fmt()
            .with_env_filter(EnvFilter::new(filter_directive))
            .json()
            .try_init();
    } else {
        let _ = fmt()
            .with_env_filter(EnvFilter::new(filter_directive))
            .try_init();
    }
}

/// Initializes tracing straight from an [`AppConfig`].
pub fn init_from_config(config: &AppConfig) {
    init_tracing(&config.log_level, config.log_json);
}
