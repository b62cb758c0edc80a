//! Logging setup

/// Install `env_logger` with an `info` default filter.
///
/// `RUST_LOG` overrides the default. Calling it again is a no-op.
///
/// # Example
/// ```
/// octwig::core::logging::init();
/// log::info!("World generation started");
/// ```
pub fn init() {
    init_with_filter("info");
}

/// Install `env_logger`, falling back to `filter` when `RUST_LOG` is unset
pub fn init_with_filter(filter: &str) {
    let result = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter))
        .format_timestamp_millis()
        .try_init();
    if result.is_err() {
        log::debug!("Logger already installed");
    }
}
