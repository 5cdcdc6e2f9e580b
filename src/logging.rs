//! Logger setup for binaries built on GLPS

/// Installs `env_logger`. `RUST_LOG` wins over the default filter, which is
/// `debug` when `debug` is set and `info` otherwise. Calling it twice is
/// harmless.
pub fn init(debug: bool) {
    let default_filter = if debug { "debug" } else { "info" };
    let result = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(default_filter),
    )
    .format_timestamp_millis()
    .try_init();

    if result.is_ok() {
        log::debug!("🔧 Logging initialised (default filter: {})", default_filter);
    }
}
