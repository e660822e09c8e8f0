//! Logger setup for native and browser builds.

/// Installs the global logger.
///
/// Native builds log through `env_logger`; `RUST_LOG` takes precedence over `level`.
/// In the browser, records go to the devtools console and panics are routed there
/// too. Calling this more than once is harmless.
pub fn init_logging(level: log::LevelFilter) {
    #[cfg(not(target_arch = "wasm32"))]
    {
        let mut builder = env_logger::Builder::new();
        match std::env::var("RUST_LOG") {
            Ok(filter) => {
                builder.parse_filters(&filter);
            }
            Err(_) => {
                builder.filter_level(level);
            }
        }
        if let Err(e) = builder.try_init() {
            log::debug!("logger already initialized: {}", e);
        }
    }

    #[cfg(target_arch = "wasm32")]
    {
        console_error_panic_hook::set_once();
        let level = level.to_level().unwrap_or(log::Level::Error);
        if let Err(e) = console_log::init_with_level(level) {
            log::debug!("logger already initialized: {}", e);
        }
    }
}
