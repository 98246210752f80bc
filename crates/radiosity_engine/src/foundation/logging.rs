//! Logging utilities and structured logging support

pub use log::{debug, info, warn, error, trace};

/// Initialize the logging system from `RUST_LOG`
pub fn init() {
    env_logger::init();
}

/// Initialize the logging system with a fallback level
///
/// `RUST_LOG` still wins when it is set; `level` is only used as the default
/// filter (for example the `log_level` entry of a config file).
pub fn init_with_level(level: &str) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}
