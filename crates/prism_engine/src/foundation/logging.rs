//! Logging utilities and structured logging support

pub use log::{debug, error, info, trace, warn};

/// Initialize the logging system
pub fn init() {
    env_logger::init();
}

/// Initialize the logging system, ignoring repeated initialization
///
/// Useful in tests and examples where several entry points may race to
/// set up logging.
pub fn try_init() {
    let _ = env_logger::try_init();
}
