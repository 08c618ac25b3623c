//! Logging utilities
//!
//! The library logs through the `log` facade; only binaries install a logger.

pub use log::{debug, error, info, trace, warn};

/// Initialize env_logger for binaries and tests
///
/// Defaults to `info` when `RUST_LOG` is unset, so player binaries report
/// frame and binding activity out of the box.
pub fn init() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
}
