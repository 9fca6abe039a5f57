//! Logging utilities and structured logging support

pub use log::{debug, info, warn, error, trace, LevelFilter};

/// Initialize logging at a fixed level, keeping any per-module `RUST_LOG` filters
///
/// Safe to call more than once; later calls are ignored.
pub fn init_with_level(level: LevelFilter) {
    let _ = env_logger::Builder::from_default_env()
        .filter_level(level)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        init_with_level(LevelFilter::Debug);
        init_with_level(LevelFilter::Warn);
        info!("logging initialized twice without panicking");
    }
}
