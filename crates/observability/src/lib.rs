//! Process-wide logging for the stockledger binaries and tests.

/// Install the JSON subscriber.
///
/// `default_level` applies when `RUST_LOG` is unset; later calls are no-ops.
pub fn init(default_level: &str) {
    tracing::init(default_level);
}

pub mod tracing;
