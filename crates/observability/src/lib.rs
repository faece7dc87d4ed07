//! Tracing and logging setup shared by the binaries and tests.

/// Initialize process-wide logging from the environment.
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    crate::tracing::init(crate::tracing::LogConfig::from_env());
}

/// Tracing configuration (filters, output format).
pub mod tracing;
