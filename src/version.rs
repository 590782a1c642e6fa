//! Crate version reported by the CLI.

/// Cargo package version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
