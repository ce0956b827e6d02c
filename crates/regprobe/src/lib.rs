//! Command-line register probe built on `regmap-core`.

/// Command-line argument parsing.
pub mod args;
/// Device Port construction from command-line arguments.
pub mod backend;
/// Stderr logging setup.
pub mod logging;
