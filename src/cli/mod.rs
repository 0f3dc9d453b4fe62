// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Command-line interface of the pose demo: argument parsing, the run loop
//! and console output.

/// CLI arguments.
pub mod args;

/// The demo run loop.
pub mod demo;

/// Console output macros.
pub mod logging;
