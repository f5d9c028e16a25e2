//! Common utilities used across the arbor crates.

/// General utility functions and types for common tasks.
pub mod utils;
