//! The Core module is the integration point for arbor's functionality.
//!
//! It re-exports the public interfaces of the tool-specific crates, so that other projects
//! can depend on a single crate.

pub use arbor_structurizer;
