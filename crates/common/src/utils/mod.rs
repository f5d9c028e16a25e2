/// Input/output utilities for file manipulation.
pub mod io;
