mod args;
mod function;

// re-export the public interface
pub use args::*;
pub use function::*;
