//! Command Line Interface for scopesearch.

pub mod args;
pub mod commands;
pub mod fixture;
pub mod output;

// Re-export commonly used types
pub use args::*;
pub use commands::*;
pub use fixture::{Fixture, LoadedFixture};
pub use output::*;
