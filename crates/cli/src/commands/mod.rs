//! Command handlers for the FAQ bot CLI.
//!
//! This module organizes all CLI commands into separate submodules.

pub mod ask;
pub mod evaluate;
pub mod optimize;
pub mod test_model;

// Re-export command types for convenience
pub use ask::AskCommand;
pub use evaluate::EvaluateCommand;
pub use optimize::OptimizeCommand;
pub use test_model::TestModelCommand;
