//! Prompt system for the FAQ bot.
//!
//! This crate provides the prompting strategy of the answer composer:
//! - `PromptProgram` definitions (persona, domain policy, template, demos)
//! - Handlebars template rendering
//! - Output field markers and completion parsing
//! - JSON/YAML persistence

pub mod builder;
pub mod fields;
pub mod loader;
pub mod types;

// Re-export main types
pub use builder::build_prompt;
pub use fields::{field_marker, parse_completion};
pub use loader::{load_program, save_program, validate_program};
pub use types::{
    BuiltPrompt, BuiltPromptMetadata, Demo, ParsedCompletion, PromptInputs, PromptProgram,
    DEFAULT_TEMPLATE, PROGRAM_API_VERSION,
};
