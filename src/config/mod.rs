//! Configuration Management
//!
//! Hierarchical resolution:
//! 1. Built-in defaults
//! 2. Global config (~/.config/quizforge/config.toml)
//! 3. Project config (.quizforge/config.toml)
//! 4. Environment variables (QUIZFORGE_<SECTION>__<KEY>)

mod loader;
mod types;

pub use loader::{ConfigFormat, ConfigLoader};
pub use types::*;
