//! Config Command
//!
//! Usage:
//!   quizforge config show [-f toml|json|yaml]
//!   quizforge config path
//!   quizforge config init [--force]

use crate::cli::Output;
use crate::config::{ConfigFormat, ConfigLoader};
use crate::types::Result;

/// Print the effective configuration merged from every source
pub fn show(format: ConfigFormat) -> Result<()> {
    let config = ConfigLoader::load()?;
    print!("{}", ConfigLoader::render(&config, format)?);
    Ok(())
}

pub fn path() -> Result<()> {
    ConfigLoader::show_path();
    Ok(())
}

pub fn init(force: bool) -> Result<()> {
    let path = ConfigLoader::init_project(force)?;
    let output = Output::new();
    output.success("Initialized project configuration");
    output.info(&format!("Config: {}", path.display()));
    Ok(())
}
