//! Configuration Loader (Figment-based)
//!
//! Loads and merges configuration from multiple sources using Figment:
//! 1. Built-in defaults (Serialized)
//! 2. Global config (~/.config/quizforge/config.toml)
//! 3. Project config (.quizforge/config.toml)
//! 4. Environment variables (QUIZFORGE_* prefix, `__` between section and key)

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::types::Config;
use crate::types::{QuizError, Result};

const ENV_PREFIX: &str = "QUIZFORGE_";

/// Output format for `config show`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConfigFormat {
    #[default]
    Toml,
    Json,
    Yaml,
}

impl std::str::FromStr for ConfigFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "toml" => Ok(Self::Toml),
            "json" => Ok(Self::Json),
            "yaml" | "yml" => Ok(Self::Yaml),
            _ => Err(format!(
                "Invalid format '{}'. Valid values: toml, json, yaml",
                s
            )),
        }
    }
}

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with full resolution chain:
    /// defaults → global → project → env vars
    pub fn load() -> Result<Config> {
        Self::load_layers(
            Self::global_config_path().as_deref(),
            &Self::project_config_path(),
        )
    }

    /// Load configuration from a specific file only (plus env overrides)
    pub fn load_from_file(path: &Path) -> Result<Config> {
        Self::load_layers(None, path)
    }

    fn load_layers(global: Option<&Path>, project: &Path) -> Result<Config> {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        if let Some(global_path) = global
            && global_path.exists()
        {
            debug!(path = %global_path.display(), "Loading global config");
            figment = figment.merge(Toml::file(global_path));
        }

        if project.exists() {
            debug!(path = %project.display(), "Loading project config");
            figment = figment.merge(Toml::file(project));
        }

        // QUIZFORGE_PIPELINE__WORKER_COUNT -> pipeline.worker_count
        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__").lowercase(true));

        let config: Config = figment
            .extract()
            .map_err(|e| QuizError::Config(format!("Configuration error: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    // =========================================================================
    // Path Management
    // =========================================================================

    /// Global config directory (~/.config/quizforge on Linux)
    pub fn global_dir() -> Option<PathBuf> {
        ProjectDirs::from("", "", "quizforge").map(|dirs| dirs.config_dir().to_path_buf())
    }

    pub fn global_config_path() -> Option<PathBuf> {
        Self::global_dir().map(|dir| dir.join("config.toml"))
    }

    pub fn project_dir() -> PathBuf {
        PathBuf::from(".quizforge")
    }

    pub fn project_config_path() -> PathBuf {
        Self::project_dir().join("config.toml")
    }

    // =========================================================================
    // Config Commands
    // =========================================================================

    pub fn show_path() {
        println!("Configuration paths:");
        println!();

        match Self::global_config_path() {
            Some(global) => {
                let exists = if global.exists() { "✓" } else { "✗" };
                println!("  Global:  {} {}", exists, global.display());
            }
            None => println!("  Global:  (not available)"),
        }

        let project = Self::project_config_path();
        let exists = if project.exists() { "✓" } else { "✗" };
        println!("  Project: {} {}", exists, project.display());
    }

    /// Render the effective configuration (secrets are never serialized)
    pub fn render(config: &Config, format: ConfigFormat) -> Result<String> {
        match format {
            ConfigFormat::Json => Ok(serde_json::to_string_pretty(config)?),
            ConfigFormat::Yaml => {
                serde_yaml::to_string(config).map_err(|e| QuizError::Config(e.to_string()))
            }
            ConfigFormat::Toml => {
                toml::to_string_pretty(config).map_err(|e| QuizError::Config(e.to_string()))
            }
        }
    }

    /// Write a commented starter config into `.quizforge/`
    pub fn init_project(force: bool) -> Result<PathBuf> {
        let project_dir = Self::project_dir();
        fs::create_dir_all(&project_dir)?;

        let config_path = project_dir.join("config.toml");
        if !config_path.exists() || force {
            fs::write(&config_path, Self::default_project_config())?;
            info!(path = %config_path.display(), "Created project config");
        } else {
            info!(path = %config_path.display(), "Project config exists");
        }

        Ok(config_path)
    }

    fn default_project_config() -> &'static str {
        r#"# QuizForge Project Configuration

version = "1.0"

[llm]
provider = "gemini"
model = "gemini-2.0-flash"
# api_key is read from GEMINI_API_KEY when unset

[pipeline]
worker_count = 6
sub_batch_concurrency = 15
max_attempts = 3

[notification]
# webhook_url = "https://discord.com/api/webhooks/..."

[storage]
database_path = ".quizforge/quizforge.db"
"#
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_format() {
        assert_eq!("JSON".parse::<ConfigFormat>(), Ok(ConfigFormat::Json));
        assert_eq!("yml".parse::<ConfigFormat>(), Ok(ConfigFormat::Yaml));
        assert!("ini".parse::<ConfigFormat>().is_err());
    }

    #[test]
    fn test_load_defaults_without_files() {
        let dir = TempDir::new().unwrap();
        let config = ConfigLoader::load_from_file(&dir.path().join("missing.toml")).unwrap();
        assert_eq!(config.version, "1.0");
        assert_eq!(config.pipeline.max_attempts, 3);
    }

    #[test]
    fn test_project_file_overrides_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "[pipeline]\nworker_count = 2\n\n[llm]\nmodel = \"gemini-1.5-pro\"\n",
        )
        .unwrap();

        let config = ConfigLoader::load_from_file(&path).unwrap();
        assert_eq!(config.pipeline.worker_count, 2);
        assert_eq!(config.pipeline.sub_batch_concurrency, 15);
        assert_eq!(config.llm.model, "gemini-1.5-pro");
    }

    #[test]
    fn test_invalid_file_fails_validation() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[pipeline]\nmax_attempts = 0\n").unwrap();

        assert!(ConfigLoader::load_from_file(&path).is_err());
    }

    #[test]
    fn test_env_override() {
        let dir = TempDir::new().unwrap();
        // SAFETY: no other test reads this variable
        unsafe {
            std::env::set_var("QUIZFORGE_PIPELINE__RETRY_DELAY_MS", "250");
        }
        let config = ConfigLoader::load_from_file(&dir.path().join("none.toml")).unwrap();
        unsafe {
            std::env::remove_var("QUIZFORGE_PIPELINE__RETRY_DELAY_MS");
        }
        assert_eq!(config.pipeline.retry_delay_ms, 250);
    }

    #[test]
    fn test_render_omits_secrets() {
        let mut config = Config::default();
        config.llm.api_key = Some("sk-hidden".to_string());
        for format in [ConfigFormat::Toml, ConfigFormat::Json, ConfigFormat::Yaml] {
            let rendered = ConfigLoader::render(&config, format).unwrap();
            assert!(rendered.contains("gemini-2.0-flash"));
            assert!(!rendered.contains("sk-hidden"));
        }
    }

    #[test]
    fn test_starter_config_parses() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, ConfigLoader::default_project_config()).unwrap();
        let config = ConfigLoader::load_from_file(&path).unwrap();
        assert_eq!(config.llm.provider, "gemini");
    }
}
