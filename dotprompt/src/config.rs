//! dp configuration types and loading

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::dotprompt::DotpromptOptions;
use crate::loader::PartialLoader;
use crate::types::{JsonSchema, ToolDefinition};

/// Main dp configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(rename = "log-level", skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,

    /// Model used when a prompt names none
    #[serde(rename = "default-model", skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,

    /// Base config per model name
    #[serde(rename = "model-configs")]
    pub model_configs: HashMap<String, Value>,

    /// Directories searched for partials, in order
    #[serde(rename = "partials-dirs")]
    pub partials_dirs: Vec<PathBuf>,

    /// Named schemas available to Picoschema references
    pub schemas: HashMap<String, JsonSchema>,

    /// Tool definitions available to prompts
    pub tools: Vec<ToolDefinition>,
}

impl Config {
    /// Load configuration with fallback chain
    ///
    /// 1. Explicit path (errors if it cannot be loaded)
    /// 2. `./.dotprompt.yml`
    /// 3. `~/.config/dotprompt/dotprompt.yml`
    /// 4. Defaults
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        for candidate in Self::candidates() {
            if !candidate.exists() {
                continue;
            }
            match Self::load_from_file(&candidate) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", candidate.display(), e);
                }
            }
        }

        // No config file found, use defaults
        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Read just the log level, before logging is set up.
    ///
    /// Follows the same chain as [`Config::load`] but never fails.
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        let paths = match config_path {
            Some(path) => vec![path.clone()],
            None => Self::candidates(),
        };
        paths
            .iter()
            .filter(|path| path.exists())
            .find_map(|path| fs::read_to_string(path).ok())
            .and_then(|content| serde_yaml::from_str::<Self>(&content).ok())
            .and_then(|config| config.log_level)
    }

    /// Project-local config, then user config
    fn candidates() -> Vec<PathBuf> {
        let mut candidates = vec![PathBuf::from(".dotprompt.yml")];
        if let Some(config_dir) = dirs::config_dir() {
            candidates.push(config_dir.join("dotprompt").join("dotprompt.yml"));
        }
        candidates
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Options for a `Dotprompt` instance; `extra_partials_dirs` are searched
    /// before the configured directories
    pub fn dotprompt_options(&self, extra_partials_dirs: &[PathBuf]) -> DotpromptOptions {
        tracing::debug!(
            extra_partials_dirs = extra_partials_dirs.len(),
            "Config::dotprompt_options: called"
        );
        let mut options = DotpromptOptions {
            default_model: self.default_model.clone(),
            model_configs: self.model_configs.clone(),
            schemas: self.schemas.clone(),
            ..Default::default()
        };
        for tool in &self.tools {
            options = options.with_tool(tool.clone());
        }

        let dirs: Vec<&PathBuf> = extra_partials_dirs.iter().chain(&self.partials_dirs).collect();
        if !dirs.is_empty() {
            options = options.with_partial_resolver(PartialLoader::new(dirs));
        }
        options
    }
}
