//! Copile configuration
//!
//! Read from `copile.toml` when present. Every field has a default, so a
//! partial file only needs the keys it changes.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{CopileError, Result};
use crate::oracle::ModelTier;

/// Default config file name, looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "copile.toml";

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CopileConfig {
    /// Directory holding one `<name>.co.py` file per generated callable
    pub cache_dir: PathBuf,

    /// Replacement for the built-in module denylist
    pub module_denylist: Option<PathBuf>,

    /// Replacement for the built-in function denylist
    pub function_denylist: Option<PathBuf>,

    /// Generation attempts before giving up on malformed candidates
    pub max_attempts: usize,

    /// Model tiers and the size guard
    pub models: ModelsConfig,

    /// Oracle endpoint
    pub oracle: OracleSettings,

    /// Python interpreter used to load and invoke generated code
    pub python: String,

    /// Formatter commands run on a cache file after every write; the file path is appended
    pub formatters: Vec<Vec<String>>,
}

impl Default for CopileConfig {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from("copilations"),
            module_denylist: None,
            function_denylist: None,
            max_attempts: 2,
            models: ModelsConfig::default(),
            oracle: OracleSettings::default(),
            python: "python3".to_string(),
            formatters: vec![
                vec!["isort".to_string(), "--quiet".to_string()],
                vec!["black".to_string(), "--quiet".to_string()],
            ],
        }
    }
}

impl CopileConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the cache directory
    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = dir.into();
        self
    }

    /// Set the attempt bound
    pub fn with_max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Set the interpreter
    pub fn with_python(mut self, python: impl Into<String>) -> Self {
        self.python = python.into();
        self
    }

    /// Set the formatter commands
    pub fn with_formatters(mut self, formatters: Vec<Vec<String>>) -> Self {
        self.formatters = formatters;
        self
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| CopileError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if it exists, defaults otherwise
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::from_file(path)
        } else {
            tracing::debug!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file
    pub fn to_file(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| CopileError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(CopileError::Config("max_attempts must be at least 1".into()));
        }
        if self.models.chars_per_token <= 0.0 {
            return Err(CopileError::Config("chars_per_token must be positive".into()));
        }
        if !(self.models.safety_margin > 0.0 && self.models.safety_margin <= 1.0) {
            return Err(CopileError::Config(
                "safety_margin must be in (0.0, 1.0]".into(),
            ));
        }
        if self.formatters.iter().any(|cmd| cmd.is_empty()) {
            return Err(CopileError::Config("formatter command is empty".into()));
        }
        Ok(())
    }
}

/// A named model and its context budget
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSpec {
    /// Model identifier sent to the service
    pub name: String,
    /// Context size in tokens
    pub max_tokens: usize,
}

impl ModelSpec {
    /// Create a model spec
    pub fn new(name: impl Into<String>, max_tokens: usize) -> Self {
        Self {
            name: name.into(),
            max_tokens,
        }
    }
}

/// Model tiers and the character budget derived from them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    /// Cheap tier, used for the clarity check
    pub fast: ModelSpec,
    /// Highest-capability tier, used for generation and safety review
    pub best: ModelSpec,
    /// Nominal characters per token
    pub chars_per_token: f64,
    /// Fraction of the nominal budget actually used
    pub safety_margin: f64,
    /// Sampling temperature for every request
    pub temperature: f64,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            fast: ModelSpec::new("gpt-4o-mini", 128_000),
            best: ModelSpec::new("gpt-4o", 128_000),
            chars_per_token: 4.0,
            safety_margin: 0.9,
            temperature: 0.0,
        }
    }
}

impl ModelsConfig {
    /// Model behind a tier
    pub fn model(&self, tier: ModelTier) -> &ModelSpec {
        match tier {
            ModelTier::Fast => &self.fast,
            ModelTier::Best => &self.best,
        }
    }

    /// Longest text, in characters, that may be sent to `tier`
    pub fn max_characters(&self, tier: ModelTier) -> usize {
        (self.model(tier).max_tokens as f64 * self.safety_margin * self.chars_per_token) as usize
    }
}

/// Oracle endpoint settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleSettings {
    /// Base URL of an OpenAI-compatible API; `OPENAI_BASE_URL` overrides it
    pub base_url: String,
    /// Environment variable holding the API key
    pub api_key_env: String,
    /// Dotenv file read at start-up and written by `set-key`
    pub env_file: PathBuf,
}

impl Default for OracleSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            env_file: PathBuf::from(".env"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_budget() {
        let models = ModelsConfig::default();
        assert_eq!(models.max_characters(ModelTier::Best), 460_800);
        assert_eq!(models.max_characters(ModelTier::Fast), 460_800);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("copile.toml");
        std::fs::write(
            &path,
            "cache_dir = \"generated\"\n\n[models.fast]\nname = \"small\"\nmax_tokens = 16000\n",
        )
        .unwrap();

        let config = CopileConfig::from_file(&path).unwrap();
        assert_eq!(config.cache_dir, PathBuf::from("generated"));
        assert_eq!(config.models.fast, ModelSpec::new("small", 16_000));
        assert_eq!(config.models.best.name, "gpt-4o");
        assert_eq!(config.max_attempts, 2);
        assert_eq!(config.models.max_characters(ModelTier::Fast), 57_600);
    }

    #[test]
    fn test_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("copile.toml");
        let config = CopileConfig::new().with_max_attempts(3).with_formatters(vec![]);
        config.to_file(&path).unwrap();

        let loaded = CopileConfig::load_or_default(&path).unwrap();
        assert_eq!(loaded.max_attempts, 3);
        assert!(loaded.formatters.is_empty());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = CopileConfig::load_or_default(Path::new("/nonexistent/copile.toml")).unwrap();
        assert_eq!(config.cache_dir, PathBuf::from("copilations"));
    }

    #[test]
    fn test_validate_rejects_zero_attempts() {
        let config = CopileConfig::new().with_max_attempts(0);
        assert!(matches!(config.validate(), Err(CopileError::Config(_))));
    }
}
