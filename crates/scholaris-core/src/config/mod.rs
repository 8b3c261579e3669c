//! Configuration management with file persistence

use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;

/// Scholaris configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub tutor: TutorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(skip)]
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub model: String,
    /// Requested output dimensions, for models that support truncation
    pub dimensions: Option<usize>,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TutorConfig {
    /// Output budget for standard chat models
    pub max_output_tokens: usize,
    /// Output budget for reasoning models, which spend hidden tokens first
    pub reasoning_max_output_tokens: usize,
    pub request_timeout_secs: u64,
    /// How many knowledge snippets go into a prompt
    pub knowledge_limit: usize,
    /// Language the tutor answers in
    pub language: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            temperature: 0.7,
            timeout_secs: 60,
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "text-embedding-3-small".to_string(),
            dimensions: None,
            timeout_secs: 15,
        }
    }
}

impl Default for TutorConfig {
    fn default() -> Self {
        Self {
            max_output_tokens: 1024,
            reasoning_max_output_tokens: 8192,
            request_timeout_secs: 45,
            knowledge_limit: 5,
            language: "English".to_string(),
        }
    }
}

impl LlmConfig {
    pub fn resolved_api_key(&self) -> anyhow::Result<Option<String>> {
        self.enforce_env_only()?;

        Ok(env::var("SCHOLARIS_API_KEY")
            .or_else(|_| env::var("OPENAI_API_KEY"))
            .ok()
            .filter(|key| !key.trim().is_empty()))
    }

    pub fn redacted_api_key(&self) -> anyhow::Result<Option<String>> {
        self.resolved_api_key().map(|opt| {
            opt.map(|key| {
                if key.len() <= 4 {
                    "***".to_string()
                } else {
                    let suffix = &key[key.len() - 4..];
                    format!("***{}", suffix)
                }
            })
        })
    }

    pub fn enforce_env_only(&self) -> anyhow::Result<()> {
        if self.api_key.is_some() {
            return Err(anyhow!(
                "Provider API keys must be provided via environment variables, not stored in configuration"
            ));
        }
        Ok(())
    }
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> anyhow::Result<PathBuf> {
        let dir = if let Ok(custom_dir) = env::var("SCHOLARIS_CONFIG_DIR") {
            PathBuf::from(custom_dir)
        } else {
            dirs::config_dir()
                .ok_or_else(|| anyhow!("Could not determine config directory"))?
                .join("scholaris")
        };
        Ok(dir)
    }

    /// Get the config file path
    pub fn config_path() -> anyhow::Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load configuration from file, or use defaults if it doesn't exist
    pub fn load() -> anyhow::Result<Self> {
        let path = Self::config_path()?;

        if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            let config: Config = toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
            config.validate()?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self) -> anyhow::Result<()> {
        self.validate()?;

        let dir = Self::config_dir()?;
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create config directory: {}", dir.display()))?;

        let path = Self::config_path()?;
        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(&path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        self.llm.enforce_env_only()?;

        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(anyhow!("Temperature must be between 0.0 and 2.0"));
        }
        if self.llm.timeout_secs == 0
            || self.embedding.timeout_secs == 0
            || self.tutor.request_timeout_secs == 0
        {
            return Err(anyhow!("Timeouts must be greater than zero"));
        }
        if self.tutor.max_output_tokens == 0 || self.tutor.reasoning_max_output_tokens == 0 {
            return Err(anyhow!("Output token budgets must be greater than zero"));
        }
        Ok(())
    }

    /// Get a configuration value by key
    pub fn get(&self, key: &str) -> anyhow::Result<String> {
        match key {
            "llm.base_url" => Ok(self.llm.base_url.clone()),
            "llm.model" => Ok(self.llm.model.clone()),
            "llm.temperature" => Ok(self.llm.temperature.to_string()),
            "llm.timeout_secs" => Ok(self.llm.timeout_secs.to_string()),

            "embedding.model" => Ok(self.embedding.model.clone()),
            "embedding.dimensions" => Ok(self
                .embedding
                .dimensions
                .map(|d| d.to_string())
                .unwrap_or_else(|| "(model default)".to_string())),
            "embedding.timeout_secs" => Ok(self.embedding.timeout_secs.to_string()),

            "tutor.max_output_tokens" => Ok(self.tutor.max_output_tokens.to_string()),
            "tutor.reasoning_max_output_tokens" => {
                Ok(self.tutor.reasoning_max_output_tokens.to_string())
            }
            "tutor.request_timeout_secs" => Ok(self.tutor.request_timeout_secs.to_string()),
            "tutor.knowledge_limit" => Ok(self.tutor.knowledge_limit.to_string()),
            "tutor.language" => Ok(self.tutor.language.clone()),

            "llm.api_key" | "api_key" => match self.llm.redacted_api_key()? {
                Some(redacted) => Ok(redacted),
                None => Ok(
                    "(not set - use SCHOLARIS_API_KEY or OPENAI_API_KEY env var)".to_string(),
                ),
            },

            _ => Err(anyhow!(
                "Unknown configuration key: {}. Use `scholaris config list` to see available keys.",
                key
            )),
        }
    }

    /// Set a configuration value by key
    pub fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        match key {
            "llm.base_url" => {
                let url = value.trim().trim_end_matches('/');
                if !(url.starts_with("http://") || url.starts_with("https://")) {
                    return Err(anyhow!("Base URL must start with http:// or https://"));
                }
                self.llm.base_url = url.to_string();
            }
            "llm.model" => {
                self.llm.model = non_empty(key, value)?;
            }
            "llm.temperature" => {
                let temp: f32 = value
                    .parse()
                    .with_context(|| format!("Invalid temperature value: {}", value))?;
                if !(0.0..=2.0).contains(&temp) {
                    return Err(anyhow!("Temperature must be between 0.0 and 2.0"));
                }
                self.llm.temperature = temp;
            }
            "llm.timeout_secs" => {
                self.llm.timeout_secs = positive(key, value)?;
            }

            "embedding.model" => {
                self.embedding.model = non_empty(key, value)?;
            }
            "embedding.dimensions" => {
                self.embedding.dimensions = if value.trim().is_empty() || value == "default" {
                    None
                } else {
                    Some(positive(key, value)?)
                };
            }
            "embedding.timeout_secs" => {
                self.embedding.timeout_secs = positive(key, value)?;
            }

            "tutor.max_output_tokens" => {
                self.tutor.max_output_tokens = positive(key, value)?;
            }
            "tutor.reasoning_max_output_tokens" => {
                self.tutor.reasoning_max_output_tokens = positive(key, value)?;
            }
            "tutor.request_timeout_secs" => {
                self.tutor.request_timeout_secs = positive(key, value)?;
            }
            "tutor.knowledge_limit" => {
                self.tutor.knowledge_limit = value
                    .parse()
                    .with_context(|| format!("Invalid tutor.knowledge_limit value: {}", value))?;
            }
            "tutor.language" => {
                self.tutor.language = non_empty(key, value)?;
            }

            // API key cannot be set via config
            "llm.api_key" | "api_key" => {
                return Err(anyhow!(
                    "API keys cannot be stored in configuration for security. \
                     Set the SCHOLARIS_API_KEY or OPENAI_API_KEY environment variable instead."
                ));
            }

            _ => {
                return Err(anyhow!(
                    "Unknown configuration key: {}. Use `scholaris config list` to see available keys.",
                    key
                ));
            }
        }
        Ok(())
    }

    /// List all configuration keys and their values
    pub fn list(&self) -> anyhow::Result<Vec<(String, String)>> {
        let keys = [
            "llm.base_url",
            "llm.model",
            "llm.temperature",
            "llm.timeout_secs",
            "llm.api_key",
            "embedding.model",
            "embedding.dimensions",
            "embedding.timeout_secs",
            "tutor.max_output_tokens",
            "tutor.reasoning_max_output_tokens",
            "tutor.request_timeout_secs",
            "tutor.knowledge_limit",
            "tutor.language",
        ];

        keys.into_iter()
            .map(|key| {
                let value = self.get(key)?;
                Ok((key.to_string(), value))
            })
            .collect()
    }

    /// Reset configuration to defaults
    pub fn reset() -> anyhow::Result<()> {
        let path = Self::config_path()?;
        if path.exists() {
            fs::remove_file(&path)
                .with_context(|| format!("Failed to remove config file: {}", path.display()))?;
        }
        Ok(())
    }
}

fn non_empty(key: &str, value: &str) -> anyhow::Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(anyhow!("{} cannot be empty", key));
    }
    Ok(value.to_string())
}

fn positive<T>(key: &str, value: &str) -> anyhow::Result<T>
where
    T: std::str::FromStr + PartialOrd + Default,
{
    let parsed: T = value
        .trim()
        .parse()
        .map_err(|_| anyhow!("Invalid {} value: {}", key, value))?;
    if parsed <= T::default() {
        return Err(anyhow!("{} must be greater than zero", key));
    }
    Ok(parsed)
}
