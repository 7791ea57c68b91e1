//! Configuration management for Redline.
//!
//! Handles loading and saving configuration from TOML files.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::retry::RetryConfig;
use crate::guidance::GuidanceKind;
use crate::pipeline::AdvanceMode;

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// AI provider settings
    pub ai: AiConfig,

    /// Revision pipeline settings
    pub pipeline: PipelineConfig,

    /// Diff and merge settings
    pub diff: DiffConfig,
}

/// AI provider settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    /// AI provider (claude, openai, ollama)
    pub provider: String,

    /// Model override for the selected provider
    pub model: Option<String>,

    /// Maximum tokens to generate per document
    pub max_tokens: u32,

    /// Sampling temperature
    pub temperature: f32,

    /// OpenAI-compatible endpoint settings
    pub openai: OpenAIConfig,

    /// Ollama-specific settings
    pub ollama: OllamaConfig,
}

/// OpenAI-compatible endpoint configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAIConfig {
    /// API base URL
    pub base_url: String,
}

/// Ollama configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaConfig {
    /// Ollama server URL
    pub base_url: String,

    /// Model to use
    pub model: String,
}

/// Revision pipeline settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Whether to pause for review between documents
    pub advance_mode: AdvanceMode,

    /// Guidance used when none is given on the command line
    pub guidance: GuidanceKind,

    /// Dimension gaps at or below this magnitude are left out of the brief
    pub min_gap: f64,

    /// Retry policy for opening provider streams
    pub retry: RetryConfig,
}

/// Diff and merge settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiffConfig {
    /// Word-overlap ratio above which two paragraphs are aligned together
    pub threshold: f64,

    /// Compute word-level spans inside changed rows
    pub word_diff: bool,

    /// Colourise terminal output
    pub color: bool,

    /// Number of merge operations that can be reverted
    pub max_history: usize,
}

impl Config {
    /// Name of the per-directory config file.
    pub const LOCAL_FILE: &'static str = ".redline.toml";

    /// Load configuration from the default location.
    ///
    /// Looks for config in:
    /// 1. `.redline.toml` in current directory
    /// 2. `~/.config/redline/config.toml`
    /// 3. Falls back to defaults
    pub fn load() -> anyhow::Result<Self> {
        let local_config = PathBuf::from(Self::LOCAL_FILE);
        if local_config.exists() {
            return Self::load_from_file(&local_config);
        }

        if let Some(global_config) = Self::global_path() {
            if global_config.exists() {
                return Self::load_from_file(&global_config);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        tracing::debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Save configuration to the global config file.
    pub fn save(&self) -> anyhow::Result<PathBuf> {
        let path = Self::global_path()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        self.save_to(&path)?;
        Ok(path)
    }

    /// Save configuration to a specific file, creating parent directories.
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the config directory path.
    pub fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("redline"))
    }

    /// Get the global config file path.
    pub fn global_path() -> Option<PathBuf> {
        Self::config_dir().map(|d| d.join("config.toml"))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ai: AiConfig::default(),
            pipeline: PipelineConfig::default(),
            diff: DiffConfig::default(),
        }
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            provider: "claude".to_string(),
            model: None,
            max_tokens: 8192,
            temperature: 0.7,
            openai: OpenAIConfig::default(),
            ollama: OllamaConfig::default(),
        }
    }
}

impl Default for OpenAIConfig {
    fn default() -> Self {
        Self { base_url: "https://api.openai.com/v1".to_string() }
    }
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: std::env::var("OLLAMA_HOST")
                .unwrap_or_else(|_| "http://localhost:11434".to_string()),
            model: std::env::var("OLLAMA_MODEL").unwrap_or_else(|_| "llama3.2".to_string()),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            advance_mode: AdvanceMode::Auto,
            guidance: GuidanceKind::Both,
            min_gap: 0.0,
            retry: RetryConfig::api(),
        }
    }
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self { threshold: 0.4, word_diff: true, color: true, max_history: 100 }
    }
}
