//! Configuration: YAML config + env var overrides.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::types::LegacyDelayConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Port for cadence-web
    #[serde(default = "default_port")]
    pub port: u16,

    /// Remote chat service endpoint (cadence-tui live mode)
    #[serde(default)]
    pub chat_endpoint: Option<String>,

    /// Bot name sent with every chat request
    #[serde(default = "default_bot_name")]
    pub bot_name: String,

    /// Participant id sent with every chat request
    #[serde(default)]
    pub participant_id: Option<String>,

    /// Chat request timeout
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,

    /// Delay profile used to plan replies
    #[serde(default)]
    pub bot: DelayProfile,

    /// Resolved project root (set at load time, not serialized from YAML)
    #[serde(skip)]
    pub project_root: PathBuf,
}

fn default_port() -> u16 {
    8000
}
fn default_bot_name() -> String {
    "default".into()
}
fn default_request_timeout() -> u64 {
    60
}

/// Per-bot delay settings. Reading/writing fields are seconds or words per
/// minute; the legacy fields are milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DelayProfile {
    /// If false, replies are shown instantly
    #[serde(default = "default_true")]
    pub humanlike_delay: bool,

    /// If false, replies are sent as one chunk
    #[serde(default = "default_true")]
    pub chunk_messages: bool,

    #[serde(default = "default_reading_wpm")]
    pub reading_words_per_minute: f64,
    #[serde(default = "default_reading_jitter_min")]
    pub reading_jitter_min: f64,
    #[serde(default = "default_reading_jitter_max")]
    pub reading_jitter_max: f64,
    #[serde(default = "default_reading_thinking_min")]
    pub reading_thinking_min: f64,
    #[serde(default = "default_reading_thinking_max")]
    pub reading_thinking_max: f64,

    #[serde(default = "default_writing_wpm")]
    pub writing_words_per_minute: f64,
    #[serde(default = "default_writing_jitter_min")]
    pub writing_jitter_min: f64,
    #[serde(default = "default_writing_jitter_max")]
    pub writing_jitter_max: f64,
    #[serde(default = "default_writing_thinking_min")]
    pub writing_thinking_min: f64,
    #[serde(default = "default_writing_thinking_max")]
    pub writing_thinking_max: f64,

    /// Pause between segments
    #[serde(default = "default_intra_min")]
    pub intra_message_delay_min: f64,
    #[serde(default = "default_intra_max")]
    pub intra_message_delay_max: f64,

    /// Floor for the reading pause after backend compensation
    #[serde(default = "default_min_reading_delay")]
    pub min_reading_delay: f64,

    /// Fallbacks for payloads that only carry chunks
    #[serde(default)]
    pub legacy: LegacyDelayConfig,
}

fn default_true() -> bool {
    true
}
fn default_reading_wpm() -> f64 {
    250.0
}
fn default_reading_jitter_min() -> f64 {
    0.1
}
fn default_reading_jitter_max() -> f64 {
    0.3
}
fn default_reading_thinking_min() -> f64 {
    0.2
}
fn default_reading_thinking_max() -> f64 {
    0.5
}
fn default_writing_wpm() -> f64 {
    200.0
}
fn default_writing_jitter_min() -> f64 {
    0.05
}
fn default_writing_jitter_max() -> f64 {
    0.15
}
fn default_writing_thinking_min() -> f64 {
    0.1
}
fn default_writing_thinking_max() -> f64 {
    0.3
}
fn default_intra_min() -> f64 {
    0.1
}
fn default_intra_max() -> f64 {
    0.3
}
fn default_min_reading_delay() -> f64 {
    1.0
}

impl Default for DelayProfile {
    fn default() -> Self {
        Self {
            humanlike_delay: true,
            chunk_messages: true,
            reading_words_per_minute: default_reading_wpm(),
            reading_jitter_min: default_reading_jitter_min(),
            reading_jitter_max: default_reading_jitter_max(),
            reading_thinking_min: default_reading_thinking_min(),
            reading_thinking_max: default_reading_thinking_max(),
            writing_words_per_minute: default_writing_wpm(),
            writing_jitter_min: default_writing_jitter_min(),
            writing_jitter_max: default_writing_jitter_max(),
            writing_thinking_min: default_writing_thinking_min(),
            writing_thinking_max: default_writing_thinking_max(),
            intra_message_delay_min: default_intra_min(),
            intra_message_delay_max: default_intra_max(),
            min_reading_delay: default_min_reading_delay(),
            legacy: LegacyDelayConfig::default(),
        }
    }
}

impl Config {
    /// Load config from a YAML file with env var overrides.
    /// `config_path` is the path to config.yaml.
    pub fn load(config_path: &Path) -> Result<Self> {
        Self::load_with_env(config_path, env_var)
    }

    fn load_with_env(config_path: &Path, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let content = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config: {}", config_path.display()))?;

        let mut config: Config =
            serde_yaml::from_str(&content).context("Failed to parse config.yaml")?;

        config.project_root = config_path
            .parent()
            .unwrap_or(Path::new("."))
            .to_path_buf()
            .canonicalize()
            .unwrap_or_else(|_| {
                config_path
                    .parent()
                    .unwrap_or(Path::new("."))
                    .to_path_buf()
            });

        config.apply_env(env)?;
        config.validate()?;
        Ok(config)
    }

    /// Load config from the default location (project_root/config.yaml)
    pub fn load_from_dir(project_root: &Path) -> Result<Self> {
        let config_path = project_root.join("config.yaml");
        Self::load(&config_path)
    }

    /// Load project_root/config.yaml if it exists, otherwise defaults.
    /// Env var overrides apply either way.
    pub fn load_or_default(project_root: &Path) -> Result<Self> {
        Self::load_or_default_with_env(project_root, env_var)
    }

    fn load_or_default_with_env(
        project_root: &Path,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let config_path = project_root.join("config.yaml");
        if config_path.is_file() {
            return Self::load_with_env(&config_path, env);
        }
        let mut config = Config {
            project_root: project_root.to_path_buf(),
            ..Default::default()
        };
        config.apply_env(env)?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self, env: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(port) = env("CADENCE_PORT") {
            self.port = port
                .parse()
                .with_context(|| format!("CADENCE_PORT is not a port number: {}", port))?;
        }
        if let Some(url) = env("CADENCE_CHAT_ENDPOINT") {
            self.chat_endpoint = Some(url);
        }
        if let Some(name) = env("CADENCE_BOT_NAME") {
            self.bot_name = name;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        let bot = &self.bot;
        if bot.reading_words_per_minute <= 0.0 || bot.writing_words_per_minute <= 0.0 {
            anyhow::bail!("bot.reading_words_per_minute and bot.writing_words_per_minute must be positive");
        }
        if bot.min_reading_delay < 0.0 {
            anyhow::bail!("bot.min_reading_delay must not be negative");
        }
        if !bot.legacy.is_valid() {
            anyhow::bail!("bot.legacy delays must be between 0 and 86400000 ms");
        }
        Ok(())
    }
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: default_port(),
            chat_endpoint: None,
            bot_name: default_bot_name(),
            participant_id: None,
            request_timeout_seconds: default_request_timeout(),
            bot: DelayProfile::default(),
            project_root: PathBuf::new(),
        }
    }
}
