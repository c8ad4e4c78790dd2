//! TOML Configuration File Support
//!
//! Configuration is read from `~/.config/duet/duet.toml`.
//!
//! # Configuration Priority
//!
//! Configuration values are loaded with the following priority (highest first):
//! 1. CLI arguments ([`ConfigOverrides`])
//! 2. Environment variables
//! 3. TOML configuration file
//! 4. Default values
//!
//! # Example Configuration
//!
//! ```toml
//! models = ["llama3.2", "gpt-4o-mini", "claude-3-5-haiku-latest"]
//!
//! [backend]
//! base_url = "http://localhost:3001"
//! timeout_secs = 120
//!
//! [conversation]
//! topic = "the future of AI"
//! first = 1
//! turn_policy = "exclusive"
//! auto_advance = false
//!
//! [participant_one]
//! model = "gpt-4o-mini"
//! temperature = 0.9
//!
//! [participant_two]
//! model = "claude-3-5-haiku-latest"
//! system_prompt = "You are a careful skeptic."
//!
//! [[providers]]
//! name = "together"
//! prefixes = ["together/"]
//! strip_prefix = "together/"
//! credential_env = "TOGETHER_API_KEY"
//! requires_credential = true
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::backend::{BackendSettings, ProviderSpec};
use crate::conductor::ConductorConfig;
use crate::participant::{ParticipantConfig, ParticipantId};
use crate::turn::TurnPolicy;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file at {path}: {source}")]
    ReadError {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse TOML config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

// =============================================================================
// Configuration Source Tracking
// =============================================================================

/// Tracks where a configuration value came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Value from command-line argument
    Cli,
    /// Value from environment variable
    Env,
    /// Value from TOML configuration file
    File,
    /// Default value
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI"),
            Self::Env => write!(f, "environment"),
            Self::File => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

// =============================================================================
// TOML Configuration Structures
// =============================================================================

/// Backend section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendToml {
    /// Gateway base URL
    pub base_url: Option<String>,

    /// Request timeout in seconds
    pub timeout_secs: Option<u64>,
}

/// Conversation section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationToml {
    /// Conversation topic
    pub topic: Option<String>,

    /// First speaker (1 or 2)
    pub first: Option<u8>,

    /// `exclusive` or `lenient`
    pub turn_policy: Option<String>,

    /// Schedule the peer's turn after each completion
    pub auto_advance: Option<bool>,

    /// Pre-response delay in milliseconds
    pub thinking_delay_ms: Option<u64>,

    /// Delay between revealed characters in milliseconds
    pub reveal_delay_ms: Option<u64>,

    /// Delay before scheduled turns in milliseconds
    pub settle_delay_ms: Option<u64>,

    /// Entries per side fed back into prompts
    pub context_window: Option<usize>,
}

/// Participant section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ParticipantToml {
    /// Model id
    pub model: Option<String>,

    /// Sampling temperature
    pub temperature: Option<f32>,

    /// Maximum output length
    pub max_tokens: Option<u32>,

    /// System instruction
    pub system_prompt: Option<String>,
}

/// Top-level TOML configuration structure
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DuetToml {
    /// Models offered when cycling
    pub models: Option<Vec<String>>,

    /// Backend section
    pub backend: BackendToml,

    /// Conversation section
    pub conversation: ConversationToml,

    /// Left participant
    pub participant_one: ParticipantToml,

    /// Right participant
    pub participant_two: ParticipantToml,

    /// Extra providers, matched before the built-in ones
    pub providers: Vec<ProviderSpec>,
}

// =============================================================================
// Main Configuration Struct
// =============================================================================

/// Models offered for cycling when none are configured
pub const DEFAULT_MODELS: &[&str] = &[
    "llama3.2",
    "gpt-4o-mini",
    "claude-3-5-haiku-latest",
    "gemini-1.5-flash",
    "mistral-small-latest",
];

/// Everything the application needs to start
#[derive(Clone, Debug)]
pub struct DuetConfig {
    /// How to reach the gateway
    pub backend: BackendSettings,

    /// Orchestrator settings
    pub conductor: ConductorConfig,

    /// Models offered when cycling
    pub models: Vec<String>,

    /// Path to the config file that was loaded (if any)
    pub config_file_path: Option<PathBuf>,

    /// Source of configuration values
    source: ConfigSource,
}

impl Default for DuetConfig {
    fn default() -> Self {
        Self {
            backend: BackendSettings::default(),
            conductor: ConductorConfig::default(),
            models: DEFAULT_MODELS.iter().map(|m| (*m).to_string()).collect(),
            config_file_path: None,
            source: ConfigSource::Default,
        }
    }
}

impl DuetConfig {
    /// Create a new configuration with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the primary source of this configuration
    #[must_use]
    pub fn source(&self) -> ConfigSource {
        self.source
    }

    /// Configuration of one participant
    #[must_use]
    pub fn participant(&self, participant: ParticipantId) -> &ParticipantConfig {
        &self.conductor.participants[participant.index()]
    }

    fn participant_mut(&mut self, participant: ParticipantId) -> &mut ParticipantConfig {
        &mut self.conductor.participants[participant.index()]
    }
}

// =============================================================================
// Configuration Loading
// =============================================================================

/// Get the default configuration file path
///
/// Returns `$XDG_CONFIG_HOME/duet/duet.toml` or
/// `~/.config/duet/duet.toml` if `XDG_CONFIG_HOME` is not set.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("duet").join("duet.toml"))
}

/// Load configuration from the default path, defaults and environment
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be read, parsed
/// or validated. A missing config file is not an error.
pub fn load_config() -> Result<DuetConfig, ConfigError> {
    load_config_from_path(default_config_path())
}

/// Load configuration from a specific path
///
/// # Errors
///
/// Returns an error if the specified config file cannot be read, parsed or
/// validated.
pub fn load_config_from_path(path: Option<PathBuf>) -> Result<DuetConfig, ConfigError> {
    let mut config = DuetConfig::default();

    if let Some(ref config_path) = path {
        if config_path.exists() {
            let toml_content =
                std::fs::read_to_string(config_path).map_err(|e| ConfigError::ReadError {
                    path: config_path.clone(),
                    source: e,
                })?;

            let toml_config: DuetToml = toml::from_str(&toml_content)?;
            apply_toml_config(&mut config, toml_config)?;
            config.config_file_path = Some(config_path.clone());
            config.source = ConfigSource::File;

            tracing::info!(
                path = %config_path.display(),
                "Loaded configuration from file"
            );
        } else {
            tracing::debug!(
                path = %config_path.display(),
                "Config file not found, using defaults"
            );
        }
    }

    apply_env_config(&mut config);

    Ok(config)
}

fn parse_first(value: u8) -> Result<ParticipantId, ConfigError> {
    ParticipantId::from_number(&value.to_string()).ok_or_else(|| {
        ConfigError::ValidationError(format!("first speaker must be 1 or 2, got {value}"))
    })
}

fn apply_participant_toml(config: &mut ParticipantConfig, toml: ParticipantToml) {
    if let Some(model) = toml.model {
        config.model = model;
    }
    if let Some(temperature) = toml.temperature {
        config.set_temperature(temperature);
    }
    if let Some(max_tokens) = toml.max_tokens {
        config.set_max_tokens(max_tokens);
    }
    if let Some(system_prompt) = toml.system_prompt {
        config.system_prompt = system_prompt;
    }
}

/// Apply TOML configuration values to the config struct
fn apply_toml_config(config: &mut DuetConfig, toml: DuetToml) -> Result<(), ConfigError> {
    // Backend
    if let Some(base_url) = toml.backend.base_url {
        config.backend.base_url = base_url;
    }
    if let Some(secs) = toml.backend.timeout_secs {
        config.backend.timeout = Duration::from_secs(secs);
    }
    for provider in toml.providers.into_iter().rev() {
        if provider.name.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "provider entries need a name".to_string(),
            ));
        }
        config.backend.providers.register(provider);
    }

    // Conversation
    let conversation = toml.conversation;
    if conversation.topic.is_some() {
        config.conductor.topic = conversation.topic;
    }
    if let Some(first) = conversation.first {
        config.conductor.first_speaker = parse_first(first)?;
    }
    if let Some(policy) = conversation.turn_policy {
        config.conductor.turn_policy = policy
            .parse::<TurnPolicy>()
            .map_err(ConfigError::ValidationError)?;
    }
    if let Some(enabled) = conversation.auto_advance {
        config.conductor.auto_advance = enabled;
    }
    if let Some(ms) = conversation.thinking_delay_ms {
        config.conductor.thinking_delay = Duration::from_millis(ms);
    }
    if let Some(ms) = conversation.reveal_delay_ms {
        config.conductor.reveal_delay = Duration::from_millis(ms);
    }
    if let Some(ms) = conversation.settle_delay_ms {
        config.conductor.settle_delay = Duration::from_millis(ms);
    }
    if let Some(window) = conversation.context_window {
        if window == 0 {
            return Err(ConfigError::ValidationError(
                "context_window must be at least 1".to_string(),
            ));
        }
        config.conductor.context_window = window;
    }

    // Participants
    apply_participant_toml(config.participant_mut(ParticipantId::One), toml.participant_one);
    apply_participant_toml(config.participant_mut(ParticipantId::Two), toml.participant_two);

    // Models
    if let Some(models) = toml.models {
        let models: Vec<String> = models
            .into_iter()
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .collect();
        if models.is_empty() {
            return Err(ConfigError::ValidationError(
                "models list must not be empty".to_string(),
            ));
        }
        config.models = models;
    }

    Ok(())
}

/// Apply environment variable overrides to the config
fn apply_env_config(config: &mut DuetConfig) {
    if let Ok(url) = std::env::var("DUET_BACKEND_URL") {
        config.backend.base_url = url;
        config.source = ConfigSource::Env;
    }
    if let Ok(timeout) = std::env::var("DUET_BACKEND_TIMEOUT_SECS") {
        if let Ok(secs) = timeout.parse::<u64>() {
            config.backend.timeout = Duration::from_secs(secs);
            config.source = ConfigSource::Env;
        }
    }
    if let Ok(topic) = std::env::var("DUET_TOPIC") {
        config.conductor.topic = Some(topic);
        config.source = ConfigSource::Env;
    }
    if let Ok(first) = std::env::var("DUET_FIRST") {
        if let Some(id) = ParticipantId::from_number(&first) {
            config.conductor.first_speaker = id;
            config.source = ConfigSource::Env;
        }
    }
    if let Ok(model) = std::env::var("DUET_MODEL_A") {
        config.participant_mut(ParticipantId::One).model = model;
        config.source = ConfigSource::Env;
    }
    if let Ok(model) = std::env::var("DUET_MODEL_B") {
        config.participant_mut(ParticipantId::Two).model = model;
        config.source = ConfigSource::Env;
    }
    if let Ok(policy) = std::env::var("DUET_TURN_POLICY") {
        match policy.parse::<TurnPolicy>() {
            Ok(policy) => {
                config.conductor.turn_policy = policy;
                config.source = ConfigSource::Env;
            }
            Err(e) => tracing::warn!(error = %e, "Ignoring DUET_TURN_POLICY"),
        }
    }
    if let Ok(enabled) = std::env::var("DUET_AUTO_ADVANCE") {
        config.conductor.auto_advance = enabled == "1" || enabled.to_lowercase() == "true";
        config.source = ConfigSource::Env;
    }
    if let Ok(delay) = std::env::var("DUET_THINKING_DELAY_MS") {
        if let Ok(ms) = delay.parse::<u64>() {
            config.conductor.thinking_delay = Duration::from_millis(ms);
            config.source = ConfigSource::Env;
        }
    }
}

// =============================================================================
// CLI Override Support
// =============================================================================

/// Builder for applying CLI overrides to configuration
///
/// Use this after [`load_config`] to apply command-line argument overrides.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// Gateway base URL override
    pub backend_url: Option<String>,

    /// Topic override
    pub topic: Option<String>,

    /// First speaker override
    pub first: Option<ParticipantId>,

    /// Left participant model override
    pub model_a: Option<String>,

    /// Right participant model override
    pub model_b: Option<String>,

    /// Auto-advance override
    pub auto_advance: Option<bool>,
}

impl ConfigOverrides {
    /// Create a new empty set of overrides
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set gateway URL override
    #[must_use]
    pub fn with_backend_url(mut self, url: String) -> Self {
        self.backend_url = Some(url);
        self
    }

    /// Set topic override
    #[must_use]
    pub fn with_topic(mut self, topic: String) -> Self {
        self.topic = Some(topic);
        self
    }

    /// Set first speaker override
    #[must_use]
    pub fn with_first(mut self, first: ParticipantId) -> Self {
        self.first = Some(first);
        self
    }

    /// Set left participant model override
    #[must_use]
    pub fn with_model_a(mut self, model: String) -> Self {
        self.model_a = Some(model);
        self
    }

    /// Set right participant model override
    #[must_use]
    pub fn with_model_b(mut self, model: String) -> Self {
        self.model_b = Some(model);
        self
    }

    /// Set auto-advance override
    #[must_use]
    pub fn with_auto_advance(mut self, enabled: bool) -> Self {
        self.auto_advance = Some(enabled);
        self
    }

    /// Whether any override is set
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.backend_url.is_none()
            && self.topic.is_none()
            && self.first.is_none()
            && self.model_a.is_none()
            && self.model_b.is_none()
            && self.auto_advance.is_none()
    }

    /// Apply overrides to a configuration
    pub fn apply(&self, config: &mut DuetConfig) {
        if self.is_empty() {
            return;
        }

        if let Some(ref url) = self.backend_url {
            config.backend.base_url.clone_from(url);
        }
        if self.topic.is_some() {
            config.conductor.topic.clone_from(&self.topic);
        }
        if let Some(first) = self.first {
            config.conductor.first_speaker = first;
        }
        if let Some(ref model) = self.model_a {
            config.participant_mut(ParticipantId::One).model.clone_from(model);
        }
        if let Some(ref model) = self.model_b {
            config.participant_mut(ParticipantId::Two).model.clone_from(model);
        }
        if let Some(enabled) = self.auto_advance {
            config.conductor.auto_advance = enabled;
        }

        config.source = ConfigSource::Cli;
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::Mutex;

    use tempfile::NamedTempFile;

    use super::*;

    /// Environment variables are process-wide; tests touching them serialize here
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn clear_config_env_vars() {
        for var in [
            "DUET_BACKEND_URL",
            "DUET_BACKEND_TIMEOUT_SECS",
            "DUET_TOPIC",
            "DUET_FIRST",
            "DUET_MODEL_A",
            "DUET_MODEL_B",
            "DUET_TURN_POLICY",
            "DUET_AUTO_ADVANCE",
            "DUET_THINKING_DELAY_MS",
        ] {
            std::env::remove_var(var);
        }
    }

    fn write_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_config() {
        let config = DuetConfig::default();

        assert_eq!(config.backend.base_url, "http://localhost:3001");
        assert_eq!(config.conductor.thinking_delay, Duration::from_millis(2000));
        assert_eq!(config.conductor.reveal_delay, Duration::from_millis(15));
        assert_eq!(config.conductor.settle_delay, Duration::from_millis(500));
        assert_eq!(config.conductor.context_window, 20);
        assert_eq!(config.conductor.turn_policy, TurnPolicy::Exclusive);
        assert_eq!(config.models.len(), DEFAULT_MODELS.len());
        assert_eq!(config.source(), ConfigSource::Default);
    }

    #[test]
    fn test_default_config_path() {
        if let Some(p) = default_config_path() {
            assert!(p.ends_with("duet/duet.toml"));
        }
    }

    #[test]
    fn test_parse_full_toml() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        clear_config_env_vars();

        let file = write_config(
            r#"
models = ["gpt-4o-mini", "claude-3-5-haiku-latest"]

[backend]
base_url = "http://gateway:9000"
timeout_secs = 30

[conversation]
topic = "tide pools"
first = 2
turn_policy = "lenient"
auto_advance = true
thinking_delay_ms = 100

[participant_one]
model = "gpt-4o-mini"
temperature = 5.0

[participant_two]
model = "claude-3-5-haiku-latest"
max_tokens = 256
system_prompt = "Be a skeptic."

[[providers]]
name = "together"
prefixes = ["together/"]
strip_prefix = "together/"
credential_env = "TOGETHER_API_KEY"
requires_credential = true
"#,
        );

        let config = load_config_from_path(Some(file.path().to_path_buf())).unwrap();

        assert_eq!(config.backend.base_url, "http://gateway:9000");
        assert_eq!(config.backend.timeout, Duration::from_secs(30));
        assert_eq!(config.conductor.topic.as_deref(), Some("tide pools"));
        assert_eq!(config.conductor.first_speaker, ParticipantId::Two);
        assert_eq!(config.conductor.turn_policy, TurnPolicy::Lenient);
        assert!(config.conductor.auto_advance);
        assert_eq!(config.conductor.thinking_delay, Duration::from_millis(100));
        assert_eq!(config.participant(ParticipantId::One).model, "gpt-4o-mini");
        assert!((config.participant(ParticipantId::One).temperature - 2.0).abs() < f32::EPSILON);
        assert_eq!(config.participant(ParticipantId::Two).max_tokens, 256);
        assert_eq!(
            config.participant(ParticipantId::Two).system_prompt,
            "Be a skeptic."
        );
        assert_eq!(config.models, vec!["gpt-4o-mini", "claude-3-5-haiku-latest"]);
        assert_eq!(
            config.backend.providers.lookup("together/llama").map(|p| p.name.as_str()),
            Some("together")
        );
        assert_eq!(config.source(), ConfigSource::File);
        assert_eq!(config.config_file_path.as_deref(), Some(file.path()));
    }

    #[test]
    fn test_parse_empty_toml() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        clear_config_env_vars();

        let file = write_config("");
        let config = load_config_from_path(Some(file.path().to_path_buf())).unwrap();

        assert_eq!(config.backend.base_url, "http://localhost:3001");
        assert_eq!(config.participant(ParticipantId::One).model, "llama3.2");
        assert_eq!(config.source(), ConfigSource::File);
    }

    #[test]
    fn test_missing_file_graceful() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        clear_config_env_vars();

        let config =
            load_config_from_path(Some(PathBuf::from("/nonexistent/duet/duet.toml"))).unwrap();
        assert_eq!(config.source(), ConfigSource::Default);
        assert!(config.config_file_path.is_none());
    }

    #[test]
    fn test_malformed_toml_error() {
        let file = write_config("[backend\nbase_url = ");
        let result = load_config_from_path(Some(file.path().to_path_buf()));
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_invalid_values_rejected() {
        for content in [
            "[conversation]\nfirst = 3",
            "[conversation]\nturn_policy = \"both\"",
            "[conversation]\ncontext_window = 0",
            "models = []",
        ] {
            let file = write_config(content);
            let result = load_config_from_path(Some(file.path().to_path_buf()));
            assert!(
                matches!(result, Err(ConfigError::ValidationError(_))),
                "expected validation error for {content:?}"
            );
        }
    }

    #[test]
    fn test_env_overrides_file() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        clear_config_env_vars();

        let file = write_config(
            r#"
[backend]
base_url = "http://from-file:1"

[participant_two]
model = "from-file"
"#,
        );

        std::env::set_var("DUET_BACKEND_URL", "http://from-env:2");
        std::env::set_var("DUET_MODEL_B", "from-env");
        std::env::set_var("DUET_TURN_POLICY", "lenient");

        let config = load_config_from_path(Some(file.path().to_path_buf())).unwrap();
        clear_config_env_vars();

        assert_eq!(config.backend.base_url, "http://from-env:2");
        assert_eq!(config.participant(ParticipantId::Two).model, "from-env");
        assert_eq!(config.conductor.turn_policy, TurnPolicy::Lenient);
        assert_eq!(config.source(), ConfigSource::Env);
    }

    #[test]
    fn test_cli_overrides_env() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        clear_config_env_vars();

        std::env::set_var("DUET_TOPIC", "from env");
        let mut config = load_config_from_path(None).unwrap();
        clear_config_env_vars();

        ConfigOverrides::new()
            .with_topic("from cli".to_string())
            .with_first(ParticipantId::Two)
            .with_model_a("gpt-4o".to_string())
            .with_auto_advance(true)
            .apply(&mut config);

        assert_eq!(config.conductor.topic.as_deref(), Some("from cli"));
        assert_eq!(config.conductor.first_speaker, ParticipantId::Two);
        assert_eq!(config.participant(ParticipantId::One).model, "gpt-4o");
        assert!(config.conductor.auto_advance);
        assert_eq!(config.source(), ConfigSource::Cli);
    }

    #[test]
    fn test_empty_overrides_keep_source() {
        let mut config = DuetConfig::default();
        let overrides = ConfigOverrides::new();
        assert!(overrides.is_empty());
        overrides.apply(&mut config);
        assert_eq!(config.source(), ConfigSource::Default);
    }

    #[test]
    fn test_config_source_display() {
        assert_eq!(ConfigSource::Cli.to_string(), "CLI");
        assert_eq!(ConfigSource::File.to_string(), "config file");
    }
}
