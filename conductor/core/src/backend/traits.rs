//! Generation Backend Traits
//!
//! Trait definitions for generation backends. This abstraction lets the
//! Conductor drive any provider without changing orchestration logic.
//!
//! # Design Philosophy
//!
//! The LlmBackend trait provides two modes:
//! - Blocking: one request, one [`LlmResponse`], failures folded into the
//!   response
//! - Incremental: a channel of [`StreamingToken`]s that ends with exactly one
//!   `Complete` or `Error`
//!
//! Implementations handle provider-specific details (wire format, auth, etc.)

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tokio::sync::mpsc;

use super::error::GenerationError;
use crate::participant::ParticipantConfig;

/// Speaker role in a prompt history
///
/// External spellings are normalized on ingestion: `user`/`human` become
/// [`Role::User`], `assistant`/`ai` become [`Role::Assistant`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Role {
    /// The other side of the conversation
    User,
    /// The responding model's own prior turns
    Assistant,
}

impl Role {
    /// Normalize an external role spelling
    #[must_use]
    pub fn from_wire(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "user" | "human" => Some(Self::User),
            "assistant" | "ai" => Some(Self::Assistant),
            _ => None,
        }
    }

    /// Canonical wire spelling
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Role {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Role::from_wire(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown role: {raw}")))
    }
}

/// One role-tagged entry of a prompt history
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Who said it
    pub role: Role,
    /// What was said
    pub content: String,
}

impl HistoryEntry {
    /// Create a user-role entry
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Create an assistant-role entry
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Token stream events from generation backends
#[derive(Clone, Debug, PartialEq)]
pub enum StreamingToken {
    /// A fragment of the response
    Token(String),
    /// Response completed successfully
    Complete {
        /// The complete message as seen by the backend
        message: String,
    },
    /// Generation failed; the message is user-presentable
    Error(String),
}

impl StreamingToken {
    /// Whether this event ends the stream
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete { .. } | Self::Error(_))
    }
}

/// One generation request
#[derive(Clone, Debug, PartialEq)]
pub struct LlmRequest {
    /// Model to use
    pub model: String,
    /// Sampling temperature
    pub temperature: f32,
    /// Maximum output length
    pub max_tokens: u32,
    /// System instruction (may be empty)
    pub system_prompt: String,
    /// Role-tagged prompt history
    pub history: Vec<HistoryEntry>,
}

impl Default for LlmRequest {
    fn default() -> Self {
        Self {
            model: String::new(),
            temperature: crate::participant::DEFAULT_TEMPERATURE,
            max_tokens: crate::participant::DEFAULT_MAX_TOKENS,
            system_prompt: String::new(),
            history: Vec::new(),
        }
    }
}

impl LlmRequest {
    /// Create a new request for a model
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }

    /// Build a request from a participant's frozen configuration
    #[must_use]
    pub fn from_participant(config: &ParticipantConfig, history: Vec<HistoryEntry>) -> Self {
        Self {
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            system_prompt: config.system_prompt.clone(),
            history,
        }
    }

    /// Set temperature
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set max tokens
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set system prompt
    #[must_use]
    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = system_prompt.into();
        self
    }

    /// Set history
    #[must_use]
    pub fn with_history(mut self, history: Vec<HistoryEntry>) -> Self {
        self.history = history;
        self
    }
}

/// Result of a blocking generation call
#[derive(Clone, Debug, PartialEq)]
pub struct LlmResponse {
    /// The response text (empty on failure)
    pub content: String,
    /// Whether the call succeeded
    pub success: bool,
    /// Failure description
    pub error: Option<String>,
    /// Call duration in milliseconds
    pub duration_ms: Option<u64>,
}

impl LlmResponse {
    /// A successful response
    pub fn success(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            success: true,
            error: None,
            duration_ms: None,
        }
    }

    /// A failed response
    #[must_use]
    pub fn failure(error: &GenerationError) -> Self {
        Self {
            content: String::new(),
            success: false,
            error: Some(error.to_string()),
            duration_ms: None,
        }
    }
}

/// Generation backend trait
///
/// Implement this trait to add support for different transports.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Get the backend name (e.g., "HTTP gateway")
    fn name(&self) -> &str;

    /// Send a request and wait for the complete response
    ///
    /// Never fails: every error is reported through `success = false`.
    async fn generate(&self, request: &LlmRequest) -> LlmResponse;

    /// Send a request and get a streaming response
    ///
    /// Returns a channel receiver that will receive fragments as they
    /// arrive, followed by exactly one `Complete` or `Error`. An `Err` is
    /// only returned when the request cannot be issued at all.
    async fn send_streaming(
        &self,
        request: &LlmRequest,
    ) -> Result<mpsc::Receiver<StreamingToken>, GenerationError>;
}
