//! Participants
//!
//! A dialogue always has exactly two sides. Each side has its own model
//! configuration that the user may change at any time; the Conductor takes a
//! snapshot of it whenever a turn is requested.

use std::fmt;
use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

/// Allowed temperature values
pub const TEMPERATURE_RANGE: RangeInclusive<f32> = 0.0..=2.0;

/// Allowed maximum output lengths (tokens)
pub const MAX_TOKENS_RANGE: RangeInclusive<u32> = 16..=8192;

/// Default sampling temperature
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Default maximum output length
pub const DEFAULT_MAX_TOKENS: u32 = 500;

/// One of the two conversational sides
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ParticipantId {
    /// Left panel
    One,
    /// Right panel
    Two,
}

impl ParticipantId {
    /// Both participants, in panel order
    pub const ALL: [ParticipantId; 2] = [ParticipantId::One, ParticipantId::Two];

    /// The other side of the conversation
    #[must_use]
    pub fn peer(self) -> Self {
        match self {
            Self::One => Self::Two,
            Self::Two => Self::One,
        }
    }

    /// Array index for per-participant storage
    #[must_use]
    pub fn index(self) -> usize {
        match self {
            Self::One => 0,
            Self::Two => 1,
        }
    }

    /// Parse the user-facing number ("1" or "2")
    #[must_use]
    pub fn from_number(value: &str) -> Option<Self> {
        match value.trim() {
            "1" | "one" | "One" => Some(Self::One),
            "2" | "two" | "Two" => Some(Self::Two),
            _ => None,
        }
    }

    /// The user-facing number
    #[must_use]
    pub fn number(self) -> u8 {
        match self {
            Self::One => 1,
            Self::Two => 2,
        }
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Participant {}", self.number())
    }
}

/// Model configuration for one participant
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParticipantConfig {
    /// Model identifier (may carry a provider prefix, e.g. `openai/gpt-4o`)
    pub model: String,
    /// Sampling temperature
    pub temperature: f32,
    /// Maximum output length in tokens
    pub max_tokens: u32,
    /// System instruction (may be empty)
    pub system_prompt: String,
}

impl Default for ParticipantConfig {
    fn default() -> Self {
        Self {
            model: "llama3.2".to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            system_prompt: String::new(),
        }
    }
}

impl ParticipantConfig {
    /// Create a configuration for a model with default parameters
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }

    /// Set temperature (clamped)
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.set_temperature(temperature);
        self
    }

    /// Set max tokens (clamped)
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.set_max_tokens(max_tokens);
        self
    }

    /// Set system prompt
    #[must_use]
    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = system_prompt.into();
        self
    }

    /// Update the temperature, clamping into [`TEMPERATURE_RANGE`]
    pub fn set_temperature(&mut self, temperature: f32) {
        let temperature = if temperature.is_nan() {
            DEFAULT_TEMPERATURE
        } else {
            temperature
        };
        self.temperature = temperature.clamp(*TEMPERATURE_RANGE.start(), *TEMPERATURE_RANGE.end());
    }

    /// Update the max tokens, clamping into [`MAX_TOKENS_RANGE`]
    pub fn set_max_tokens(&mut self, max_tokens: u32) {
        self.max_tokens = max_tokens.clamp(*MAX_TOKENS_RANGE.start(), *MAX_TOKENS_RANGE.end());
    }
}

/// System instruction derived from the conversation topic
#[must_use]
pub fn topic_system_prompt(topic: &str, participant: ParticipantId) -> String {
    format!(
        "You are {participant} in a spoken-style dialogue with another AI about \"{topic}\". \
         Respond directly to what the other participant just said, add one new idea, \
         and keep each reply to a short paragraph."
    )
}
