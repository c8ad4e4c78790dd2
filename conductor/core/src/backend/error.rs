//! Generation errors
//!
//! Every failure on the generation path is one of these. They never cross
//! the adapter boundary as faults: streaming calls turn them into
//! [`StreamingToken::Error`](super::StreamingToken::Error) and blocking calls
//! into a failed [`LlmResponse`](super::LlmResponse).

use thiserror::Error;

/// Why a generation attempt failed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    /// Missing credential, unknown model or similar setup problem
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The call succeeded but produced no usable text
    #[error("Received empty response")]
    EmptyResult,

    /// Network or protocol failure, or a malformed backend response
    #[error("Transport error: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for GenerationError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}
