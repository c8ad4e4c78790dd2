//! Generation Backend Integration
//!
//! The Transport Adapter: one generation call against a configured backend,
//! either as a single blocking result or as an incremental token stream.
//!
//! # Available Backends
//!
//! - **HTTP**: the `/llm/generate` + `/llm/stream` gateway contract, with a
//!   transparent fallback to blocking mode when streaming is unavailable
//!
//! Model ids are resolved through a [`ProviderRegistry`] that decides
//! endpoint, credential and model-name normalization per provider.
//!
//! # Usage
//!
//! ```ignore
//! use duet_conductor::backend::{HttpBackend, LlmBackend, LlmRequest};
//!
//! let config = duet_conductor::load_config()?;
//! let backend = HttpBackend::from_settings(&config.backend);
//! let request = LlmRequest::new("gpt-4o-mini").with_temperature(0.9);
//! let rx = backend.send_streaming(&request).await?;
//! ```

mod error;
mod http;
mod providers;
mod traits;

pub use error::GenerationError;
pub use http::{BackendSettings, HttpBackend, DEFAULT_BASE_URL};
pub use providers::{ProviderRegistry, ProviderSpec, ResolvedModel};
pub use traits::{HistoryEntry, LlmBackend, LlmRequest, LlmResponse, Role, StreamingToken};
