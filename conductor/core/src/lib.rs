//! Duet Conductor - Headless Orchestration for Two-Model Dialogues
//!
//! This crate drives a turn-based conversation between two independently
//! configured language models. It is independent of any UI framework: a
//! surface sends [`SurfaceEvent`]s up and renders the [`ConductorMessage`]s
//! it receives.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         UI Surface                           │
//! │        ┌──────────────────┐      ┌──────────────────┐        │
//! │        │  Participant 1   │      │  Participant 2   │        │
//! │        └──────────────────┘      └──────────────────┘        │
//! │                SurfaceEvent (up) │ ConductorMessage (down)   │
//! └──────────────────────────────────┼───────────────────────────┘
//!                                    │
//! ┌──────────────────────────────────┼───────────────────────────┐
//! │                         CONDUCTOR CORE                       │
//! │  ┌──────────────┐  ┌──────────────┐  ┌────────────────────┐  │
//! │  │  Turn State  │  │   History    │  │  Backend (HTTP) +  │  │
//! │  │  + two logs  │  │  Formatter   │  │  Provider Registry │  │
//! │  └──────────────┘  └──────────────┘  └────────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Key Types
//!
//! - [`Conductor`]: owns both participants, their logs and the turn pointer
//! - [`ConductorMessage`]: messages sent from the Conductor to surfaces
//! - [`SurfaceEvent`]: events sent from surfaces to the Conductor
//! - [`HttpBackend`]: the generation gateway client
//!
//! # Quick Start
//!
//! ```ignore
//! use duet_conductor::{Conductor, HttpBackend, ParticipantId, SurfaceEvent};
//! use tokio::sync::mpsc;
//!
//! let config = duet_conductor::load_config()?;
//! let (tx, mut rx) = mpsc::unbounded_channel();
//! let backend = HttpBackend::from_settings(&config.backend);
//! let mut conductor = Conductor::new(backend, config.conductor, tx);
//!
//! conductor.handle_event(SurfaceEvent::Autostart {
//!     topic: "the future of AI".into(),
//!     first: ParticipantId::One,
//! })?;
//!
//! loop {
//!     conductor.poll().await;
//!     while let Ok(msg) = rx.try_recv() {
//!         // Render message to UI
//!     }
//! }
//! ```
//!
//! # No TUI Dependencies
//!
//! This crate has **zero** dependencies on ratatui, crossterm, or any other
//! UI framework.

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod backend;
pub mod conductor;
pub mod config;
pub mod conversation;
pub mod events;
pub mod history;
pub mod messages;
pub mod participant;
pub mod streaming;
pub mod turn;

// Re-exports for convenience
pub use backend::{
    BackendSettings, GenerationError, HistoryEntry, HttpBackend, LlmBackend, LlmRequest,
    LlmResponse, ProviderRegistry, ProviderSpec, Role, StreamingToken,
};
pub use conductor::{Conductor, ConductorConfig};
pub use config::{
    default_config_path, load_config, load_config_from_path, ConfigError, ConfigOverrides,
    ConfigSource, DuetConfig, DuetToml,
};
pub use conversation::{
    display_time, Conversation, ConversationLog, Message, MessageId, MessageKind,
};
pub use events::SurfaceEvent;
pub use history::{build_history, topic_seed};
pub use messages::{ConductorMessage, NotifyLevel};
pub use participant::{ParticipantConfig, ParticipantId};
pub use streaming::{Pacer, StreamingRegistry};
pub use turn::{PanelFlags, TurnError, TurnPolicy, TurnSnapshot, TurnState};
