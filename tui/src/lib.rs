//! Duet TUI - Split-screen terminal surface for two-participant dialogues
//!
//! Each participant gets a column showing its settings, its own drafts as
//! they stream, and the peer's finished messages.
//!
//! # Architecture
//!
//! - **ConductorClient**: embeds the Conductor, turns callbacks into events
//! - **DisplayState**: per-panel view derived from Conductor messages
//! - **App**: event loop, key bindings and rendering
//! - **Theme**: participant accents and status colors

pub mod app;
pub mod conductor_client;
pub mod display;
pub mod theme;

pub use app::{Action, App};
pub use conductor_client::ConductorClient;
pub use display::{DisplayMessage, DisplayNotification, DisplayState, PanelState};
