//! Streaming Infrastructure
//!
//! Helpers shared by every incremental generation:
//!
//! - [`StreamingRegistry`]: which messages are still being filled, so a panel
//!   can withhold its peer's unfinished draft.
//! - [`Pacer`]: re-emits backend fragments one character at a time with a
//!   fixed delay, giving true streams and replayed blocking results the same
//!   reveal cadence.
//!
//! ```text
//! backend stream ──► Pacer ──► Conductor::poll() ──► placeholder message
//!  (fragments)       (chars)        │
//!                                   └──► ConductorMessage::Token
//! ```

mod pacer;
mod registry;

pub use pacer::{split_units, Pacer};
pub use registry::StreamingRegistry;

// Re-export StreamingToken from backend for convenience
pub use crate::backend::StreamingToken;
