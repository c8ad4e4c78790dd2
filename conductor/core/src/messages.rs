//! Conductor Messages
//!
//! Messages sent from the Conductor to UI surfaces. A surface rebuilds both
//! panels purely from this stream; it never reads Conductor state directly.
//!
//! # Visibility
//!
//! `Token` is addressed to the participant that owns the draft. A surface
//! shows it only in that participant's panel. The peer panel first learns
//! about the message through `StreamEnd`, which carries the final content.

use serde::{Deserialize, Serialize};

use crate::conversation::MessageId;
use crate::participant::{ParticipantConfig, ParticipantId};
use crate::turn::{PanelFlags, TurnSnapshot};

/// Messages from Conductor to UI Surface
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ConductorMessage {
    // ============================================
    // Conversation Messages
    // ============================================
    /// A placeholder was appended to a participant's log
    MessageStarted {
        /// Owner of the message
        participant: ParticipantId,
        /// Message id (also the display order key)
        message_id: MessageId,
        /// Creation time (Unix ms)
        timestamp: u64,
    },

    /// One revealed character of a draft
    Token {
        /// Owner of the draft
        participant: ParticipantId,
        /// Message this character belongs to
        message_id: MessageId,
        /// The revealed text
        text: String,
    },

    /// A draft was finalized and is now visible to both panels
    StreamEnd {
        /// Owner of the message
        participant: ParticipantId,
        /// Message that completed
        message_id: MessageId,
        /// Final content
        final_content: String,
    },

    /// A draft was removed (empty result, failure or reset)
    MessageDiscarded {
        /// Owner of the draft
        participant: ParticipantId,
        /// Removed message
        message_id: MessageId,
    },

    // ============================================
    // State Messages
    // ============================================
    /// Transient flags of one panel changed
    Panel {
        /// Which panel
        participant: ParticipantId,
        /// New flags
        flags: PanelFlags,
    },

    /// Turn pointer, counter or running state changed
    Turn {
        /// New turn state
        turn: TurnSnapshot,
    },

    /// A participant's configuration changed
    Config {
        /// Which participant
        participant: ParticipantId,
        /// New configuration
        config: ParticipantConfig,
    },

    /// Show a notification
    Notify {
        /// Notification level
        level: NotifyLevel,
        /// Optional title
        title: Option<String>,
        /// Notification message
        message: String,
    },

    /// Both logs were cleared
    Reset,

    // ============================================
    // Lifecycle
    // ============================================
    /// The surface should shut down
    Quit {
        /// Optional goodbye message
        message: Option<String>,
    },
}

/// Notification levels
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotifyLevel {
    /// Informational
    Info,
    /// Warning
    Warning,
    /// Error
    Error,
}

impl NotifyLevel {
    /// Short tag for status lines
    #[must_use]
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warn",
            Self::Error => "error",
        }
    }
}
