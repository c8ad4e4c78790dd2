//! Surface Events
//!
//! Events sent from UI surfaces to the Conductor. Surfaces report what the
//! user did; the Conductor decides what it means.

use serde::{Deserialize, Serialize};

use crate::participant::ParticipantId;

/// Events from UI Surface to Conductor
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum SurfaceEvent {
    // ============================================
    // Configuration
    // ============================================
    /// A participant's model was changed
    ModelChanged {
        /// Which participant
        participant: ParticipantId,
        /// New model id
        model: String,
    },

    /// A participant's temperature was changed
    TemperatureChanged {
        /// Which participant
        participant: ParticipantId,
        /// New temperature (clamped by the Conductor)
        temperature: f32,
    },

    /// A participant's max output length was changed
    MaxTokensChanged {
        /// Which participant
        participant: ParticipantId,
        /// New limit (clamped by the Conductor)
        max_tokens: u32,
    },

    /// A participant's system instruction was changed
    SystemPromptChanged {
        /// Which participant
        participant: ParticipantId,
        /// New instruction (may be empty)
        system_prompt: String,
    },

    // ============================================
    // Turn Control
    // ============================================
    /// The send control of a panel was pressed
    SendMessage {
        /// Panel whose participant should respond
        participant: ParticipantId,
    },

    /// Start a cycle
    Start {
        /// First speaker (`None` = configured default)
        first: Option<ParticipantId>,
    },

    /// Pause the cycle
    Pause,

    /// Clear everything
    Reset,

    /// Kick off the conversation once on launch
    Autostart {
        /// Conversation topic
        topic: String,
        /// First speaker
        first: ParticipantId,
    },

    // ============================================
    // Lifecycle
    // ============================================
    /// User requested quit
    QuitRequested,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = SurfaceEvent::Autostart {
            topic: "tides".to_string(),
            first: ParticipantId::One,
        };
        let json = serde_json::to_string(&event).unwrap();
        let parsed: SurfaceEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, event);
    }
}
