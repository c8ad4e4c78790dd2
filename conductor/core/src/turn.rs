//! Turn State
//!
//! Whose turn it is, how many turns have completed, and the transient
//! per-panel flags shown while a turn is in flight.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::participant::ParticipantId;

/// Turn pointer and cycle state
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnState {
    /// Participant expected to speak next (`None` = no active cycle)
    pub current: Option<ParticipantId>,
    /// Turn counter, 1 when a cycle starts, +1 per non-empty completion
    pub counter: u32,
    /// Whether a cycle is running
    pub running: bool,
}

impl TurnState {
    /// Begin a cycle with `first` to speak
    pub fn start(&mut self, first: ParticipantId) {
        self.running = true;
        self.current = Some(first);
        self.counter = 1;
    }

    /// Run again with `participant` up, keeping the counter of a paused cycle
    pub fn resume(&mut self, participant: ParticipantId) {
        self.running = true;
        self.current = Some(participant);
        if self.counter == 0 {
            self.counter = 1;
        }
    }

    /// Stop the cycle without losing the counter
    pub fn pause(&mut self) {
        self.running = false;
        self.current = None;
    }

    /// Hand the turn to the peer of `finished`
    pub fn advance(&mut self, finished: ParticipantId) {
        self.current = Some(finished.peer());
        self.counter = self.counter.saturating_add(1);
    }

    /// Whether it is `participant`'s turn in a running cycle
    #[must_use]
    pub fn is_turn_of(&self, participant: ParticipantId) -> bool {
        self.running && self.current == Some(participant)
    }
}

/// Transient indicators of one panel
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelFlags {
    /// In the pre-response delay
    pub thinking: bool,
    /// The peer is producing visible output
    pub typing: bool,
    /// A generation for this participant is in flight
    pub generating: bool,
}

impl PanelFlags {
    /// Whether any indicator is set
    #[must_use]
    pub fn any(&self) -> bool {
        self.thinking || self.typing || self.generating
    }

    /// Short label for status lines
    #[must_use]
    pub fn label(&self) -> &'static str {
        if self.thinking {
            "thinking..."
        } else if self.generating {
            "responding..."
        } else if self.typing {
            "peer is typing..."
        } else {
            "idle"
        }
    }
}

/// How concurrent turn requests are arbitrated
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnPolicy {
    /// One generation at a time across both participants
    #[default]
    Exclusive,
    /// One generation at a time per participant
    Lenient,
}

impl std::str::FromStr for TurnPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "exclusive" => Ok(Self::Exclusive),
            "lenient" => Ok(Self::Lenient),
            other => Err(format!(
                "unknown turn policy '{other}' (expected 'exclusive' or 'lenient')"
            )),
        }
    }
}

/// Why a turn request was refused
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum TurnError {
    /// Another participant is generating
    #[error("{active} is still responding; wait for it to finish")]
    Busy {
        /// The participant holding the turn
        active: ParticipantId,
    },

    /// This participant is already generating
    #[error("{0} is already responding")]
    AlreadyGenerating(ParticipantId),
}

/// Snapshot of turn state sent to surfaces
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnSnapshot {
    /// Participant expected to speak next
    pub current: Option<ParticipantId>,
    /// Turn counter
    pub counter: u32,
    /// Whether a cycle is running
    pub running: bool,
}

impl From<TurnState> for TurnSnapshot {
    fn from(state: TurnState) -> Self {
        Self {
            current: state.current,
            counter: state.counter,
            running: state.running,
        }
    }
}
