//! Display State Types
//!
//! Types that represent the current display state for the TUI. They are
//! derived only from `ConductorMessage`s and used for rendering.
//!
//! Each panel keeps its own message list:
//!
//! - a draft appears only in its owner's panel and grows token by token
//! - when a draft completes, the owner's copy is finalized and the finished
//!   message is inserted into the peer's panel, ordered by id
//! - a discarded draft disappears from the owner's panel

use duet_conductor::{
    display_time, ConductorMessage, MessageId, NotifyLevel, PanelFlags, ParticipantConfig,
    ParticipantId, TurnSnapshot,
};

/// A rendered conversation message
#[derive(Clone, Debug, PartialEq)]
pub struct DisplayMessage {
    /// Unique message ID (also the order key)
    pub id: MessageId,
    /// Who wrote this message
    pub participant: ParticipantId,
    /// The message content
    pub content: String,
    /// Creation time (Unix ms)
    pub timestamp: u64,
    /// Whether this message is still being streamed
    pub streaming: bool,
}

impl DisplayMessage {
    /// Create an empty draft
    pub fn draft(id: MessageId, participant: ParticipantId, timestamp: u64) -> Self {
        Self {
            id,
            participant,
            content: String::new(),
            timestamp,
            streaming: true,
        }
    }

    /// Append token to a draft
    pub fn append(&mut self, text: &str) {
        self.content.push_str(text);
    }

    /// Mark the draft as complete
    pub fn complete(&mut self, final_content: String) {
        self.content = final_content;
        self.streaming = false;
    }

    /// `HH:MM:SS` label
    pub fn time_label(&self) -> String {
        display_time(self.timestamp)
    }
}

/// Everything one column shows
#[derive(Clone, Debug)]
pub struct PanelState {
    /// Owner of this panel
    pub participant: ParticipantId,
    /// Messages visible in this panel, ordered by id
    pub messages: Vec<DisplayMessage>,
    /// Transient indicators
    pub flags: PanelFlags,
    /// Current configuration
    pub config: ParticipantConfig,
}

impl PanelState {
    /// Create an empty panel
    pub fn new(participant: ParticipantId) -> Self {
        Self {
            participant,
            messages: Vec::new(),
            flags: PanelFlags::default(),
            config: ParticipantConfig::default(),
        }
    }

    fn find_mut(&mut self, id: MessageId) -> Option<&mut DisplayMessage> {
        self.messages.iter_mut().find(|m| m.id == id)
    }

    /// Insert keeping id order; an id already present is replaced
    fn insert_ordered(&mut self, message: DisplayMessage) {
        match self.messages.binary_search_by_key(&message.id, |m| m.id) {
            Ok(idx) => self.messages[idx] = message,
            Err(idx) => self.messages.insert(idx, message),
        }
    }

    fn remove(&mut self, id: MessageId) {
        self.messages.retain(|m| m.id != id);
    }

    /// Whether this panel shows a draft
    pub fn is_streaming(&self) -> bool {
        self.messages.iter().any(|m| m.streaming)
    }
}

/// A notification to display
#[derive(Clone, Debug, PartialEq)]
pub struct DisplayNotification {
    /// Notification level
    pub level: NotifyLevel,
    /// Optional title
    pub title: Option<String>,
    /// Message content
    pub message: String,
}

impl DisplayNotification {
    /// One-line form for the status bar
    pub fn line(&self) -> String {
        match self.title {
            Some(ref title) => format!("[{}] {}: {}", self.level.tag(), title, self.message),
            None => format!("[{}] {}", self.level.tag(), self.message),
        }
    }
}

/// The full display state for the TUI
#[derive(Debug)]
pub struct DisplayState {
    /// Both columns, indexed by `ParticipantId::index`
    pub panels: [PanelState; 2],
    /// Turn pointer as last reported
    pub turn: TurnSnapshot,
    /// Latest notification (if any)
    pub notification: Option<DisplayNotification>,
    /// Whether the Conductor asked the surface to close
    pub quit: bool,
    /// Goodbye message to show on exit
    pub goodbye: Option<String>,
}

impl Default for DisplayState {
    fn default() -> Self {
        Self {
            panels: [
                PanelState::new(ParticipantId::One),
                PanelState::new(ParticipantId::Two),
            ],
            turn: TurnSnapshot::default(),
            notification: None,
            quit: false,
            goodbye: None,
        }
    }
}

impl DisplayState {
    /// Create a new display state
    pub fn new() -> Self {
        Self::default()
    }

    /// Panel of one participant
    pub fn panel(&self, participant: ParticipantId) -> &PanelState {
        &self.panels[participant.index()]
    }

    fn panel_mut(&mut self, participant: ParticipantId) -> &mut PanelState {
        &mut self.panels[participant.index()]
    }

    /// Apply a `ConductorMessage` to update display state
    pub fn apply_message(&mut self, msg: ConductorMessage) {
        match msg {
            ConductorMessage::MessageStarted {
                participant,
                message_id,
                timestamp,
            } => {
                self.panel_mut(participant)
                    .insert_ordered(DisplayMessage::draft(message_id, participant, timestamp));
            }
            ConductorMessage::Token {
                participant,
                message_id,
                text,
            } => {
                if let Some(msg) = self.panel_mut(participant).find_mut(message_id) {
                    msg.append(&text);
                }
            }
            ConductorMessage::StreamEnd {
                participant,
                message_id,
                final_content,
            } => {
                let finished = {
                    let panel = self.panel_mut(participant);
                    match panel.find_mut(message_id) {
                        Some(msg) => {
                            msg.complete(final_content);
                            msg.clone()
                        }
                        None => {
                            let mut msg = DisplayMessage::draft(message_id, participant, 0);
                            msg.complete(final_content);
                            panel.insert_ordered(msg.clone());
                            msg
                        }
                    }
                };
                self.panel_mut(participant.peer()).insert_ordered(finished);
            }
            ConductorMessage::MessageDiscarded {
                participant,
                message_id,
            } => {
                self.panel_mut(participant).remove(message_id);
                self.panel_mut(participant.peer()).remove(message_id);
            }

            ConductorMessage::Panel { participant, flags } => {
                self.panel_mut(participant).flags = flags;
            }
            ConductorMessage::Turn { turn } => {
                self.turn = turn;
            }
            ConductorMessage::Config {
                participant,
                config,
            } => {
                self.panel_mut(participant).config = config;
            }
            ConductorMessage::Notify {
                level,
                title,
                message,
            } => {
                self.notification = Some(DisplayNotification {
                    level,
                    title,
                    message,
                });
            }
            ConductorMessage::Reset => {
                for panel in &mut self.panels {
                    panel.messages.clear();
                }
                self.notification = None;
            }
            ConductorMessage::Quit { message } => {
                self.quit = true;
                self.goodbye = message;
            }
        }
    }

    /// Show a notification raised by the surface itself
    pub fn notify(&mut self, level: NotifyLevel, message: impl Into<String>) {
        self.notification = Some(DisplayNotification {
            level,
            title: None,
            message: message.into(),
        });
    }

    /// Whether `participant` may send right now
    ///
    /// While a cycle runs, only the participant whose turn it is may send.
    pub fn can_send(&self, participant: ParticipantId) -> bool {
        if self.panel(participant).flags.generating {
            return false;
        }
        !self.turn.running || self.turn.current == Some(participant)
    }

    /// Short description of the cycle for the status bar
    pub fn turn_label(&self) -> String {
        match (self.turn.running, self.turn.current) {
            (true, Some(p)) => format!("turn {} - {p} to speak", self.turn.counter),
            (true, None) => format!("turn {}", self.turn.counter),
            (false, _) if self.turn.counter > 0 => format!("paused at turn {}", self.turn.counter),
            (false, _) => "idle".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn started(participant: ParticipantId, id: u64) -> ConductorMessage {
        ConductorMessage::MessageStarted {
            participant,
            message_id: MessageId(id),
            timestamp: id,
        }
    }

    fn token(participant: ParticipantId, id: u64, text: &str) -> ConductorMessage {
        ConductorMessage::Token {
            participant,
            message_id: MessageId(id),
            text: text.to_string(),
        }
    }

    #[test]
    fn test_draft_only_in_owner_panel() {
        let mut state = DisplayState::new();
        state.apply_message(started(ParticipantId::One, 10));
        state.apply_message(token(ParticipantId::One, 10, "H"));
        state.apply_message(token(ParticipantId::One, 10, "i"));

        let own = state.panel(ParticipantId::One);
        assert_eq!(own.messages.len(), 1);
        assert_eq!(own.messages[0].content, "Hi");
        assert!(own.is_streaming());
        assert!(state.panel(ParticipantId::Two).messages.is_empty());
    }

    #[test]
    fn test_stream_end_reaches_peer_in_id_order() {
        let mut state = DisplayState::new();
        state.apply_message(started(ParticipantId::Two, 5));
        state.apply_message(ConductorMessage::StreamEnd {
            participant: ParticipantId::Two,
            message_id: MessageId(5),
            final_content: "earlier".to_string(),
        });
        state.apply_message(started(ParticipantId::One, 9));
        state.apply_message(ConductorMessage::StreamEnd {
            participant: ParticipantId::One,
            message_id: MessageId(9),
            final_content: "later".to_string(),
        });

        for p in ParticipantId::ALL {
            let contents: Vec<&str> = state
                .panel(p)
                .messages
                .iter()
                .map(|m| m.content.as_str())
                .collect();
            assert_eq!(contents, vec!["earlier", "later"]);
            assert!(!state.panel(p).is_streaming());
        }
    }

    #[test]
    fn test_discard_removes_draft() {
        let mut state = DisplayState::new();
        state.apply_message(started(ParticipantId::One, 3));
        state.apply_message(ConductorMessage::MessageDiscarded {
            participant: ParticipantId::One,
            message_id: MessageId(3),
        });
        assert!(state.panel(ParticipantId::One).messages.is_empty());
    }

    #[test]
    fn test_reset_clears_both_panels() {
        let mut state = DisplayState::new();
        state.apply_message(started(ParticipantId::One, 1));
        state.notify(NotifyLevel::Info, "hello");
        state.apply_message(ConductorMessage::Reset);
        assert!(state.panels.iter().all(|p| p.messages.is_empty()));
        assert_eq!(state.notification, None);
    }

    #[test]
    fn test_can_send_follows_turn() {
        let mut state = DisplayState::new();
        assert!(state.can_send(ParticipantId::Two));

        state.apply_message(ConductorMessage::Turn {
            turn: TurnSnapshot {
                current: Some(ParticipantId::One),
                counter: 1,
                running: true,
            },
        });
        assert!(state.can_send(ParticipantId::One));
        assert!(!state.can_send(ParticipantId::Two));
        assert_eq!(state.turn_label(), "turn 1 - Participant 1 to speak");
    }

    #[test]
    fn test_notification_line() {
        let note = DisplayNotification {
            level: NotifyLevel::Error,
            title: Some("Participant 2 (gpt-4o)".to_string()),
            message: "quota exceeded".to_string(),
        };
        assert_eq!(note.line(), "[error] Participant 2 (gpt-4o): quota exceeded");
    }
}
