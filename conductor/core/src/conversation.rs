//! Conversation Logs
//!
//! Each participant owns one append-only log. The only mutable entry is the
//! in-flight placeholder of a streaming turn, which either grows and is
//! finalized, or is removed when the turn yields nothing.
//!
//! Ordering across the two logs is defined by [`MessageId`], which is
//! derived from the creation time and strictly increasing, so merging both
//! logs for display is a sort by id.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{Local, TimeZone};
use serde::{Deserialize, Serialize};

use crate::participant::ParticipantId;
use crate::streaming::StreamingRegistry;

/// Message identifier, monotonic and time-derived
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageId(pub u64);

impl MessageId {
    /// Generate a new id: the current Unix time in milliseconds, bumped
    /// past the previous id when several are created in the same millisecond.
    pub fn new() -> Self {
        static LAST: AtomicU64 = AtomicU64::new(0);
        let now = now_ms();
        let previous = LAST
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last + 1))
            })
            .unwrap_or(now);
        Self(now.max(previous + 1))
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "msg_{}", self.0)
    }
}

/// What a stored message represents
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageKind {
    /// A generated turn
    #[default]
    Turn,
    /// A synthetic opening greeting, never fed back as conversation
    Greeting,
}

/// A message in a participant's log
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Unique, sortable id
    pub id: MessageId,
    /// Owning participant
    pub participant: ParticipantId,
    /// Text content
    pub content: String,
    /// Creation time (Unix timestamp ms)
    pub timestamp: u64,
    /// Turn or greeting
    pub kind: MessageKind,
    /// Whether the message is still being streamed
    pub streaming: bool,
}

impl Message {
    /// Create a finalized message
    pub fn new(participant: ParticipantId, content: impl Into<String>) -> Self {
        Self {
            id: MessageId::new(),
            participant,
            content: content.into(),
            timestamp: now_ms(),
            kind: MessageKind::Turn,
            streaming: false,
        }
    }

    /// Create an empty streaming placeholder
    pub fn placeholder(participant: ParticipantId) -> Self {
        Self {
            streaming: true,
            ..Self::new(participant, String::new())
        }
    }

    /// Create a greeting message
    pub fn greeting(participant: ParticipantId, content: impl Into<String>) -> Self {
        Self {
            kind: MessageKind::Greeting,
            ..Self::new(participant, content)
        }
    }

    /// Whether the content is empty or whitespace-only
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.content.trim().is_empty()
    }

    /// Local wall-clock time for display (`HH:MM:SS`)
    #[must_use]
    pub fn display_time(&self) -> String {
        display_time(self.timestamp)
    }
}

/// Format a Unix millisecond timestamp as local `HH:MM:SS`
///
/// Out-of-range values format as an empty string.
#[must_use]
pub fn display_time(timestamp: u64) -> String {
    i64::try_from(timestamp)
        .ok()
        .and_then(|ms| Local.timestamp_millis_opt(ms).single())
        .map(|t| t.format("%H:%M:%S").to_string())
        .unwrap_or_default()
}

/// Ordered messages of one participant
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ConversationLog {
    messages: Vec<Message>,
}

impl ConversationLog {
    /// Create an empty log
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All messages, in insertion order
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Number of messages
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the log is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Append a finalized message
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Look up a message
    #[must_use]
    pub fn get(&self, id: MessageId) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    /// Append text to a streaming message
    ///
    /// Returns false if the message is gone or already finalized.
    pub fn append(&mut self, id: MessageId, text: &str) -> bool {
        match self.messages.iter_mut().find(|m| m.id == id) {
            Some(msg) if msg.streaming => {
                msg.content.push_str(text);
                true
            }
            _ => false,
        }
    }

    /// Mark a streaming message as complete
    pub fn finalize(&mut self, id: MessageId) -> Option<&Message> {
        let msg = self.messages.iter_mut().find(|m| m.id == id)?;
        msg.streaming = false;
        Some(msg)
    }

    /// Remove a message (used for empty or failed turns)
    pub fn discard(&mut self, id: MessageId) -> Option<Message> {
        let idx = self.messages.iter().position(|m| m.id == id)?;
        Some(self.messages.remove(idx))
    }

    /// Remove everything
    pub fn clear(&mut self) {
        self.messages.clear();
    }
}

/// Both participants' logs
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Conversation {
    logs: [ConversationLog; 2],
}

impl Conversation {
    /// Create an empty conversation
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Log of one participant
    #[must_use]
    pub fn log(&self, participant: ParticipantId) -> &ConversationLog {
        &self.logs[participant.index()]
    }

    /// Mutable log of one participant
    pub fn log_mut(&mut self, participant: ParticipantId) -> &mut ConversationLog {
        &mut self.logs[participant.index()]
    }

    /// Start an empty streaming message for a participant
    pub fn start_streaming(&mut self, participant: ParticipantId) -> MessageId {
        let msg = Message::placeholder(participant);
        let id = msg.id;
        self.log_mut(participant).push(msg);
        id
    }

    /// Clear both logs
    pub fn clear(&mut self) {
        for log in &mut self.logs {
            log.clear();
        }
    }

    /// Messages visible from one participant's panel, ordered by id
    ///
    /// A panel always shows its own messages, drafts included, but shows a
    /// peer message only once it is no longer being streamed.
    #[must_use]
    pub fn panel_view(
        &self,
        viewer: ParticipantId,
        registry: &StreamingRegistry,
    ) -> Vec<&Message> {
        let mut visible: Vec<&Message> = self
            .logs
            .iter()
            .flat_map(|log| log.messages.iter())
            .filter(|m| m.participant == viewer || !registry.contains(m.id))
            .collect();
        visible.sort_by_key(|m| m.id);
        visible
    }
}

/// Current Unix time in milliseconds
pub(crate) fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_ids_strictly_increase() {
        let ids: Vec<MessageId> = (0..100).map(|_| MessageId::new()).collect();
        for pair in ids.windows(2) {
            assert!(pair[0] < pair[1]);
        }
    }

    #[test]
    fn test_message_id_tracks_clock() {
        let before = now_ms();
        let id = MessageId::new();
        assert!(id.0 >= before);
    }

    #[test]
    fn test_append_only_while_streaming() {
        let mut log = ConversationLog::new();
        let msg = Message::placeholder(ParticipantId::One);
        let id = msg.id;
        log.push(msg);

        assert!(log.append(id, "Hel"));
        assert!(log.append(id, "lo"));
        assert_eq!(log.get(id).map(|m| m.content.as_str()), Some("Hello"));

        log.finalize(id);
        assert!(!log.append(id, "!"));
        assert_eq!(log.get(id).map(|m| m.content.as_str()), Some("Hello"));
    }

    #[test]
    fn test_discard_removes_message() {
        let mut conversation = Conversation::new();
        let id = conversation.start_streaming(ParticipantId::Two);
        assert_eq!(conversation.log(ParticipantId::Two).len(), 1);

        let removed = conversation.log_mut(ParticipantId::Two).discard(id);
        assert!(removed.is_some());
        assert!(conversation.log(ParticipantId::Two).is_empty());
        assert!(conversation.log_mut(ParticipantId::Two).discard(id).is_none());
    }

    #[test]
    fn test_panel_view_hides_peer_drafts() {
        let mut conversation = Conversation::new();
        let mut registry = StreamingRegistry::new();

        conversation
            .log_mut(ParticipantId::One)
            .push(Message::new(ParticipantId::One, "first"));
        let draft = conversation.start_streaming(ParticipantId::Two);
        conversation.log_mut(ParticipantId::Two).append(draft, "typing...");
        registry.insert(draft);

        let one_view = conversation.panel_view(ParticipantId::One, &registry);
        assert_eq!(one_view.len(), 1);
        assert_eq!(one_view[0].content, "first");

        let two_view = conversation.panel_view(ParticipantId::Two, &registry);
        assert_eq!(two_view.len(), 2);
        assert_eq!(two_view[1].content, "typing...");

        registry.remove(draft);
        assert_eq!(conversation.panel_view(ParticipantId::One, &registry).len(), 2);
    }

    #[test]
    fn test_panel_view_orders_by_id_across_logs() {
        let mut conversation = Conversation::new();
        let a = Message::new(ParticipantId::One, "a");
        let b = Message::new(ParticipantId::Two, "b");
        let c = Message::new(ParticipantId::One, "c");
        conversation.log_mut(ParticipantId::One).push(a);
        conversation.log_mut(ParticipantId::One).push(c);
        conversation.log_mut(ParticipantId::Two).push(b);

        let registry = StreamingRegistry::new();
        let contents: Vec<&str> = conversation
            .panel_view(ParticipantId::Two, &registry)
            .iter()
            .map(|m| m.content.as_str())
            .collect();
        assert_eq!(contents, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_blank_detection() {
        assert!(Message::new(ParticipantId::One, "  \n\t").is_blank());
        assert!(!Message::new(ParticipantId::One, " x ").is_blank());
    }
}
