//! History Formatter
//!
//! Turns the two participant logs into one role-tagged prompt history, seen
//! from the responder's side: the peer speaks as [`Role::User`], the
//! responder's own turns come back as [`Role::Assistant`]. The result always
//! ends on a user entry, or is empty when there is nothing to answer yet.

use crate::backend::{HistoryEntry, Role};
use crate::conversation::{ConversationLog, MessageKind};
use crate::participant::ParticipantId;

/// Default number of entries kept per side
pub const DEFAULT_CONTEXT_WINDOW: usize = 20;

/// Usable contents of one log: greeting slot skipped, drafts and blanks
/// dropped, capped to the most recent `window` entries
fn usable(log: &ConversationLog, window: usize) -> Vec<&str> {
    let messages = log.messages();
    let skip = usize::from(
        messages
            .first()
            .is_some_and(|m| m.kind == MessageKind::Greeting),
    );

    let contents: Vec<&str> = messages[skip..]
        .iter()
        .filter(|m| !m.streaming && !m.is_blank())
        .map(|m| m.content.as_str())
        .collect();

    let start = contents.len().saturating_sub(window);
    contents[start..].to_vec()
}

/// Build the prompt history for `responder`
///
/// `log_one` and `log_two` are the logs of [`ParticipantId::One`] and
/// [`ParticipantId::Two`].
#[must_use]
pub fn build_history(
    log_one: &ConversationLog,
    log_two: &ConversationLog,
    responder: ParticipantId,
    window: usize,
) -> Vec<HistoryEntry> {
    let (own_log, peer_log) = match responder {
        ParticipantId::One => (log_one, log_two),
        ParticipantId::Two => (log_two, log_one),
    };
    let own = usable(own_log, window);
    let peer = usable(peer_log, window);

    let mut history = Vec::with_capacity(own.len() + peer.len() + 1);
    for i in 0..own.len().max(peer.len()) {
        if let Some(text) = peer.get(i) {
            history.push(HistoryEntry::user(*text));
        }
        if let Some(text) = own.get(i) {
            history.push(HistoryEntry::assistant(*text));
        }
    }

    while history.last().is_some_and(|e| e.role == Role::Assistant) {
        history.pop();
    }

    if let Some(latest) = peer.last() {
        let already_last = history
            .last()
            .is_some_and(|e| e.role == Role::User && e.content == *latest);
        if !already_last {
            history.push(HistoryEntry::user(*latest));
        }
    }

    if history.iter().any(|e| e.role == Role::User) {
        history
    } else {
        Vec::new()
    }
}

/// Opening entry used when there is no conversation yet
#[must_use]
pub fn topic_seed(topic: &str) -> HistoryEntry {
    HistoryEntry::user(format!(
        "Let's begin our conversation about \"{}\". Share your opening thoughts.",
        topic.trim()
    ))
}
