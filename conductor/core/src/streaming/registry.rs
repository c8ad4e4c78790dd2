//! Streaming Registry
//!
//! The set of message ids currently receiving incremental content.

use std::collections::HashSet;

use crate::conversation::MessageId;

/// Ids of messages that are still streaming
#[derive(Clone, Debug, Default)]
pub struct StreamingRegistry {
    active: HashSet<MessageId>,
}

impl StreamingRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a message as streaming
    pub fn insert(&mut self, id: MessageId) -> bool {
        self.active.insert(id)
    }

    /// Unregister a message
    pub fn remove(&mut self, id: MessageId) -> bool {
        self.active.remove(&id)
    }

    /// Whether a message is still streaming
    #[must_use]
    pub fn contains(&self, id: MessageId) -> bool {
        self.active.contains(&id)
    }

    /// Number of streaming messages
    #[must_use]
    pub fn len(&self) -> usize {
        self.active.len()
    }

    /// Whether nothing is streaming
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// Forget every entry
    pub fn clear(&mut self) {
        self.active.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_remove() {
        let mut registry = StreamingRegistry::new();
        let id = MessageId::new();

        assert!(registry.insert(id));
        assert!(!registry.insert(id));
        assert!(registry.contains(id));
        assert_eq!(registry.len(), 1);

        assert!(registry.remove(id));
        assert!(!registry.remove(id));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_clear() {
        let mut registry = StreamingRegistry::new();
        registry.insert(MessageId::new());
        registry.insert(MessageId::new());
        registry.clear();
        assert!(registry.is_empty());
    }
}
