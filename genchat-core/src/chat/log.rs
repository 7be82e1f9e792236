//! Ordered chat history with per-turn pending state.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Who produced a chat turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Participant {
    User,
    System,
}

/// A single chat turn.
///
/// `content` grows in place while a streamed response is being received;
/// `pending` marks a placeholder that is still waiting for its first chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub content: String,
    pub participant: Participant,
    pub pending: bool,
}

impl ChatMessage {
    /// A completed user turn.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            participant: Participant::User,
            pending: false,
        }
    }

    /// An empty system placeholder awaiting a response.
    pub fn pending_system() -> Self {
        Self {
            content: String::new(),
            participant: Participant::System,
            pending: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MessageLogError {
    #[error("message log is empty")]
    Empty,
}

/// Append-ordered sequence of chat turns.
///
/// Mutation is limited to appending, editing or removing the final entry,
/// and clearing the whole log. The conversation controller is the single
/// writer; there is no internal locking.
#[derive(Debug, Default, Clone)]
pub struct MessageLog {
    entries: Vec<ChatMessage>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, message: ChatMessage) {
        self.entries.push(message);
    }

    /// Apply `mutate` to the final entry.
    pub fn update_last(
        &mut self,
        mutate: impl FnOnce(&mut ChatMessage),
    ) -> Result<(), MessageLogError> {
        let last = self.entries.last_mut().ok_or(MessageLogError::Empty)?;
        mutate(last);
        Ok(())
    }

    /// Remove and return the final entry.
    pub fn remove_last(&mut self) -> Result<ChatMessage, MessageLogError> {
        self.entries.pop().ok_or(MessageLogError::Empty)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.entries
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_preserves_order() {
        let mut log = MessageLog::new();
        log.append(ChatMessage::user("first"));
        log.append(ChatMessage::user("second"));
        let contents: Vec<_> = log.messages().iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["first", "second"]);
    }

    #[test]
    fn update_last_mutates_final_entry_only() {
        let mut log = MessageLog::new();
        log.append(ChatMessage::user("hello"));
        log.append(ChatMessage::pending_system());
        log.update_last(|m| {
            m.pending = false;
            m.content.push_str("world");
        })
        .unwrap();
        assert_eq!(log.messages()[0].content, "hello");
        let last = log.last().unwrap();
        assert_eq!(last.content, "world");
        assert!(!last.pending);
    }

    #[test]
    fn update_last_on_empty_log_fails() {
        let mut log = MessageLog::new();
        let result = log.update_last(|m| m.pending = false);
        assert_eq!(result, Err(MessageLogError::Empty));
    }

    #[test]
    fn remove_last_returns_removed_entry() {
        let mut log = MessageLog::new();
        log.append(ChatMessage::user("keep"));
        log.append(ChatMessage::pending_system());
        let removed = log.remove_last().unwrap();
        assert_eq!(removed.participant, Participant::System);
        assert_eq!(log.len(), 1);
        assert_eq!(log.last().unwrap().content, "keep");
    }

    #[test]
    fn remove_last_on_empty_log_fails() {
        let mut log = MessageLog::new();
        assert_eq!(log.remove_last().unwrap_err(), MessageLogError::Empty);
    }

    #[test]
    fn clear_empties_the_log() {
        let mut log = MessageLog::new();
        log.append(ChatMessage::user("one"));
        log.append(ChatMessage::user("two"));
        log.clear();
        assert!(log.is_empty());
    }
}
