//! Opaque per-conversation backend context.

use std::sync::Arc;

use parking_lot::Mutex;

/// Role of an accumulated turn, in backend terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnRole {
    User,
    Model,
}

/// One committed request/response half stored in the session history.
#[derive(Debug, Clone, PartialEq)]
pub struct Turn {
    pub role: TurnRole,
    pub text: String,
}

/// Handle to one running backend conversation.
///
/// The session accumulates committed turns so every request carries the full
/// conversation. Only the session client appends to the history, and only
/// after an exchange completes successfully; a failed or cancelled request
/// leaves it untouched. Clones share the same history.
#[derive(Debug, Clone)]
pub struct ChatSession {
    model: String,
    history: Arc<Mutex<Vec<Turn>>>,
}

impl ChatSession {
    /// Fresh session with no prior turns. No network traffic is involved.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            history: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Snapshot of the committed turns.
    pub fn history(&self) -> Vec<Turn> {
        self.history.lock().clone()
    }

    pub fn turn_count(&self) -> usize {
        self.history.lock().len()
    }

    /// Commit a completed exchange.
    pub fn record_exchange(&self, prompt: impl Into<String>, reply: impl Into<String>) {
        let mut history = self.history.lock();
        history.push(Turn {
            role: TurnRole::User,
            text: prompt.into(),
        });
        history.push(Turn {
            role: TurnRole::Model,
            text: reply.into(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_has_no_turns() {
        let session = ChatSession::new("gemini-2.5-flash");
        assert_eq!(session.model(), "gemini-2.5-flash");
        assert!(session.history().is_empty());
    }

    #[test]
    fn clones_share_history() {
        let session = ChatSession::new("gemini-2.5-flash");
        let clone = session.clone();
        clone.record_exchange("hi", "hello");
        assert_eq!(session.turn_count(), 2);
        let history = session.history();
        assert_eq!(history[0].role, TurnRole::User);
        assert_eq!(history[1].role, TurnRole::Model);
        assert_eq!(history[1].text, "hello");
    }
}
