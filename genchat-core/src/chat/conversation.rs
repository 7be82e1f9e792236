//! Conversation controller: sending, streaming reconciliation, cancellation.
//!
//! One controller owns one conversation: the message log, the backend
//! session handle, and the single in-flight send operation. All state lives
//! behind one mutex; the mutex guards both log mutation and the
//! one-pending-message invariant. Callers observe state through immutable
//! [`ConversationSnapshot`] values published on a watch channel after every
//! mutation.
//!
//! Cancellation discipline: starting a new send (or `stop`, or
//! `start_new_chat`) cancels the in-flight operation's token and cleans up
//! its placeholder synchronously, under the lock. The superseded worker
//! checks its token under the same lock before every mutation, so once
//! abandoned it can never touch the log again. While an operation is live its
//! system entry is always the final log element, which is what makes the
//! canceller's `remove_last` correct.

use std::sync::Arc;

use futures::StreamExt;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::config::ConfigProvider;
use crate::llm::{ChatSession, ClientError, SessionClient};

use super::log::{ChatMessage, MessageLog};

/// Immutable view of the conversation state at one point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationSnapshot {
    pub messages: Vec<ChatMessage>,
    pub busy: bool,
    pub error: Option<ClientError>,
}

impl ConversationSnapshot {
    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }
}

struct ChatState {
    log: MessageLog,
    session: ChatSession,
    busy: bool,
    error: Option<ClientError>,
    active: Option<CancellationToken>,
}

impl ChatState {
    fn snapshot(&self) -> ConversationSnapshot {
        ConversationSnapshot {
            messages: self.log.messages().to_vec(),
            busy: self.busy,
            error: self.error.clone(),
        }
    }

    /// Cancel and clean up the in-flight operation, if any.
    ///
    /// Removes the operation's system entry (always the final log element
    /// while an operation is live) and clears the busy flag. The worker
    /// itself is abandoned: its token is cancelled before we release the
    /// lock, so every later mutation attempt on its part is a no-op.
    fn cancel_active(&mut self) {
        let Some(token) = self.active.take() else {
            return;
        };
        token.cancel();
        if self.log.remove_last().is_err() {
            error!("in-flight send with an empty message log");
            debug_assert!(false, "in-flight send with an empty message log");
        }
        self.busy = false;
    }

    fn mutate_last(&mut self, mutate: impl FnOnce(&mut ChatMessage)) {
        if self.log.update_last(mutate).is_err() {
            error!("in-flight send with an empty message log");
            debug_assert!(false, "in-flight send with an empty message log");
        }
    }
}

/// Controller for one chat conversation.
///
/// `send_message` spawns its work onto the ambient Tokio runtime and returns
/// immediately; progress and results surface through [`Conversation::snapshot`]
/// and [`Conversation::subscribe`].
pub struct Conversation {
    client: Arc<dyn SessionClient>,
    config: Arc<dyn ConfigProvider>,
    state: Arc<Mutex<ChatState>>,
    updates: Arc<watch::Sender<ConversationSnapshot>>,
}

impl Conversation {
    pub fn new(client: Arc<dyn SessionClient>, config: Arc<dyn ConfigProvider>) -> Self {
        let session = client.start_session(&config.model_identifier());
        let state = ChatState {
            log: MessageLog::new(),
            session,
            busy: false,
            error: None,
            active: None,
        };
        let (updates, _) = watch::channel(state.snapshot());
        Self {
            client,
            config,
            state: Arc::new(Mutex::new(state)),
            updates: Arc::new(updates),
        }
    }

    /// Current state as an immutable snapshot.
    pub fn snapshot(&self) -> ConversationSnapshot {
        self.state.lock().snapshot()
    }

    /// Receiver that observes a fresh snapshot after every state change.
    pub fn subscribe(&self) -> watch::Receiver<ConversationSnapshot> {
        self.updates.subscribe()
    }

    /// Send a user message, superseding any in-flight send.
    ///
    /// The raw `text` is what lands in the log; the configured preamble is
    /// prepended only to the prompt that goes out to the backend.
    pub fn send_message(&self, text: &str, streaming: bool) {
        let prompt = compose_prompt(&self.config.preamble(), text);
        let token = CancellationToken::new();

        let (session, snapshot) = {
            let mut state = self.state.lock();
            state.error = None;
            state.cancel_active();
            state.log.append(ChatMessage::user(text));
            state.log.append(ChatMessage::pending_system());
            state.busy = true;
            state.active = Some(token.clone());
            (state.session.clone(), state.snapshot())
        };
        self.updates.send_replace(snapshot);

        let client = Arc::clone(&self.client);
        let state = Arc::clone(&self.state);
        let updates = Arc::clone(&self.updates);
        tokio::spawn(async move {
            let outcome = if streaming {
                run_streaming(&*client, &session, &prompt, &token, &state, &updates).await
            } else {
                run_once(&*client, &session, &prompt, &token, &state, &updates).await
            };
            finish(outcome, &token, &state, &updates);
        });
    }

    /// Discard the conversation and start over with a fresh backend session.
    pub fn start_new_chat(&self) {
        let model = self.config.model_identifier();
        let snapshot = {
            let mut state = self.state.lock();
            state.cancel_active();
            state.error = None;
            state.session = self.client.start_session(&model);
            state.log.clear();
            state.snapshot()
        };
        self.updates.send_replace(snapshot);
    }

    /// Cancel the in-flight send without reporting the cancellation as an
    /// error. Distinguishes a deliberate user stop from a backend failure.
    pub fn stop(&self) {
        let snapshot = {
            let mut state = self.state.lock();
            state.cancel_active();
            state.error = None;
            state.snapshot()
        };
        self.updates.send_replace(snapshot);
    }
}

/// Preamble and user text joined into the outgoing prompt.
fn compose_prompt(preamble: &str, text: &str) -> String {
    if preamble.is_empty() {
        text.to_string()
    } else {
        format!("{preamble}\n{text}")
    }
}

async fn run_streaming(
    client: &dyn SessionClient,
    session: &ChatSession,
    prompt: &str,
    token: &CancellationToken,
    state: &Mutex<ChatState>,
    updates: &watch::Sender<ConversationSnapshot>,
) -> Result<(), ClientError> {
    let mut stream = tokio::select! {
        biased;
        _ = token.cancelled() => return Err(ClientError::Cancelled),
        result = client.send_streaming(session, prompt, token.clone()) => result?,
    };

    loop {
        let item = tokio::select! {
            biased;
            _ = token.cancelled() => return Err(ClientError::Cancelled),
            item = stream.next() => item,
        };
        let Some(item) = item else { break };
        let chunk = item?;
        mutate_last_if_live(state, token, updates, |message| {
            message.pending = false;
            if let Some(text) = chunk.text {
                message.content.push_str(&text);
            }
        })?;
    }

    // A stream may legitimately end without ever carrying text; the
    // placeholder still completes.
    mutate_last_if_live(state, token, updates, |message| message.pending = false)
}

async fn run_once(
    client: &dyn SessionClient,
    session: &ChatSession,
    prompt: &str,
    token: &CancellationToken,
    state: &Mutex<ChatState>,
    updates: &watch::Sender<ConversationSnapshot>,
) -> Result<(), ClientError> {
    let reply = tokio::select! {
        biased;
        _ = token.cancelled() => return Err(ClientError::Cancelled),
        result = client.send_once(session, prompt, token.clone()) => result?,
    };
    mutate_last_if_live(state, token, updates, |message| {
        message.content = reply.text.unwrap_or_default();
        message.pending = false;
    })
}

/// Apply `mutate` to the operation's system entry, unless the operation has
/// been abandoned. The token check and the mutation happen under one lock
/// acquisition.
fn mutate_last_if_live(
    state: &Mutex<ChatState>,
    token: &CancellationToken,
    updates: &watch::Sender<ConversationSnapshot>,
    mutate: impl FnOnce(&mut ChatMessage),
) -> Result<(), ClientError> {
    let snapshot = {
        let mut state = state.lock();
        if token.is_cancelled() {
            return Err(ClientError::Cancelled);
        }
        state.mutate_last(mutate);
        state.snapshot()
    };
    updates.send_replace(snapshot);
    Ok(())
}

/// Worker epilogue: release the busy flag and, on failure, capture the error
/// and drop the orphaned system entry. A no-op when the operation was
/// abandoned; the canceller already cleaned up.
fn finish(
    outcome: Result<(), ClientError>,
    token: &CancellationToken,
    state: &Mutex<ChatState>,
    updates: &watch::Sender<ConversationSnapshot>,
) {
    let snapshot = {
        let mut state = state.lock();
        if token.is_cancelled() {
            return;
        }
        state.active = None;
        state.busy = false;
        if let Err(err) = outcome {
            debug!("send failed: {err}");
            if state.log.remove_last().is_err() {
                error!("failed send with an empty message log");
                debug_assert!(false, "failed send with an empty message log");
            }
            state.error = Some(err);
        }
        state.snapshot()
    };
    updates.send_replace(snapshot);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_includes_preamble_when_present() {
        assert_eq!(
            compose_prompt("Answer briefly.", "What is Rust?"),
            "Answer briefly.\nWhat is Rust?"
        );
    }

    #[test]
    fn prompt_is_raw_text_without_preamble() {
        assert_eq!(compose_prompt("", "What is Rust?"), "What is Rust?");
    }
}
