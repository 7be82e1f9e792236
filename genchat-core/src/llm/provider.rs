//! Backend session-client abstraction.
//!
//! A [`SessionClient`] wraps one conversational model backend. It hands out
//! opaque [`ChatSession`] handles and exposes a single-shot and a streaming
//! send. Both sends take a cancellation token and must observe it at every
//! suspension point, failing with [`ClientError::Cancelled`] once it fires.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use super::session::ChatSession;

/// Complete response from a one-shot send.
///
/// `text` is absent when the backend returned no usable text, e.g. after
/// safety filtering.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub text: Option<String>,
}

/// One unit of a streamed response. A chunk may carry metadata only.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub text: Option<String>,
    pub finish_reason: Option<String>,
}

/// Lazy, finite, non-restartable sequence of response chunks.
///
/// Consuming it fully yields the complete response; it terminates with an
/// `Err` item on network interruption, backend failure, or cancellation.
pub type ReplyStream = Pin<Box<dyn Stream<Item = Result<Chunk, ClientError>> + Send>>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    #[error("network failure: {0}")]
    Network(String),
    #[error("backend error: {0}")]
    Backend(String),
    #[error("request cancelled")]
    Cancelled,
}

/// A conversational backend bound to accumulated-turn sessions.
#[async_trait]
pub trait SessionClient: Send + Sync {
    /// Create a fresh session with no prior turns. Pure factory, no I/O.
    fn start_session(&self, model: &str) -> ChatSession;

    /// Send `prompt` and suspend until the complete response (or failure).
    async fn send_once(
        &self,
        session: &ChatSession,
        prompt: &str,
        cancel: CancellationToken,
    ) -> Result<Reply, ClientError>;

    /// Send `prompt` and return the chunk stream for the response.
    async fn send_streaming(
        &self,
        session: &ChatSession,
        prompt: &str,
        cancel: CancellationToken,
    ) -> Result<ReplyStream, ClientError>;
}
