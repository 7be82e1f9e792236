//! # genchat-core
//!
//! Core library for genchat, a generative-AI chat client. It implements the
//! conversational session manager: an ordered message log, a session-client
//! abstraction over the model backend, and the conversation controller that
//! orchestrates streaming reconciliation, cancellation, and session resets.
//!
//! The crate is organized into three modules:
//!
//! - `config/`: configuration trait, TOML loading, and constants.
//! - `llm/`: the [`SessionClient`] abstraction, the opaque session handle,
//!   and the Gemini-backed client.
//! - `chat/`: the message log and the [`Conversation`] controller.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use genchat_core::{ChatConfig, Conversation, GeminiClient, SharedConfig};
//!
//! let config = SharedConfig::new(ChatConfig::load_or_default(None)?);
//! let client = Arc::new(GeminiClient::new(api_key));
//! let conversation = Conversation::new(client, config);
//!
//! conversation.send_message("Hello!", true);
//! let mut updates = conversation.subscribe();
//! let idle = updates.wait_for(|snapshot| !snapshot.busy).await?;
//! ```

pub mod chat;
pub mod config;
pub mod llm;

pub use chat::{ChatMessage, Conversation, ConversationSnapshot, MessageLog, Participant};
pub use config::{ChatConfig, ConfigProvider, SharedConfig};
pub use llm::{ChatSession, Chunk, ClientError, GeminiClient, Reply, ReplyStream, SessionClient};
