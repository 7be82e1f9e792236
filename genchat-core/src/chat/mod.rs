//! Conversation state: the message log and the controller that drives it.

pub mod conversation;
pub mod log;

pub use conversation::{Conversation, ConversationSnapshot};
pub use log::{ChatMessage, MessageLog, MessageLogError, Participant};
