//! Backend clients and the session abstraction over them.

pub mod gemini;
pub mod provider;
pub mod session;

pub use gemini::GeminiClient;
pub use provider::{Chunk, ClientError, Reply, ReplyStream, SessionClient};
pub use session::{ChatSession, Turn, TurnRole};
