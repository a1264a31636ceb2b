//! Conversation types and the answer streaming layer behind the chat
//! endpoint.

pub mod stream;
pub mod types;

pub use stream::{AnswerStreamer, StreamFrame};
pub use types::{ConversationRequest, Message, Role};
