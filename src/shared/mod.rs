pub mod config;
pub mod conversation;
pub mod error;
pub mod inference;
pub mod logging;

pub use conversation::{ChatMessage, Conversation, Role};
pub use error::InferenceError;
pub use inference::{CompletionService, InferenceClient, ModelResponse};
