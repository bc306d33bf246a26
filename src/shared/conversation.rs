use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Ordered chat history that always starts with the system turn.
///
/// Turns can only be appended; nothing already in the history is edited,
/// removed or reordered.
#[derive(Debug, Clone)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
}

impl Conversation {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            messages: vec![ChatMessage::system(system_prompt)],
        }
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.messages.push(ChatMessage::user(content));
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.messages.push(ChatMessage::assistant(content));
    }

    /// Drops the newest turn if it is a user turn. Used when a request for
    /// that turn failed and the turn should not stay in the history.
    pub fn pop_user(&mut self) -> Option<ChatMessage> {
        match self.messages.last() {
            Some(last) if self.messages.len() > 1 && last.role == Role::User => self.messages.pop(),
            _ => None,
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// System turn plus the most recent `max_turns` user/assistant pairs.
    pub fn windowed(&self, max_turns: usize) -> Vec<ChatMessage> {
        let (head, body) = self.messages.split_at(1);
        let keep = max_turns.saturating_mul(2);
        let start = body.len().saturating_sub(keep);
        head.iter().chain(body[start..].iter()).cloned().collect()
    }
}
