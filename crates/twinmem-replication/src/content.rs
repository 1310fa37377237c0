use serde::{Deserialize, Serialize};

/// One chat message whose content is part of a memory.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Content handed to `add`: plain text or multi-part message content.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MemoryContent {
    Text(String),
    Messages(Vec<Message>),
}

impl MemoryContent {
    /// Flat form written to providers and compared for duplicates.
    ///
    /// Each part is trimmed on its own; empty parts are dropped and the rest
    /// joined with single spaces.
    pub fn flatten(&self) -> String {
        match self {
            Self::Text(text) => text.trim().to_string(),
            Self::Messages(messages) => messages
                .iter()
                .map(|message| message.content.trim())
                .filter(|part| !part.is_empty())
                .collect::<Vec<_>>()
                .join(" "),
        }
    }
}

impl From<&str> for MemoryContent {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for MemoryContent {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<Vec<Message>> for MemoryContent {
    fn from(messages: Vec<Message>) -> Self {
        Self::Messages(messages)
    }
}
