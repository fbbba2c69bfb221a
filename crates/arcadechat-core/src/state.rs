//! UI-agnostic conversation state
//!
//! These types are shared by the session, the stores and any front-end. They
//! don't depend on a specific UI framework.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const ERROR_PREFIX: &str =
    "❌ **Error**: Failed to communicate with the AI agent. Please try again.";

/// The role of a chat message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

/// An out-of-band action the agent asked for, e.g. "connect this account".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredPayload {
    pub url: String,
    pub integration: String,
}

/// A chat message in the agent conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub role: ChatRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured: Option<StructuredPayload>,
}

impl ChatMessage {
    fn new(role: ChatRole, content: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content,
            timestamp: Utc::now(),
            structured: None,
        }
    }

    pub fn user(content: &str) -> Self {
        Self::new(ChatRole::User, content.to_string())
    }

    /// An empty assistant message that streaming updates fill in.
    pub fn assistant_placeholder() -> Self {
        Self::new(ChatRole::Assistant, String::new())
    }

    /// The synthetic reply shown when an exchange fails.
    pub fn assistant_error(id: &str, detail: &str) -> Self {
        let mut msg = Self::new(ChatRole::Assistant, format!("{ERROR_PREFIX}\n\n`{detail}`"));
        msg.id = id.to_string();
        msg
    }

    pub fn is_user(&self) -> bool {
        self.role == ChatRole::User
    }
}

/// Ordered message log keyed by message id.
///
/// Streaming updates are applied with [`Conversation::upsert`], so a message
/// keeps its position no matter how many times it is replaced.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_messages(messages: Vec<ChatMessage>) -> Self {
        Self { messages }
    }

    /// Replace the message with the same id, or append it.
    pub fn upsert(&mut self, message: ChatMessage) {
        match self.messages.iter_mut().find(|m| m.id == message.id) {
            Some(existing) => *existing = message,
            None => self.messages.push(message),
        }
    }

    pub fn get(&self, id: &str) -> Option<&ChatMessage> {
        self.messages.iter().find(|m| m.id == id)
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upsert_replaces_in_place() {
        let mut convo = Conversation::new();
        let user = ChatMessage::user("hi");
        let mut reply = ChatMessage::assistant_placeholder();
        convo.upsert(user.clone());
        convo.upsert(reply.clone());

        reply.content = "hello there".to_string();
        convo.upsert(reply.clone());

        assert_eq!(convo.len(), 2);
        assert_eq!(convo.messages()[0].id, user.id);
        assert_eq!(convo.messages()[1].content, "hello there");
    }

    #[test]
    fn test_upsert_appends_unknown_id() {
        let mut convo = Conversation::new();
        convo.upsert(ChatMessage::user("one"));
        convo.upsert(ChatMessage::user("two"));
        assert_eq!(convo.len(), 2);
    }

    #[test]
    fn test_error_message_keeps_id_and_detail() {
        let msg = ChatMessage::assistant_error("abc", "NetworkError");
        assert_eq!(msg.id, "abc");
        assert_eq!(msg.role, ChatRole::Assistant);
        assert!(msg.content.contains("`NetworkError`"));
        assert!(msg.structured.is_none());
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let json = serde_json::to_string(&ChatRole::Assistant).unwrap();
        assert_eq!(json, "\"assistant\"");
    }
}
