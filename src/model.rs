//! Core data types flowing through the pipeline.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::keys;
use crate::ui::UiHandle;

/// Which side of the conversation a message came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Incoming,
    Outgoing,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Incoming => "incoming",
            Direction::Outgoing => "outgoing",
        }
    }
}

/// One conversation thread, as observed on a listing pass.
///
/// Ephemeral: never persisted, discarded once the extraction pass for this
/// chat completes.
#[derive(Clone)]
pub struct Chat {
    /// Display string; volatile, may repeat across sessions.
    pub name: String,
    /// Stable id derived from `name`; shared display names collide.
    pub id: String,
    /// Live row element backing this chat.
    pub ui: UiHandle,
    pub observed_at: DateTime<Utc>,
}

impl Chat {
    pub fn new(name: impl Into<String>, ui: UiHandle) -> Self {
        let name = name.into();
        Self {
            id: keys::chat_key(&name),
            name,
            ui,
            observed_at: Utc::now(),
        }
    }
}

impl std::fmt::Debug for Chat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chat")
            .field("name", &self.name)
            .field("id", &self.id)
            .field("observed_at", &self.observed_at)
            .finish_non_exhaustive()
    }
}

/// One observed chat message. Never mutated after construction; a correction
/// observed later becomes a new instance with its own dedup key.
#[derive(Clone)]
pub struct Message {
    pub direction: Direction,
    /// Platform-assigned id scraped from the UI.
    pub external_id: String,
    /// Durable uniqueness key, always `keys::message_key(external_id)`.
    pub dedup_key: String,
    pub content: String,
    pub content_type: Option<String>,
    /// Back-reference to the parent chat by identity only.
    pub chat_name: String,
    pub chat_id: String,
    /// Live message element; valid only while the page state persists.
    pub ui: UiHandle,
    pub observed_at: DateTime<Utc>,
}

impl Message {
    pub fn new(
        chat: &Chat,
        direction: Direction,
        external_id: impl Into<String>,
        content: impl Into<String>,
        ui: UiHandle,
    ) -> Self {
        let external_id = external_id.into();
        Self {
            dedup_key: keys::message_key(&external_id),
            direction,
            external_id,
            content: content.into(),
            content_type: None,
            chat_name: chat.name.clone(),
            chat_id: chat.id.clone(),
            ui,
            observed_at: Utc::now(),
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

impl std::fmt::Debug for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Message")
            .field("direction", &self.direction)
            .field("dedup_key", &self.dedup_key)
            .field("chat_id", &self.chat_id)
            .field("observed_at", &self.observed_at)
            .finish_non_exhaustive()
    }
}

/// One durable row, as read back from the store.
#[derive(Debug, Clone, Serialize)]
pub struct StoredMessage {
    pub id: i64,
    pub dedup_key: String,
    pub content: String,
    pub content_type: Option<String>,
    pub direction: String,
    pub chat_name: String,
    pub chat_id: String,
    pub observed_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::{ElementQuery, UiElement};
    use anyhow::Result;
    use async_trait::async_trait;
    use std::sync::Arc;

    struct StubElement;

    #[async_trait]
    impl UiElement for StubElement {
        async fn click(&self) -> Result<()> {
            Ok(())
        }
        async fn text(&self) -> Result<String> {
            Ok(String::new())
        }
        async fn attr(&self, _name: &str) -> Result<Option<String>> {
            Ok(None)
        }
        fn part(&self, _name: &str) -> Arc<dyn ElementQuery> {
            Arc::new(EmptyQuery)
        }
    }

    struct EmptyQuery;

    #[async_trait]
    impl ElementQuery for EmptyQuery {
        async fn count(&self) -> Result<usize> {
            Ok(0)
        }
        async fn nth(&self, index: usize) -> Result<UiHandle> {
            anyhow::bail!("no element at {}", index)
        }
    }

    fn stub() -> UiHandle {
        Arc::new(StubElement)
    }

    #[test]
    fn test_chat_derives_id_from_name() {
        let chat = Chat::new("  Alice ", stub());
        assert_eq!(chat.name, "  Alice ");
        assert_eq!(chat.id, "alice");
    }

    #[test]
    fn test_message_derives_dedup_key_and_back_reference() {
        let chat = Chat::new("Work Group", stub());
        let msg = Message::new(&chat, Direction::Incoming, "3EB0", "hello", stub());
        assert_eq!(msg.dedup_key, "msg::3EB0");
        assert_eq!(msg.chat_id, "work group");
        assert_eq!(msg.chat_name, "Work Group");
        assert_eq!(msg.content_type, None);
    }

    #[test]
    fn test_content_type_builder() {
        let chat = Chat::new("a", stub());
        let msg =
            Message::new(&chat, Direction::Outgoing, "1", "x", stub()).with_content_type("text");
        assert_eq!(msg.content_type.as_deref(), Some("text"));
        assert_eq!(msg.direction.as_str(), "outgoing");
    }
}
