// Shared test helpers; not all items used by every test binary.
#![allow(unused)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Result, bail};
use async_trait::async_trait;
use tempfile::TempDir;

use chatsiphon::model::{Chat, Direction, Message};
use chatsiphon::storage::{MessageStore, StoreOptions};
use chatsiphon::ui::{ChatSurface, ElementQuery, UiElement, UiHandle, parts};

/// One scripted message on the fake page.
#[derive(Clone)]
pub struct PageMessage {
    pub id: Option<String>,
    pub body: String,
    pub incoming: bool,
}

impl PageMessage {
    pub fn incoming(id: &str, body: &str) -> Self {
        Self {
            id: Some(id.to_string()),
            body: body.to_string(),
            incoming: true,
        }
    }

    pub fn outgoing(id: &str, body: &str) -> Self {
        Self {
            id: Some(id.to_string()),
            body: body.to_string(),
            incoming: false,
        }
    }

    pub fn idless(body: &str) -> Self {
        Self {
            id: None,
            body: body.to_string(),
            incoming: true,
        }
    }
}

/// One scripted chat row with its conversation.
pub struct PageChat {
    pub title: String,
    pub messages: Vec<PageMessage>,
    pub clickable: bool,
    pub badge: Option<String>,
}

impl PageChat {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            messages: Vec::new(),
            clickable: true,
            badge: None,
        }
    }

    #[must_use]
    pub fn with_messages(mut self, messages: Vec<PageMessage>) -> Self {
        self.messages = messages;
        self
    }

    #[must_use]
    pub fn unclickable(mut self) -> Self {
        self.clickable = false;
        self
    }

    #[must_use]
    pub fn with_badge(mut self, badge: &str) -> Self {
        self.badge = Some(badge.to_string());
        self
    }
}

struct PageState {
    chats: Vec<PageChat>,
    clicks: Vec<u32>,
    active: Option<usize>,
}

/// In-memory chat page: clicking a chat row opens it, and the message query
/// reads whichever chat is currently open, like the real surface does.
pub struct FakePage {
    state: Arc<Mutex<PageState>>,
}

impl FakePage {
    pub fn new(chats: Vec<PageChat>) -> Arc<Self> {
        let clicks = vec![0; chats.len()];
        Arc::new(Self {
            state: Arc::new(Mutex::new(PageState {
                chats,
                clicks,
                active: None,
            })),
        })
    }

    pub fn clicks(&self, chat_index: usize) -> u32 {
        self.state.lock().unwrap().clicks[chat_index]
    }

    pub fn open_chat_index(&self) -> Option<usize> {
        self.state.lock().unwrap().active
    }
}

#[async_trait]
impl ChatSurface for FakePage {
    fn chats(&self) -> Arc<dyn ElementQuery> {
        Arc::new(ChatListQuery {
            state: Arc::clone(&self.state),
        })
    }

    fn messages(&self) -> Arc<dyn ElementQuery> {
        Arc::new(MessageListQuery {
            state: Arc::clone(&self.state),
        })
    }

    async fn composer(&self) -> Result<UiHandle> {
        Ok(Arc::new(ComposerEl))
    }

    async fn mark_unread_control(&self, _chat: &UiHandle) -> Result<UiHandle> {
        bail!("mark-unread is not scripted on this page")
    }
}

struct ChatListQuery {
    state: Arc<Mutex<PageState>>,
}

#[async_trait]
impl ElementQuery for ChatListQuery {
    async fn count(&self) -> Result<usize> {
        Ok(self.state.lock().unwrap().chats.len())
    }

    async fn nth(&self, index: usize) -> Result<UiHandle> {
        if index >= self.state.lock().unwrap().chats.len() {
            bail!("chat index {index} out of range");
        }
        Ok(Arc::new(ChatRowEl {
            state: Arc::clone(&self.state),
            index,
        }))
    }
}

struct ChatRowEl {
    state: Arc<Mutex<PageState>>,
    index: usize,
}

#[async_trait]
impl UiElement for ChatRowEl {
    async fn click(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.clicks[self.index] += 1;
        if !state.chats[self.index].clickable {
            bail!("chat row detached");
        }
        state.active = Some(self.index);
        Ok(())
    }

    async fn text(&self) -> Result<String> {
        Ok(self.state.lock().unwrap().chats[self.index].title.clone())
    }

    async fn attr(&self, _name: &str) -> Result<Option<String>> {
        Ok(None)
    }

    fn part(&self, name: &str) -> Arc<dyn ElementQuery> {
        if name == parts::UNREAD_BADGE {
            let badge = self.state.lock().unwrap().chats[self.index].badge.clone();
            if let Some(text) = badge {
                return Arc::new(StaticTextQuery { text });
            }
        }
        Arc::new(EmptyQuery)
    }
}

struct MessageListQuery {
    state: Arc<Mutex<PageState>>,
}

#[async_trait]
impl ElementQuery for MessageListQuery {
    async fn count(&self) -> Result<usize> {
        let state = self.state.lock().unwrap();
        Ok(state.active.map_or(0, |i| state.chats[i].messages.len()))
    }

    async fn nth(&self, index: usize) -> Result<UiHandle> {
        let state = self.state.lock().unwrap();
        let Some(chat_index) = state.active else {
            bail!("no chat is open");
        };
        if index >= state.chats[chat_index].messages.len() {
            bail!("message index {index} out of range");
        }
        Ok(Arc::new(MsgEl {
            state: Arc::clone(&self.state),
            chat_index,
            msg_index: index,
        }))
    }
}

struct MsgEl {
    state: Arc<Mutex<PageState>>,
    chat_index: usize,
    msg_index: usize,
}

impl MsgEl {
    fn read<T>(&self, f: impl FnOnce(&PageMessage) -> T) -> T {
        let state = self.state.lock().unwrap();
        f(&state.chats[self.chat_index].messages[self.msg_index])
    }
}

#[async_trait]
impl UiElement for MsgEl {
    async fn click(&self) -> Result<()> {
        Ok(())
    }

    async fn text(&self) -> Result<String> {
        Ok(self.read(|m| m.body.clone()))
    }

    async fn attr(&self, name: &str) -> Result<Option<String>> {
        if name == "data-id" {
            return Ok(self.read(|m| m.id.clone()));
        }
        Ok(None)
    }

    fn part(&self, name: &str) -> Arc<dyn ElementQuery> {
        if name == parts::INCOMING && self.read(|m| m.incoming) {
            Arc::new(StaticTextQuery {
                text: String::new(),
            })
        } else {
            Arc::new(EmptyQuery)
        }
    }
}

struct ComposerEl;

#[async_trait]
impl UiElement for ComposerEl {
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

/// Single text element, used for unread badges and presence markers.
struct StaticTextQuery {
    text: String,
}

#[async_trait]
impl ElementQuery for StaticTextQuery {
    async fn count(&self) -> Result<usize> {
        Ok(1)
    }

    async fn nth(&self, index: usize) -> Result<UiHandle> {
        if index > 0 {
            bail!("only one element here");
        }
        Ok(Arc::new(TextEl {
            text: self.text.clone(),
        }))
    }
}

struct TextEl {
    text: String,
}

#[async_trait]
impl UiElement for TextEl {
    async fn click(&self) -> Result<()> {
        Ok(())
    }

    async fn text(&self) -> Result<String> {
        Ok(self.text.clone())
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
        bail!("nothing at index {index}")
    }
}

// --- Store helpers ---

pub fn store_in(dir: &TempDir) -> MessageStore {
    MessageStore::open(dir.path().join("messages.db"), StoreOptions::default())
        .expect("open store")
}

pub async fn wait_for_key(store: &MessageStore, key: &str) {
    for _ in 0..300 {
        if store.exists(key).expect("existence check") {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("{key} never became visible in the store");
}

pub fn stub_element() -> UiHandle {
    Arc::new(ComposerEl)
}

pub fn sample_message(chat: &Chat, direction: Direction, id: &str, body: &str) -> Message {
    Message::new(chat, direction, id, body, stub_element()).with_content_type("text")
}
