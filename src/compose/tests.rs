use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Result, bail};
use async_trait::async_trait;

use super::*;
use crate::errors::SiphonError;
use crate::ui::{ElementQuery, UiElement};

struct ChatRow {
    dead: bool,
    clicks: AtomicU32,
}

#[async_trait]
impl UiElement for ChatRow {
    async fn click(&self) -> Result<()> {
        self.clicks.fetch_add(1, Ordering::SeqCst);
        if self.dead {
            bail!("row detached");
        }
        Ok(())
    }

    async fn text(&self) -> Result<String> {
        Ok("Alice".to_string())
    }

    async fn attr(&self, _name: &str) -> Result<Option<String>> {
        Ok(None)
    }

    fn part(&self, _name: &str) -> Arc<dyn ElementQuery> {
        Arc::new(EmptyQuery)
    }
}

struct ComposerBox;

#[async_trait]
impl UiElement for ComposerBox {
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
        bail!("nothing at index {index}")
    }
}

struct FakeSurface {
    has_composer: bool,
}

#[async_trait]
impl ChatSurface for FakeSurface {
    fn chats(&self) -> Arc<dyn ElementQuery> {
        Arc::new(EmptyQuery)
    }

    fn messages(&self) -> Arc<dyn ElementQuery> {
        Arc::new(EmptyQuery)
    }

    async fn composer(&self) -> Result<UiHandle> {
        if self.has_composer {
            Ok(Arc::new(ComposerBox))
        } else {
            bail!("composer not found")
        }
    }

    async fn mark_unread_control(&self, _chat: &UiHandle) -> Result<UiHandle> {
        bail!("no menu in this fake")
    }
}

struct ScriptedInput {
    accept: bool,
    fail: bool,
    calls: AtomicU32,
    last_text: Mutex<Option<String>>,
}

impl ScriptedInput {
    fn accepting() -> Arc<Self> {
        Arc::new(Self {
            accept: true,
            fail: false,
            calls: AtomicU32::new(0),
            last_text: Mutex::new(None),
        })
    }

    fn rejecting() -> Arc<Self> {
        Arc::new(Self {
            accept: false,
            fail: false,
            calls: AtomicU32::new(0),
            last_text: Mutex::new(None),
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            accept: false,
            fail: true,
            calls: AtomicU32::new(0),
            last_text: Mutex::new(None),
        })
    }
}

#[async_trait]
impl HumanizedInput for ScriptedInput {
    async fn type_into(&self, text: &str, _target: UiHandle) -> Result<bool> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            bail!("keystroke dispatch failed");
        }
        *self.last_text.lock().unwrap() = Some(text.to_string());
        Ok(self.accept)
    }
}

fn composer_with(has_composer: bool, input: Arc<ScriptedInput>) -> Composer {
    Composer::with_policy(
        Arc::new(FakeSurface { has_composer }),
        input,
        RetryPolicy::new(3, Duration::ZERO),
    )
}

fn chat(dead: bool) -> Chat {
    Chat::new(
        "Alice",
        Arc::new(ChatRow {
            dead,
            clicks: AtomicU32::new(0),
        }),
    )
}

#[tokio::test]
async fn test_send_types_into_the_composer_after_selection() {
    let input = ScriptedInput::accepting();
    let composer = composer_with(true, Arc::clone(&input));

    let sent = composer.send(&chat(false), "on my way").await.unwrap();

    assert!(sent);
    assert_eq!(input.calls.load(Ordering::SeqCst), 1);
    assert_eq!(input.last_text.lock().unwrap().as_deref(), Some("on my way"));
}

#[tokio::test]
async fn test_rejected_input_propagates_false() {
    let input = ScriptedInput::rejecting();
    let composer = composer_with(true, Arc::clone(&input));

    let sent = composer.send(&chat(false), "hello?").await.unwrap();

    assert!(!sent);
    assert_eq!(input.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_missing_composer_is_a_fetch_failure() {
    let input = ScriptedInput::accepting();
    let composer = composer_with(false, Arc::clone(&input));

    let err = composer.send(&chat(false), "hello?").await.unwrap_err();

    assert!(matches!(
        err,
        SiphonError::ChatFetchFailed(ref detail) if detail.contains("composer")
    ));
    assert_eq!(input.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_input_failure_is_not_recoverable() {
    let composer = composer_with(true, ScriptedInput::failing());

    let err = composer.send(&chat(false), "hello?").await.unwrap_err();

    assert!(matches!(err, SiphonError::Internal(_)));
    assert!(!err.is_recoverable());
}

#[tokio::test]
async fn test_unfocusable_chat_exhausts_the_guard() {
    let input = ScriptedInput::accepting();
    let composer = composer_with(true, Arc::clone(&input));

    let err = composer.send(&chat(true), "hello?").await.unwrap_err();

    assert!(matches!(
        err,
        SiphonError::PreconditionFailed { ref op, attempts: 3, .. } if op == "send"
    ));
    assert_eq!(input.calls.load(Ordering::SeqCst), 0);
}
