//! Outbound compose flow.
//!
//! Ingestion never depends on this path; it exists for reply flows layered on
//! top. Text entry itself is a collaborator concern behind [`HumanizedInput`],
//! keeping pacing and keystroke simulation out of the pipeline.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{debug, warn};

use crate::chats::ChatFetcher;
use crate::errors::{SiphonError, SiphonResult};
use crate::model::Chat;
use crate::retry::{self, RetryPolicy};
use crate::ui::{ChatSurface, UiHandle};

#[cfg(test)]
mod tests;

/// Human-paced text entry into a live element.
#[async_trait]
pub trait HumanizedInput: Send + Sync {
    /// Types `text` into `target`. `Ok(false)` means the page rejected the
    /// input without a hard failure.
    async fn type_into(&self, text: &str, target: UiHandle) -> Result<bool>;
}

pub struct Composer {
    surface: Arc<dyn ChatSurface>,
    fetcher: ChatFetcher,
    input: Arc<dyn HumanizedInput>,
    policy: RetryPolicy,
}

impl Composer {
    pub fn new(surface: Arc<dyn ChatSurface>, input: Arc<dyn HumanizedInput>) -> Self {
        Self::with_policy(surface, input, RetryPolicy::default())
    }

    pub fn with_policy(
        surface: Arc<dyn ChatSurface>,
        input: Arc<dyn HumanizedInput>,
        policy: RetryPolicy,
    ) -> Self {
        let fetcher = ChatFetcher::new(Arc::clone(&surface));
        Self {
            surface,
            fetcher,
            input,
            policy,
        }
    }

    /// Focuses `chat` behind the selection guard, then hands `text` to the
    /// input collaborator. `Ok(false)` reports the collaborator declining.
    pub async fn send(&self, chat: &Chat, text: &str) -> SiphonResult<bool> {
        let fetcher = &self.fetcher;
        retry::guarded(
            "send",
            &chat.id,
            chat.clone(),
            self.policy,
            |c| async move { fetcher.select_chat(Some(&c)).await },
            |c| async move { self.type_into_composer(&c, text).await },
        )
        .await
    }

    async fn type_into_composer(&self, chat: &Chat, text: &str) -> SiphonResult<bool> {
        let target = self
            .surface
            .composer()
            .await
            .map_err(|e| SiphonError::ChatFetchFailed(format!("composer: {e}")))?;

        let accepted = self
            .input
            .type_into(text, target)
            .await
            .context("Humanized input failed")?;
        if accepted {
            debug!("Composed {} char(s) into chat {}", text.len(), chat.id);
        } else {
            warn!("Input rejected for chat {}", chat.id);
        }
        Ok(accepted)
    }
}
