//! Chat listing and selection against the live page.
//!
//! Listing polls the rendered chat rows until they appear, selection clicks a
//! row and reports whether the open took, and the unread helpers read or set
//! the row badge. Callers needing "chat is open" as a precondition wrap
//! [`ChatFetcher::select_chat`] with [`crate::retry::guarded`].

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::errors::{SiphonError, SiphonResult};
use crate::model::Chat;
use crate::ui::{ChatSurface, UiElement, parts};


pub struct ChatFetcher {
    surface: Arc<dyn ChatSurface>,
}

impl ChatFetcher {
    pub fn new(surface: Arc<dyn ChatSurface>) -> Self {
        Self { surface }
    }

    /// Lists up to `limit` currently rendered chats, polling the listing up
    /// to `retry` times while it is empty. Still empty afterwards is
    /// [`SiphonError::ChatListEmpty`]; any UI-layer failure surfaces as
    /// [`SiphonError::ChatFetchFailed`].
    pub async fn fetch_chats(&self, limit: usize, retry: u32) -> SiphonResult<Vec<Chat>> {
        let query = self.surface.chats();

        let mut count = 0usize;
        for attempt in 1..=retry {
            count = query
                .count()
                .await
                .map_err(|e| SiphonError::ChatFetchFailed(e.to_string()))?;
            if count > 0 {
                break;
            }
            debug!("Chat list empty on poll {}/{}", attempt, retry);
        }
        if count == 0 {
            return Err(SiphonError::ChatListEmpty { retries: retry });
        }

        let take = count.min(limit);
        let mut chats = Vec::with_capacity(take);
        for index in 0..take {
            let row = query
                .nth(index)
                .await
                .map_err(|e| SiphonError::ChatFetchFailed(e.to_string()))?;
            let name = chat_title(row.as_ref())
                .await
                .map_err(|e| SiphonError::ChatFetchFailed(e.to_string()))?;
            chats.push(Chat::new(name, row));
        }
        debug!("Fetched {} of {} rendered chat(s)", chats.len(), count);
        Ok(chats)
    }

    /// Clicks the chat row to open it. `None` fails immediately with
    /// [`SiphonError::ChatNotFound`]; there is nothing to retry against.
    /// A click the UI does not accept comes back as `Ok(false)` so a retry
    /// guard can poll it as a precondition.
    pub async fn select_chat(&self, chat: Option<&Chat>) -> SiphonResult<bool> {
        let Some(chat) = chat else {
            return Err(SiphonError::ChatNotFound("no chat handle supplied".into()));
        };
        match chat.ui.click().await {
            Ok(()) => {
                debug!("Opened chat {}", chat.id);
                Ok(true)
            }
            Err(e) => {
                warn!("Open click failed for chat {}: {}", chat.id, e);
                Ok(false)
            }
        }
    }

    /// Unread count from the row badge; 0 when no badge is rendered. A badge
    /// without a readable number (a plain dot marker) counts as 1.
    pub async fn is_unread(&self, chat: &Chat) -> SiphonResult<u32> {
        let badge = chat.ui.part(parts::UNREAD_BADGE);
        let present = badge
            .count()
            .await
            .map_err(|e| SiphonError::ChatFetchFailed(format!("unread badge: {}", e)))?;
        if present == 0 {
            return Ok(0);
        }
        let text = badge
            .nth(0)
            .await
            .map_err(|e| SiphonError::ChatFetchFailed(format!("unread badge: {}", e)))?
            .text()
            .await
            .map_err(|e| SiphonError::ChatFetchFailed(format!("unread badge: {}", e)))?;
        Ok(text.trim().parse().unwrap_or(1))
    }

    /// Flags the chat unread. Idempotent: an already-unread chat logs and
    /// succeeds without touching the menu.
    pub async fn mark_unread(&self, chat: &Chat) -> SiphonResult<bool> {
        if self.is_unread(chat).await? > 0 {
            debug!("Chat {} already unread", chat.id);
            return Ok(true);
        }
        let control = self
            .surface
            .mark_unread_control(&chat.ui)
            .await
            .map_err(|e| {
                SiphonError::ChatFetchFailed(format!("mark-unread control for {}: {}", chat.id, e))
            })?;
        control.click().await.map_err(|e| {
            SiphonError::ChatFetchFailed(format!("mark-unread click for {}: {}", chat.id, e))
        })?;
        info!("Marked chat {} unread", chat.id);
        Ok(true)
    }
}

/// Display name of a chat row: the title part when the backend renders one,
/// the row's own text otherwise.
async fn chat_title(row: &dyn UiElement) -> anyhow::Result<String> {
    let title = row.part(parts::TITLE);
    if title.count().await? > 0 {
        return title.nth(0).await?.text().await;
    }
    row.text().await
}
