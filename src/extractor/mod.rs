//! Message extraction from an opened chat.
//!
//! One pass walks the rendered message rows top to bottom, pulling content
//! text and the platform-assigned external id. Render lag is the normal
//! case, not the exception: an empty list is re-polled, and an element whose
//! id has not materialized yet gets its own bounded retry before the element
//! is skipped. A skipped element never aborts the pass.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::errors::{SiphonError, SiphonResult};
use crate::model::{Chat, Direction, Message};
use crate::ui::{ChatSurface, UiElement, parts};


/// Per-element scrape tuning.
#[derive(Debug, Clone)]
pub struct ExtractorOptions {
    /// Attribute carrying the platform message id.
    pub id_attr: String,
    /// How often to re-read a missing id before skipping the element.
    pub id_retries: u32,
}

impl Default for ExtractorOptions {
    fn default() -> Self {
        Self {
            id_attr: "data-id".into(),
            id_retries: 3,
        }
    }
}

pub struct MessageExtractor {
    surface: Arc<dyn ChatSurface>,
    opts: ExtractorOptions,
}

impl MessageExtractor {
    pub fn new(surface: Arc<dyn ChatSurface>) -> Self {
        Self::with_options(surface, ExtractorOptions::default())
    }

    pub fn with_options(surface: Arc<dyn ChatSurface>, opts: ExtractorOptions) -> Self {
        Self { surface, opts }
    }

    /// Scrapes the currently visible messages of `chat`, which must already
    /// be open. Polls an empty list up to `retry` times before failing with
    /// [`SiphonError::MessageListEmpty`]; any UI-layer failure in the pass
    /// surfaces as a single [`SiphonError::MessageProcessorFailed`]. Output
    /// preserves rendered order.
    pub async fn extract_messages(&self, chat: &Chat, retry: u32) -> SiphonResult<Vec<Message>> {
        let query = self.surface.messages();

        let mut count = 0usize;
        for attempt in 1..=retry {
            count = query
                .count()
                .await
                .map_err(|e| pass_failed(chat, &e))?;
            if count > 0 {
                break;
            }
            debug!(
                "No messages rendered in chat {} (poll {}/{})",
                chat.id, attempt, retry
            );
        }
        if count == 0 {
            return Err(SiphonError::MessageListEmpty {
                chat: chat.id.clone(),
                retries: retry,
            });
        }

        let mut messages = Vec::with_capacity(count);
        for index in 0..count {
            let element = query.nth(index).await.map_err(|e| pass_failed(chat, &e))?;

            let Some(external_id) = self
                .scrape_id(element.as_ref())
                .await
                .map_err(|e| pass_failed(chat, &e))?
            else {
                warn!(
                    "Skipping message {} in chat {}: external id never rendered",
                    index, chat.id
                );
                continue;
            };

            let content = element.text().await.map_err(|e| pass_failed(chat, &e))?;
            let direction = classify_direction(element.as_ref())
                .await
                .map_err(|e| pass_failed(chat, &e))?;

            messages.push(
                Message::new(chat, direction, external_id, content, element)
                    .with_content_type("text"),
            );
        }

        debug!(
            "Extracted {} of {} rendered message(s) from chat {}",
            messages.len(),
            count,
            chat.id
        );
        Ok(messages)
    }

    /// Reads the id attribute, re-trying while it is absent or blank. `None`
    /// means the element stayed id-less through the whole budget.
    async fn scrape_id(&self, element: &dyn UiElement) -> anyhow::Result<Option<String>> {
        for attempt in 1..=self.opts.id_retries {
            if let Some(id) = element.attr(&self.opts.id_attr).await? {
                if !id.trim().is_empty() {
                    return Ok(Some(id));
                }
            }
            debug!(
                "{} not present yet (attempt {}/{})",
                self.opts.id_attr, attempt, self.opts.id_retries
            );
        }
        Ok(None)
    }
}

async fn classify_direction(element: &dyn UiElement) -> anyhow::Result<Direction> {
    let incoming = element.part(parts::INCOMING).count().await? > 0;
    Ok(if incoming {
        Direction::Incoming
    } else {
        Direction::Outgoing
    })
}

fn pass_failed(chat: &Chat, err: &anyhow::Error) -> SiphonError {
    SiphonError::MessageProcessorFailed {
        chat: chat.id.clone(),
        message: err.to_string(),
    }
}

/// Splits an extracted set by direction, preserving rendered order in both
/// halves.
pub fn partition_by_direction(messages: &[Message]) -> (Vec<Message>, Vec<Message>) {
    messages
        .iter()
        .cloned()
        .partition(|m| m.direction == Direction::Incoming)
}

/// Incoming subset of an extracted set; an empty subset is an error, matching
/// how callers treat a pass that produced nothing usable.
pub fn incoming_only(messages: &[Message]) -> SiphonResult<Vec<Message>> {
    direction_subset(messages, Direction::Incoming)
}

/// Outgoing subset; same empty-set contract as [`incoming_only`].
pub fn outgoing_only(messages: &[Message]) -> SiphonResult<Vec<Message>> {
    direction_subset(messages, Direction::Outgoing)
}

fn direction_subset(messages: &[Message], direction: Direction) -> SiphonResult<Vec<Message>> {
    let subset: Vec<Message> = messages
        .iter()
        .filter(|m| m.direction == direction)
        .cloned()
        .collect();
    if subset.is_empty() {
        let chat = messages
            .first()
            .map_or_else(|| "unknown".to_string(), |m| m.chat_id.clone());
        return Err(SiphonError::MessageProcessorFailed {
            chat,
            message: format!("no {} messages in extracted set", direction.as_str()),
        });
    }
    Ok(subset)
}
