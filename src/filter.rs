//! Pre-persistence filtering: dedup against the store, then an optional
//! caller-supplied content predicate.
//!
//! The dedup check here is advisory. The writer runs behind it, so the
//! unique index on the dedup key has the last word; anything that slips
//! through is discarded at insert time instead.

use std::sync::Arc;

use tracing::debug;

use crate::errors::SiphonResult;
use crate::model::Message;
use crate::storage::MessageStore;

/// Content predicate applied after dedup; `true` keeps the message.
pub type ContentFilter = Arc<dyn Fn(&Message) -> bool + Send + Sync>;

/// Drops messages whose dedup key is already persisted, preserving order.
pub fn filter_new(messages: Vec<Message>, store: &MessageStore) -> SiphonResult<Vec<Message>> {
    let total = messages.len();
    let mut fresh = Vec::with_capacity(total);
    for message in messages {
        if store.exists(&message.dedup_key)? {
            debug!("Already stored, skipping {}", message.dedup_key);
            continue;
        }
        fresh.push(message);
    }
    if fresh.len() < total {
        debug!(
            "Dedup dropped {} of {} extracted message(s)",
            total - fresh.len(),
            total
        );
    }
    Ok(fresh)
}

/// Applies the content predicate, if any. `None` keeps everything.
pub fn apply_content_filter(messages: Vec<Message>, filter: Option<&ContentFilter>) -> Vec<Message> {
    match filter {
        Some(keep) => messages.into_iter().filter(|m| keep(m)).collect(),
        None => messages,
    }
}
