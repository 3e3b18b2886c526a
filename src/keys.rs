//! Stable identity derivation for chats and messages.
//!
//! Two independently-scraped representations of the same chat or message must
//! collapse to equal keys, so every identity comparison in the pipeline goes
//! through these two helpers.

pub const MESSAGE_KEY_PREFIX: &str = "msg::";

/// Derives the stable chat id from a display name.
///
/// Trimmed and case-folded. Not globally unique when two chats share a
/// display name; the listing layer accepts that.
pub fn chat_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Derives the durable dedup key from a platform-assigned message id.
pub fn message_key(external_id: &str) -> String {
    format!("{}{}", MESSAGE_KEY_PREFIX, external_id)
}
