//! Capability traits over the live page.
//!
//! The pipeline never sees selector syntax. It works against generic element
//! capabilities and abstract part names; a page backend maps both onto
//! whatever query language it drives the browser with. Everything here is
//! object-safe so fakes can stand in for a real page in tests.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

/// Shared handle to one live element.
pub type UiHandle = Arc<dyn UiElement>;

/// Abstract names for sub-parts of an element.
///
/// Backends translate these to their own selectors; the pipeline only ever
/// names the part it wants.
pub mod parts {
    /// Marker present on messages received from the remote party.
    pub const INCOMING: &str = "incoming";
    /// Unread-count badge on a chat row.
    pub const UNREAD_BADGE: &str = "unread-badge";
    /// Title region of a chat row.
    pub const TITLE: &str = "title";
}

/// One live element on the page.
///
/// Handles stay valid only while the page state persists; a stale handle
/// surfaces as an `Err` from any of these calls.
#[async_trait]
pub trait UiElement: Send + Sync {
    /// Clicks the element.
    async fn click(&self) -> Result<()>;

    /// Primary readable text of the element (chat title, message body).
    async fn text(&self) -> Result<String>;

    /// Reads an attribute; `Ok(None)` when the attribute is absent.
    async fn attr(&self, name: &str) -> Result<Option<String>>;

    /// Lazy query over a named sub-part of this element (see [`parts`]).
    fn part(&self, name: &str) -> Arc<dyn ElementQuery>;
}

/// A lazy query over rendered elements.
///
/// Each call re-evaluates against live page state, which is what lets
/// callers poll for late-rendering content.
#[async_trait]
pub trait ElementQuery: Send + Sync {
    /// Number of elements currently matching.
    async fn count(&self) -> Result<usize>;

    /// Handle to the i-th match (rendered order). Errs when out of range.
    async fn nth(&self, index: usize) -> Result<UiHandle>;
}

/// The open chat application page.
#[async_trait]
pub trait ChatSurface: Send + Sync {
    /// Query over currently rendered chat rows, top to bottom.
    fn chats(&self) -> Arc<dyn ElementQuery>;

    /// Query over message rows of the currently opened chat.
    fn messages(&self) -> Arc<dyn ElementQuery>;

    /// The composer input of the currently opened chat.
    async fn composer(&self) -> Result<UiHandle>;

    /// Opens the given chat row's menu and resolves the mark-as-unread control.
    async fn mark_unread_control(&self, chat: &UiHandle) -> Result<UiHandle>;
}
