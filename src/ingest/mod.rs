//! One-chat pipeline runner: select, extract, dedup, enqueue.

use tracing::{debug, info};

use crate::chats::ChatFetcher;
use crate::errors::SiphonResult;
use crate::extractor::MessageExtractor;
use crate::filter::{self, ContentFilter};
use crate::model::Chat;
use crate::retry::{self, RetryPolicy};
use crate::storage::MessageStore;


/// Knobs for one ingestion pass.
#[derive(Debug, Clone, Copy)]
pub struct IngestOptions {
    /// Empty-list poll budget handed to the extractor.
    pub message_retries: u32,
    /// Policy guarding the chat-selection precondition.
    pub policy: RetryPolicy,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            message_retries: 3,
            policy: RetryPolicy::default(),
        }
    }
}

/// Composes the per-chat pipeline over one store.
///
/// Which chats to run, and when, is the caller's business. A pass is
/// idempotent: everything already persisted is filtered out before the queue,
/// and the unique dedup index catches whatever slips through in between.
pub struct ChatIngestor {
    fetcher: ChatFetcher,
    extractor: MessageExtractor,
    store: MessageStore,
    content_filter: Option<ContentFilter>,
    opts: IngestOptions,
}

impl ChatIngestor {
    pub fn new(fetcher: ChatFetcher, extractor: MessageExtractor, store: MessageStore) -> Self {
        Self::with_options(fetcher, extractor, store, IngestOptions::default())
    }

    pub fn with_options(
        fetcher: ChatFetcher,
        extractor: MessageExtractor,
        store: MessageStore,
        opts: IngestOptions,
    ) -> Self {
        Self {
            fetcher,
            extractor,
            store,
            content_filter: None,
            opts,
        }
    }

    /// Installs a content predicate applied after dedup; messages it rejects
    /// never reach the queue.
    #[must_use]
    pub fn with_content_filter(mut self, filter: ContentFilter) -> Self {
        self.content_filter = Some(filter);
        self
    }

    /// Runs one pass over `chat`: focus it (guarded precondition), extract
    /// the visible messages, drop known and filtered ones, hand the rest to
    /// the writer. Returns how many messages were enqueued.
    pub async fn ingest_chat(&self, chat: &Chat) -> SiphonResult<usize> {
        let fetcher = &self.fetcher;
        retry::guarded(
            "ingest_chat",
            &chat.id,
            chat.clone(),
            self.opts.policy,
            |c| async move { fetcher.select_chat(Some(&c)).await },
            |c| async move { self.extract_and_enqueue(&c).await },
        )
        .await
    }

    async fn extract_and_enqueue(&self, chat: &Chat) -> SiphonResult<usize> {
        let extracted = self
            .extractor
            .extract_messages(chat, self.opts.message_retries)
            .await?;
        let fresh = filter::filter_new(extracted, &self.store)?;
        let kept = filter::apply_content_filter(fresh, self.content_filter.as_ref());

        if kept.is_empty() {
            debug!("Nothing new in chat {}", chat.id);
            return Ok(0);
        }
        let queued = kept.len();
        self.store.enqueue(kept);
        info!("Enqueued {} new message(s) from chat {}", queued, chat.id);
        Ok(queued)
    }
}
