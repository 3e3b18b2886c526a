//! SQLite-backed message store with a single background writer.
//!
//! Producers hand observed messages to [`MessageStore::enqueue`] and move on;
//! exactly one writer task drains the in-process queue and batch-inserts
//! rows, flushing when the batch fills or the flush interval lapses with
//! items pending. All inserts go through the writer; existence checks and
//! report queries take brief point-lookup locks on the shared connection.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use anyhow::Context;
use rusqlite::{Connection, params};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::errors::{SiphonError, SiphonResult};
use crate::model::{Message, StoredMessage};


/// Batch and flush tuning for the writer loop.
#[derive(Debug, Clone, Copy)]
pub struct StoreOptions {
    /// Messages accumulated before a durable flush.
    pub batch_size: usize,
    /// Longest a non-empty batch waits before flushing anyway.
    pub flush_interval: Duration,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            batch_size: 10,
            flush_interval: Duration::from_millis(500),
        }
    }
}

/// Aggregate counters for the status report.
#[derive(Debug, Clone, Copy)]
pub struct StoreStats {
    pub total_messages: i64,
    pub distinct_chats: i64,
    pub incoming: i64,
    pub outgoing: i64,
}

/// Durable message store plus the queue feeding its writer loop.
///
/// Cheap to clone; clones share the connection, queue and writer. The
/// meaningful call order is `initialize` → `create_table` → `start_writer`,
/// after which producers may `enqueue` from any task. [`MessageStore::open`]
/// bundles the first two steps.
#[derive(Clone)]
pub struct MessageStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    db_path: PathBuf,
    opts: StoreOptions,
    conn: Mutex<Option<Connection>>,
    tx: UnboundedSender<Message>,
    // Taken exactly once, by the writer task.
    rx: tokio::sync::Mutex<Option<UnboundedReceiver<Message>>>,
    writer: tokio::sync::Mutex<Option<JoinHandle<()>>>,
    shutdown: CancellationToken,
}

impl MessageStore {
    pub fn new(db_path: impl Into<PathBuf>, opts: StoreOptions) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            inner: Arc::new(StoreInner {
                db_path: db_path.into(),
                opts,
                conn: Mutex::new(None),
                tx,
                rx: tokio::sync::Mutex::new(Some(rx)),
                writer: tokio::sync::Mutex::new(None),
                shutdown: CancellationToken::new(),
            }),
        }
    }

    /// Convenience constructor: `new` + `initialize` + `create_table`.
    pub fn open(db_path: impl Into<PathBuf>, opts: StoreOptions) -> SiphonResult<Self> {
        let store = Self::new(db_path, opts);
        store.initialize()?;
        store.create_table()?;
        Ok(store)
    }

    /// Opens the SQLite connection. Fatal on failure; nothing else on the
    /// store is valid until this succeeds.
    pub fn initialize(&self) -> SiphonResult<()> {
        if let Some(parent) = self
            .inner
            .db_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                SiphonError::StorageInitFailed(format!(
                    "could not create {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let conn = Connection::open(&self.inner.db_path)
            .map_err(|e| SiphonError::StorageInitFailed(e.to_string()))?;
        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA synchronous=NORMAL;
             PRAGMA busy_timeout=3000;",
        )
        .map_err(|e| SiphonError::StorageInitFailed(e.to_string()))?;

        *self.inner.lock_conn()? = Some(conn);
        info!("Message store opened at {}", self.inner.db_path.display());
        Ok(())
    }

    /// Creates the messages table and the dedup-key index if absent.
    pub fn create_table(&self) -> SiphonResult<()> {
        let guard = self.inner.lock_conn()?;
        let conn = guard.as_ref().ok_or(SiphonError::StorageNotInitialized)?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS messages (
                id INTEGER PRIMARY KEY,
                dedup_key TEXT NOT NULL UNIQUE,
                content TEXT NOT NULL,
                content_type TEXT,
                direction TEXT NOT NULL,
                chat_name TEXT NOT NULL,
                chat_id TEXT NOT NULL,
                observed_at TEXT NOT NULL
            )",
            [],
        )
        .context("Failed to create messages table")?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_messages_dedup_key ON messages(dedup_key)",
            [],
        )
        .context("Failed to create dedup-key index")?;

        Ok(())
    }

    /// Queues messages for the writer, preserving their order. Empty input is
    /// a no-op. Returns as soon as the items are queued; durability follows
    /// on the next flush.
    pub fn enqueue(&self, messages: Vec<Message>) {
        if messages.is_empty() {
            return;
        }
        if self.inner.shutdown.is_cancelled() {
            warn!(
                "Store is shut down; dropping {} message(s)",
                messages.len()
            );
            return;
        }
        let queued = messages.len();
        for msg in messages {
            if self.inner.tx.send(msg).is_err() {
                warn!("Writer queue closed; dropping enqueued messages");
                return;
            }
        }
        debug!("Enqueued {} message(s) for persistence", queued);
    }

    /// Starts the background writer. A second start logs a warning and does
    /// nothing.
    pub async fn start_writer(&self) {
        let mut writer = self.inner.writer.lock().await;
        let Some(rx) = self.inner.rx.lock().await.take() else {
            warn!("Writer task already running");
            return;
        };
        let inner = self.inner.clone();
        *writer = Some(tokio::spawn(writer_loop(inner, rx)));
        debug!("Writer task started");
    }

    /// Durably inserts a batch now, bypassing the queue. Messages whose row
    /// conversion fails are logged and skipped; a storage-layer failure drops
    /// the whole batch with [`SiphonError::BatchInsertFailed`]. Returns the
    /// number of rows actually inserted (duplicates are ignored by the
    /// dedup-key constraint and do not count).
    pub fn insert_batch(&self, messages: &[Message]) -> SiphonResult<usize> {
        self.inner.insert_batch(messages)
    }

    /// Point lookup on the dedup key.
    pub fn exists(&self, dedup_key: &str) -> SiphonResult<bool> {
        let guard = self.inner.lock_conn()?;
        let conn = guard.as_ref().ok_or(SiphonError::StorageNotInitialized)?;
        let hits: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM messages WHERE dedup_key = ?1",
                params![dedup_key],
                |row| row.get(0),
            )
            .context("Existence check failed")?;
        Ok(hits > 0)
    }

    /// Most recently inserted rows first. Read failures log and return empty;
    /// reads are reporting, never on the ingestion path.
    pub fn query_recent(&self, limit: u32, offset: u32) -> Vec<StoredMessage> {
        match self.inner.fetch_recent(limit, offset) {
            Ok(rows) => rows,
            Err(e) => {
                warn!("Recent-messages query failed: {}", e);
                Vec::new()
            }
        }
    }

    /// All rows for one chat id, oldest first. Read failures log and return
    /// empty.
    pub fn query_by_chat(&self, chat_id: &str) -> Vec<StoredMessage> {
        match self.inner.fetch_by_chat(chat_id) {
            Ok(rows) => rows,
            Err(e) => {
                warn!("Chat query failed for {}: {}", chat_id, e);
                Vec::new()
            }
        }
    }

    /// Aggregate counters for diagnostics.
    pub fn stats(&self) -> SiphonResult<StoreStats> {
        self.inner.stats()
    }

    /// Stops the writer (flushing anything pending), then closes the
    /// connection. Safe to call when the writer never started, and safe to
    /// call twice.
    pub async fn shutdown(&self) {
        self.inner.shutdown.cancel();

        let handle = self.inner.writer.lock().await.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!("Writer task ended abnormally: {}", e);
            }
        }

        match self.inner.lock_conn() {
            Ok(mut guard) => {
                if guard.take().is_some() {
                    debug!("Message store connection closed");
                }
            }
            Err(e) => warn!("Could not close connection cleanly: {}", e),
        }
        info!("Message store shut down");
    }

    /// Path of the backing database file.
    pub fn db_path(&self) -> &std::path::Path {
        &self.inner.db_path
    }
}

async fn writer_loop(inner: Arc<StoreInner>, mut rx: UnboundedReceiver<Message>) {
    let mut batch: Vec<Message> = Vec::new();
    loop {
        tokio::select! {
            () = inner.shutdown.cancelled() => {
                // Pull whatever is already queued so shutdown never strands
                // accepted messages.
                while let Ok(msg) = rx.try_recv() {
                    batch.push(msg);
                }
                break;
            }
            polled = tokio::time::timeout(inner.opts.flush_interval, rx.recv()) => {
                match polled {
                    Ok(Some(msg)) => {
                        batch.push(msg);
                        if batch.len() >= inner.opts.batch_size {
                            flush(&inner, &mut batch);
                        }
                    }
                    // All senders gone; final flush happens below.
                    Ok(None) => break,
                    Err(_elapsed) => {
                        if !batch.is_empty() {
                            flush(&inner, &mut batch);
                        }
                    }
                }
            }
        }
    }
    if !batch.is_empty() {
        flush(&inner, &mut batch);
    }
    debug!("Writer task stopped");
}

/// One durable flush. Failures are logged and the batch is dropped; the
/// writer itself must survive any single bad batch.
fn flush(inner: &StoreInner, batch: &mut Vec<Message>) {
    let pending: Vec<Message> = batch.drain(..).collect();
    if let Err(e) = inner.insert_batch(&pending) {
        error!("Writer loop error: {}", e);
    }
}

impl StoreInner {
    fn lock_conn(&self) -> SiphonResult<MutexGuard<'_, Option<Connection>>> {
        Ok(self
            .conn
            .lock()
            .map_err(|e| anyhow::anyhow!("DB lock poisoned: {}", e))?)
    }

    fn insert_batch(&self, messages: &[Message]) -> SiphonResult<usize> {
        let mut guard = self.lock_conn()?;
        let conn = guard.as_mut().ok_or(SiphonError::StorageNotInitialized)?;

        let mut rows = Vec::with_capacity(messages.len());
        for msg in messages {
            match RowValues::try_from_message(msg) {
                Ok(row) => rows.push(row),
                Err(e) => warn!("Skipping message with unusable row data: {}", e),
            }
        }
        if rows.is_empty() {
            return Ok(0);
        }

        let tx = conn
            .transaction()
            .map_err(|e| SiphonError::BatchInsertFailed(e.to_string()))?;
        let mut inserted = 0usize;
        {
            let mut stmt = tx
                .prepare_cached(
                    "INSERT OR IGNORE INTO messages
                        (dedup_key, content, content_type, direction,
                         chat_name, chat_id, observed_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                )
                .map_err(|e| SiphonError::BatchInsertFailed(e.to_string()))?;
            for row in &rows {
                inserted += stmt
                    .execute(params![
                        row.dedup_key,
                        row.content,
                        row.content_type,
                        row.direction,
                        row.chat_name,
                        row.chat_id,
                        row.observed_at,
                    ])
                    .map_err(|e| SiphonError::BatchInsertFailed(e.to_string()))?;
            }
        }
        tx.commit()
            .map_err(|e| SiphonError::BatchInsertFailed(e.to_string()))?;

        debug!("Flushed {} of {} message(s)", inserted, rows.len());
        Ok(inserted)
    }

    fn fetch_recent(&self, limit: u32, offset: u32) -> SiphonResult<Vec<StoredMessage>> {
        let guard = self.lock_conn()?;
        let conn = guard.as_ref().ok_or(SiphonError::StorageNotInitialized)?;

        let mut stmt = conn
            .prepare(
                "SELECT id, dedup_key, content, content_type, direction,
                        chat_name, chat_id, observed_at
                 FROM messages ORDER BY id DESC LIMIT ?1 OFFSET ?2",
            )
            .context("Failed to prepare recent-messages query")?;
        let rows = stmt
            .query_map(params![limit, offset], stored_message_from_row)
            .context("Recent-messages query failed")?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read recent-messages rows")?;
        Ok(rows)
    }

    fn fetch_by_chat(&self, chat_id: &str) -> SiphonResult<Vec<StoredMessage>> {
        let guard = self.lock_conn()?;
        let conn = guard.as_ref().ok_or(SiphonError::StorageNotInitialized)?;

        let mut stmt = conn
            .prepare(
                "SELECT id, dedup_key, content, content_type, direction,
                        chat_name, chat_id, observed_at
                 FROM messages WHERE chat_id = ?1 ORDER BY id ASC",
            )
            .context("Failed to prepare chat query")?;
        let rows = stmt
            .query_map(params![chat_id], stored_message_from_row)
            .context("Chat query failed")?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read chat rows")?;
        Ok(rows)
    }

    fn stats(&self) -> SiphonResult<StoreStats> {
        let guard = self.lock_conn()?;
        let conn = guard.as_ref().ok_or(SiphonError::StorageNotInitialized)?;

        let (total, chats): (i64, i64) = conn
            .query_row(
                "SELECT COUNT(*), COUNT(DISTINCT chat_id) FROM messages",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .context("Stats query failed")?;
        let incoming: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM messages WHERE direction = 'incoming'",
                [],
                |row| row.get(0),
            )
            .context("Stats query failed")?;

        Ok(StoreStats {
            total_messages: total,
            distinct_chats: chats,
            incoming,
            outgoing: total - incoming,
        })
    }
}

struct RowValues<'a> {
    dedup_key: &'a str,
    content: &'a str,
    content_type: Option<&'a str>,
    direction: &'static str,
    chat_name: &'a str,
    chat_id: &'a str,
    observed_at: String,
}

impl<'a> RowValues<'a> {
    /// A message without a usable external id or chat id cannot be stored; it
    /// has no durable identity.
    fn try_from_message(msg: &'a Message) -> anyhow::Result<Self> {
        if msg.external_id.trim().is_empty() {
            anyhow::bail!("message in chat {} has an empty external id", msg.chat_id);
        }
        if msg.chat_id.trim().is_empty() {
            anyhow::bail!("message {} has an empty chat id", msg.dedup_key);
        }
        Ok(Self {
            dedup_key: &msg.dedup_key,
            content: &msg.content,
            content_type: msg.content_type.as_deref(),
            direction: msg.direction.as_str(),
            chat_name: &msg.chat_name,
            chat_id: &msg.chat_id,
            observed_at: msg.observed_at.to_rfc3339(),
        })
    }
}

fn stored_message_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoredMessage> {
    Ok(StoredMessage {
        id: row.get(0)?,
        dedup_key: row.get(1)?,
        content: row.get(2)?,
        content_type: row.get(3)?,
        direction: row.get(4)?,
        chat_name: row.get(5)?,
        chat_id: row.get(6)?,
        observed_at: row.get(7)?,
    })
}
