use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::config::{Config, load_config};
use crate::fingerprint::{FileFingerprintProvider, FingerprintProvider};
use crate::keys;
use crate::model::StoredMessage;
use crate::storage::{MessageStore, StoreOptions};

#[derive(Parser)]
#[command(name = "chatsiphon")]
#[command(about = "Browser-driven chat ingestion pipeline", version)]
pub struct Cli {
    /// Config file path (default: ~/.chatsiphon/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Message database path (overrides config)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the most recently stored messages
    Recent {
        #[arg(long, short = 'n', default_value_t = 20)]
        limit: u32,
        #[arg(long, default_value_t = 0)]
        offset: u32,
        /// Print rows as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show one chat's stored messages, oldest first
    Chat {
        /// Normalized chat id (trimmed, lowercased display name)
        chat_id: String,
        /// Print rows as JSON
        #[arg(long)]
        json: bool,
    },
    /// Check whether a message is already stored
    Exists {
        /// Dedup key, or a bare external id
        key: String,
    },
    /// Show store location and counters
    Status,
    /// Show the profile's browser fingerprint, creating it on first use
    Fingerprint,
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    let db_path = cli
        .db
        .unwrap_or_else(|| config.storage.resolved_db_path());
    let opts = config.storage.store_options();

    match cli.command {
        Commands::Recent {
            limit,
            offset,
            json,
        } => {
            recent_command(&db_path, opts, limit, offset, json).await?;
        }
        Commands::Chat { chat_id, json } => {
            chat_command(&db_path, opts, &chat_id, json).await?;
        }
        Commands::Exists { key } => {
            exists_command(&db_path, opts, &key).await?;
        }
        Commands::Status => {
            let config_path = match cli.config {
                Some(path) => path,
                None => crate::config::get_config_path()?,
            };
            status_command(&config, &config_path, &db_path, opts).await?;
        }
        Commands::Fingerprint => {
            fingerprint_command(&config.resolved_profile_dir())?;
        }
    }

    Ok(())
}

async fn recent_command(
    db_path: &Path,
    opts: StoreOptions,
    limit: u32,
    offset: u32,
    json: bool,
) -> Result<()> {
    let store = MessageStore::open(db_path, opts)?;
    let rows = store.query_recent(limit, offset);
    print_rows(&rows, json)?;
    store.shutdown().await;
    Ok(())
}

async fn chat_command(db_path: &Path, opts: StoreOptions, chat_id: &str, json: bool) -> Result<()> {
    let store = MessageStore::open(db_path, opts)?;
    let rows = store.query_by_chat(&keys::chat_key(chat_id));
    print_rows(&rows, json)?;
    store.shutdown().await;
    Ok(())
}

async fn exists_command(db_path: &Path, opts: StoreOptions, key: &str) -> Result<()> {
    let dedup_key = normalize_key(key);
    let store = MessageStore::open(db_path, opts)?;
    let found = store.exists(&dedup_key)?;
    if found {
        println!("{dedup_key} ✓ stored");
    } else {
        println!("{dedup_key} ✗ not stored");
    }
    store.shutdown().await;
    Ok(())
}

async fn status_command(
    config: &Config,
    config_path: &Path,
    db_path: &Path,
    opts: StoreOptions,
) -> Result<()> {
    println!("chatsiphon {}\n", crate::VERSION);
    println!(
        "Config: {} {}",
        config_path.display(),
        if config_path.exists() { "✓" } else { "(defaults)" }
    );
    println!(
        "Database: {} {}",
        db_path.display(),
        if db_path.exists() { "✓" } else { "(new)" }
    );
    println!(
        "Writer: batch {} / flush {}ms",
        config.storage.batch_size, config.storage.flush_interval_ms
    );

    let store = MessageStore::open(db_path, opts)?;
    let stats = store.stats()?;
    println!("\nMessages: {}", stats.total_messages);
    println!("Chats: {}", stats.distinct_chats);
    println!(
        "Incoming: {} / Outgoing: {}",
        stats.incoming, stats.outgoing
    );
    store.shutdown().await;
    Ok(())
}

fn fingerprint_command(profile_dir: &Path) -> Result<()> {
    let provider = FileFingerprintProvider::new();
    let data = provider.get_or_create(profile_dir)?;
    println!("{}", serde_json::to_string_pretty(&data)?);
    Ok(())
}

fn print_rows(rows: &[StoredMessage], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(rows)?);
        return Ok(());
    }
    if rows.is_empty() {
        println!("No messages.");
        return Ok(());
    }
    for row in rows {
        println!("{}", format_row(row));
    }
    Ok(())
}

fn format_row(row: &StoredMessage) -> String {
    let marker = if row.direction == "incoming" { "<-" } else { "->" };
    format!(
        "{} {} [{}] {}: {}",
        row.observed_at, marker, row.chat_id, row.dedup_key, row.content
    )
}

/// Accepts either a full dedup key or a bare external id.
fn normalize_key(key: &str) -> String {
    if key.starts_with(keys::MESSAGE_KEY_PREFIX) {
        key.to_string()
    } else {
        keys::message_key(key)
    }
}
