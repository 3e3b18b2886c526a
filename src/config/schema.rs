use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::extractor::ExtractorOptions;
use crate::retry::RetryPolicy;
use crate::storage::StoreOptions;
use crate::utils::expand_path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_db_path", rename = "dbPath")]
    pub db_path: String,
    #[serde(default = "default_batch_size", rename = "batchSize")]
    pub batch_size: usize,
    #[serde(default = "default_flush_interval_ms", rename = "flushIntervalMs")]
    pub flush_interval_ms: u64,
}

fn default_db_path() -> String {
    "~/.chatsiphon/messages.db".to_string()
}

fn default_batch_size() -> usize {
    10
}

fn default_flush_interval_ms() -> u64 {
    500
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            batch_size: default_batch_size(),
            flush_interval_ms: default_flush_interval_ms(),
        }
    }
}

impl StorageConfig {
    pub fn resolved_db_path(&self) -> PathBuf {
        expand_path(&self.db_path)
    }

    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            batch_size: self.batch_size,
            flush_interval: Duration::from_millis(self.flush_interval_ms),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeConfig {
    #[serde(default = "default_chat_limit", rename = "chatLimit")]
    pub chat_limit: usize,
    #[serde(default = "default_list_retries", rename = "listRetries")]
    pub list_retries: u32,
    #[serde(default = "default_message_retries", rename = "messageRetries")]
    pub message_retries: u32,
    #[serde(default = "default_external_id_attr", rename = "externalIdAttr")]
    pub external_id_attr: String,
    #[serde(default = "default_id_retries", rename = "idRetries")]
    pub id_retries: u32,
}

fn default_chat_limit() -> usize {
    10
}

fn default_list_retries() -> u32 {
    3
}

fn default_message_retries() -> u32 {
    3
}

fn default_external_id_attr() -> String {
    "data-id".to_string()
}

fn default_id_retries() -> u32 {
    3
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            chat_limit: default_chat_limit(),
            list_retries: default_list_retries(),
            message_retries: default_message_retries(),
            external_id_attr: default_external_id_attr(),
            id_retries: default_id_retries(),
        }
    }
}

impl ScrapeConfig {
    pub fn extractor_options(&self) -> ExtractorOptions {
        ExtractorOptions {
            id_attr: self.external_id_attr.clone(),
            id_retries: self.id_retries,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts", rename = "maxAttempts")]
    pub max_attempts: u32,
    #[serde(default = "default_delay_ms", rename = "delayMs")]
    pub delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_delay_ms() -> u64 {
    500
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            delay_ms: default_delay_ms(),
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, Duration::from_millis(self.delay_ms))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub scrape: ScrapeConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default = "default_profile_dir", rename = "profileDir")]
    pub profile_dir: String,
}

fn default_profile_dir() -> String {
    "~/.chatsiphon/profile".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            scrape: ScrapeConfig::default(),
            retry: RetryConfig::default(),
            profile_dir: default_profile_dir(),
        }
    }
}

impl Config {
    pub fn resolved_profile_dir(&self) -> PathBuf {
        expand_path(&self.profile_dir)
    }
}
