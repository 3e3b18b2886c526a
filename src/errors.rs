use thiserror::Error;

/// Typed error hierarchy for chatsiphon.
///
/// Use at module boundaries (chat listing, message extraction passes, storage calls).
/// Internal/leaf functions can continue using `anyhow::Result`; the `Internal` variant
/// allows seamless conversion via the `?` operator.
#[derive(Debug, Error)]
pub enum SiphonError {
    #[error("Precondition failed: {op} on {target}: not satisfied after {attempts} attempts")]
    PreconditionFailed {
        op: String,
        target: String,
        attempts: u32,
    },

    #[error("Chat not found: {0}")]
    ChatNotFound(String),

    #[error("Chat list empty after {retries} retries")]
    ChatListEmpty { retries: u32 },

    #[error("Chat fetch failed: {0}")]
    ChatFetchFailed(String),

    #[error("Message list empty in chat {chat} after {retries} retries")]
    MessageListEmpty { chat: String, retries: u32 },

    #[error("Message extraction failed in chat {chat}: {message}")]
    MessageProcessorFailed { chat: String, message: String },

    #[error("Storage initialization failed: {0}")]
    StorageInitFailed(String),

    #[error("Storage not initialized")]
    StorageNotInitialized,

    #[error("Batch insert failed: {0}")]
    BatchInsertFailed(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Convenience alias for results using SiphonError.
pub type SiphonResult<T> = std::result::Result<T, SiphonError>;

impl SiphonError {
    /// Whether the pipeline can keep going after this error (skip the affected
    /// chat or batch, move on) rather than abort.
    ///
    /// Storage bootstrap failures are fatal: there is no degraded mode
    /// without durable storage.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            SiphonError::StorageInitFailed(_)
                | SiphonError::StorageNotInitialized
                | SiphonError::Internal(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precondition_failed_display() {
        let err = SiphonError::PreconditionFailed {
            op: "select_chat".into(),
            target: "alice".into(),
            attempts: 3,
        };
        assert_eq!(
            err.to_string(),
            "Precondition failed: select_chat on alice: not satisfied after 3 attempts"
        );
    }

    #[test]
    fn test_chat_list_empty_display() {
        let err = SiphonError::ChatListEmpty { retries: 2 };
        assert_eq!(err.to_string(), "Chat list empty after 2 retries");
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_message_list_empty_carries_chat() {
        let err = SiphonError::MessageListEmpty {
            chat: "work group".into(),
            retries: 3,
        };
        assert_eq!(
            err.to_string(),
            "Message list empty in chat work group after 3 retries"
        );
    }

    #[test]
    fn test_storage_failures_not_recoverable() {
        assert!(!SiphonError::StorageInitFailed("disk full".into()).is_recoverable());
        assert!(!SiphonError::StorageNotInitialized.is_recoverable());
    }

    #[test]
    fn test_batch_insert_failed_recoverable() {
        let err = SiphonError::BatchInsertFailed("constraint".into());
        assert_eq!(err.to_string(), "Batch insert failed: constraint");
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_internal_from_anyhow() {
        let anyhow_err = anyhow::anyhow!("page went away");
        let err: SiphonError = anyhow_err.into();
        assert!(matches!(err, SiphonError::Internal(_)));
        assert!(!err.is_recoverable());
    }
}
