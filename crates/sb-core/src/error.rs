//! Errors raised by the persistence layer.

use thiserror::Error;

/// Failure of a durable store or of the channel feeding it.
///
/// None of these are fatal to the board: the caller logs and continues
/// with in-memory state.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not be opened (no IndexedDB, blocked upgrade, ...).
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A read or write request failed after the store opened.
    #[error("store request failed: {0}")]
    Request(String),

    #[error("record encoding failed: {0}")]
    Encode(#[from] serde_json::Error),

    /// The persistence context is gone (worker terminated).
    #[error("persistence channel closed")]
    ChannelClosed,
}
