use std::path::PathBuf;

use crate::ItemId;

/// Result alias that carries the custom [`FeedError`] type.
pub type Result<T> = std::result::Result<T, FeedError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    /// Free-form failure raised by a collaborator that has no richer taxonomy.
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// The configuration file could not be read or parsed.
    #[error("invalid configuration in {path:?}: {reason}")]
    Config { path: PathBuf, reason: String },
    /// The media capability failed to load or start the media for an item.
    /// Reported upward unchanged; the coordinator never retries.
    #[error("media failure for item {item_id}: {reason}")]
    Media { item_id: ItemId, reason: String },
    /// Caller handed the core something it cannot act on.
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
}

impl FeedError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    /// Creates a media failure for `item_id`.
    pub fn media<T: Into<String>>(item_id: ItemId, reason: T) -> Self {
        Self::Media {
            item_id,
            reason: reason.into(),
        }
    }
}

impl From<&str> for FeedError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for FeedError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
