//! Error types for the findex crate.

use std::io;
use std::string::FromUtf8Error;

use thiserror::Error;

/// Error type used across the whole crate.
///
/// Domain errors stay typed all the way up to the protocol boundary, where
/// the dispatcher maps them onto wire response codes.
#[derive(Error, Debug)]
pub enum FindexError {
    /// I/O failure (socket or blob storage).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A file body or wire string was not valid UTF-8.
    #[error("invalid UTF-8: {0}")]
    Utf8(#[from] FromUtf8Error),

    /// The value is already interned (double-sided tables only).
    #[error("value already exists")]
    DuplicateValue,

    /// The numeric ID is not present in the table.
    #[error("ID not found")]
    UnknownId,

    /// The value is not present in the table.
    #[error("value not found")]
    UnknownValue,

    /// The file path is not present in the index.
    #[error("file not found in index")]
    UnknownFile,

    /// The word ID is not present in the inverted index.
    #[error("word not found in index")]
    UnknownWord,

    /// The file is already present in the index.
    #[error("file is already indexed")]
    AlreadyIndexed,

    /// The file already exists in blob storage.
    #[error("file already exists on disk")]
    AlreadyOnDisk,

    /// A conjunctive query matched no files.
    #[error("no matching files")]
    NoMatch,

    /// A phase duration below the scheduling floor was requested.
    #[error("phase duration is below the minimum")]
    DurationTooSmall,

    /// The server answered with an unexpected or failure response code.
    #[error("unexpected response code {0}")]
    Protocol(u8),

    /// Anything that does not fit the variants above.
    #[error("{0}")]
    Message(String),
}

impl FindexError {
    /// Create a generic error from any message.
    pub fn other<S: Into<String>>(message: S) -> Self {
        FindexError::Message(message.into())
    }
}

/// Result type alias for findex operations.
pub type Result<T> = std::result::Result<T, FindexError>;
