//! # findex
//!
//! A networked in-memory full-text search index for a corpus of UTF-8
//! text files.
//!
//! ## Features
//!
//! - Dual forward + inverted index with string interning and positional
//!   postings
//! - Conjunctive, case-insensitive word queries
//! - Reader/writer worker pool with time-sliced phase scheduling
//! - Big-endian framed TCP protocol, one request per connection
//! - Deferred (polled) mutations via a write-task status registry

pub mod analysis;
mod config;
mod error;
pub mod index;
pub mod net;
pub mod pool;
pub mod storage;
mod util;

// Re-exports for the public API
pub use config::ServerConfig;
pub use error::{FindexError, Result};
pub use index::manager::{FileIndex, SearchMatches};
pub use index::{FileId, Posting, Position, WordId};
pub use net::client::{FindexClient, SearchReply};
pub use net::codes::{Command, ResponseCode};
pub use net::server::Server;
pub use net::tasks::{TaskId, TaskStatus, WriteTaskRegistry};
pub use pool::{PoolConfig, RwScheduledPool};
pub use storage::{FileStorage, MemoryStorage, Storage};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
