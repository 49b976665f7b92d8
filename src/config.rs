//! Server configuration.

use std::fs::File;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{FindexError, Result};
use crate::pool::PoolConfig;

/// Everything the server binary needs to come up.
///
/// Loadable from a JSON file; every field falls back to its default when
/// absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind.
    pub host: String,
    /// Port to bind.
    pub port: u16,
    /// Directory holding the indexed corpus.
    pub base_dir: PathBuf,
    /// Worker thread count for the scheduled pool.
    pub workers: usize,
    /// Writer phase duration in seconds.
    pub writer_phase: f32,
    /// Reader phase duration in seconds.
    pub reader_phase: f32,
    /// Allow reader and writer tasks to overlap.
    pub can_interlap: bool,
    /// Start the pool in the writer phase.
    pub start_with_writers: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 8080,
            base_dir: PathBuf::from("text_files"),
            workers: num_cpus::get(),
            writer_phase: 0.5,
            reader_phase: 7.5,
            can_interlap: false,
            start_with_writers: false,
        }
    }
}

impl ServerConfig {
    /// Load a configuration from a JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        serde_json::from_reader(file)
            .map_err(|err| FindexError::other(format!("invalid config file: {err}")))
    }

    /// The `host:port` string to bind the listener to.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// The pool configuration carried by this server configuration.
    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            workers: self.workers,
            writer_phase: self.writer_phase,
            reader_phase: self.reader_phase,
            can_interlap: self.can_interlap,
            start_with_writers: self.start_with_writers,
        }
    }
}
