//! Blocking client for the findex wire protocol.
//!
//! The protocol is strictly one request per TCP connection, so every
//! method dials the server anew, performs its exchange and lets the
//! socket drop.

use std::io;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::thread;
use std::time::{Duration, Instant};

use crate::analysis;
use crate::error::{FindexError, Result};
use crate::index::{FileId, Posting};
use crate::net::codes::{Command, ResponseCode};
use crate::net::tasks::TaskId;
use crate::net::wire;

/// A decoded positional search reply.
#[derive(Debug, Default)]
pub struct SearchReply {
    /// Matching files as `(file_id, path)` pairs.
    pub files: Vec<(FileId, String)>,
    /// Positional hits of the queried words inside the matching files.
    pub postings: Vec<Posting>,
}

/// Client handle; holds only the server address.
#[derive(Debug, Clone)]
pub struct FindexClient {
    addr: SocketAddr,
}

impl FindexClient {
    /// Resolve the server address. No connection is made yet.
    pub fn new<A: ToSocketAddrs>(addr: A) -> Result<Self> {
        let addr = addr.to_socket_addrs()?.next().ok_or_else(|| {
            FindexError::Io(io::Error::new(
                io::ErrorKind::AddrNotAvailable,
                "no address resolved",
            ))
        })?;
        Ok(FindexClient { addr })
    }

    fn request(&self, command: Command) -> Result<TcpStream> {
        let mut stream = TcpStream::connect(self.addr)?;
        wire::write_u8(&mut stream, command as u8)?;
        Ok(stream)
    }

    fn expect_ok(stream: &mut TcpStream) -> Result<()> {
        match wire::read_code(stream)? {
            ResponseCode::Ok => Ok(()),
            code => Err(FindexError::Protocol(code as u8)),
        }
    }

    /// Whether the server currently has `path` in its index.
    pub fn has_file(&self, path: &str) -> Result<bool> {
        let mut stream = self.request(Command::HasFile)?;
        wire::write_string(&mut stream, path.as_bytes())?;

        match wire::read_code(&mut stream)? {
            ResponseCode::Ok => Ok(true),
            ResponseCode::FileNotFound => Ok(false),
            code => Err(FindexError::Protocol(code as u8)),
        }
    }

    /// Fetch a file body from the server.
    pub fn file_content(&self, path: &str) -> Result<String> {
        let mut stream = self.request(Command::GetFileContent)?;
        wire::write_string(&mut stream, path.as_bytes())?;

        match wire::read_code(&mut stream)? {
            ResponseCode::Ok => wire::read_string(&mut stream),
            ResponseCode::FileNotFound => Err(FindexError::UnknownFile),
            code => Err(FindexError::Protocol(code as u8)),
        }
    }

    /// Ask the server to index a file already on its storage.
    /// Returns the deferred task's ID.
    pub fn add_file(&self, path: &str) -> Result<TaskId> {
        let mut stream = self.request(Command::AddFile)?;
        wire::write_string(&mut stream, path.as_bytes())?;
        wire::write_bool(&mut stream, true)?;

        Self::expect_ok(&mut stream)?;
        Ok(wire::read_u64(&mut stream)?)
    }

    /// Upload a file body, to be stored and indexed by the server.
    /// Returns the deferred task's ID.
    pub fn add_file_with_body(&self, path: &str, body: &str) -> Result<TaskId> {
        let mut stream = self.request(Command::AddFile)?;
        wire::write_string(&mut stream, path.as_bytes())?;
        wire::write_bool(&mut stream, false)?;
        wire::write_string(&mut stream, body.as_bytes())?;

        Self::expect_ok(&mut stream)?;
        Ok(wire::read_u64(&mut stream)?)
    }

    /// Ask the server to re-read and re-index a file.
    pub fn modify_file(&self, path: &str) -> Result<TaskId> {
        let mut stream = self.request(Command::ModifyFile)?;
        wire::write_string(&mut stream, path.as_bytes())?;

        Self::expect_ok(&mut stream)?;
        Ok(wire::read_u64(&mut stream)?)
    }

    /// Ask the server to drop a file from the index.
    pub fn remove_file(&self, path: &str) -> Result<TaskId> {
        let mut stream = self.request(Command::RemoveFile)?;
        wire::write_string(&mut stream, path.as_bytes())?;

        Self::expect_ok(&mut stream)?;
        Ok(wire::read_u64(&mut stream)?)
    }

    /// Poll the status of a deferred write task.
    pub fn write_result(&self, task_id: TaskId) -> Result<ResponseCode> {
        let mut stream = self.request(Command::GetWriteResult)?;
        wire::write_u64(&mut stream, task_id)?;
        wire::read_code(&mut stream)
    }

    /// Poll until the task reaches a terminal status or `timeout` passes;
    /// returns the last status seen either way.
    pub fn wait_write_result(&self, task_id: TaskId, timeout: Duration) -> Result<ResponseCode> {
        let deadline = Instant::now() + timeout;
        loop {
            let code = self.write_result(task_id)?;
            let pending = matches!(
                code,
                ResponseCode::OperationNotProcessed | ResponseCode::OperationInProgress
            );
            if !pending || Instant::now() >= deadline {
                return Ok(code);
            }
            thread::sleep(Duration::from_millis(20));
        }
    }

    /// Conjunctive files-only search.
    pub fn search_files(&self, words: &[&str]) -> Result<Vec<String>> {
        let mut stream = self.send_search(words, true)?;

        match wire::read_code(&mut stream)? {
            ResponseCode::Ok => {
                let file_count = wire::read_u32(&mut stream)?;
                let mut paths = Vec::with_capacity(file_count as usize);
                for _ in 0..file_count {
                    paths.push(wire::read_string(&mut stream)?);
                }
                Ok(paths)
            }
            ResponseCode::SearchEntriesNotFound => Err(FindexError::NoMatch),
            code => Err(FindexError::Protocol(code as u8)),
        }
    }

    /// Conjunctive search with positional hits.
    pub fn search(&self, words: &[&str]) -> Result<SearchReply> {
        let mut stream = self.send_search(words, false)?;

        match wire::read_code(&mut stream)? {
            ResponseCode::Ok => {
                let file_count = wire::read_u32(&mut stream)?;
                let mut reply = SearchReply::default();
                for _ in 0..file_count {
                    let file_id = wire::read_u32(&mut stream)?;
                    let path = wire::read_string(&mut stream)?;
                    reply.files.push((file_id, path));
                }

                let entry_count = wire::read_u64(&mut stream)?;
                for _ in 0..entry_count {
                    let file_id = wire::read_u32(&mut stream)?;
                    let position = wire::read_u32(&mut stream)?;
                    reply.postings.push(Posting::new(file_id, position));
                }
                Ok(reply)
            }
            ResponseCode::SearchEntriesNotFound => Err(FindexError::NoMatch),
            code => Err(FindexError::Protocol(code as u8)),
        }
    }

    /// Files-only search over a raw query string, split with the same
    /// tokenizer the index itself uses.
    pub fn search_query(&self, query: &str) -> Result<Vec<String>> {
        let words = analysis::tokenize(query);
        let refs: Vec<&str> = words.iter().map(String::as_str).collect();
        self.search_files(&refs)
    }

    fn send_search(&self, words: &[&str], files_only: bool) -> Result<TcpStream> {
        if words.len() > u16::MAX as usize {
            return Err(FindexError::other("too many search words"));
        }

        let mut stream = self.request(Command::Search)?;
        wire::write_bool(&mut stream, files_only)?;
        wire::write_u16(&mut stream, words.len() as u16)?;
        for word in words {
            wire::write_string(&mut stream, word.as_bytes())?;
        }
        Ok(stream)
    }

    /// Current writer phase duration on the server, in seconds.
    pub fn writer_duration(&self) -> Result<f32> {
        let mut stream = self.request(Command::GetWriterDuration)?;
        Self::expect_ok(&mut stream)?;
        Ok(wire::read_f32(&mut stream)?)
    }

    /// Current reader phase duration on the server, in seconds.
    pub fn reader_duration(&self) -> Result<f32> {
        let mut stream = self.request(Command::GetReaderDuration)?;
        Self::expect_ok(&mut stream)?;
        Ok(wire::read_f32(&mut stream)?)
    }

    /// Update the writer phase duration on the server.
    pub fn set_writer_duration(&self, seconds: f32) -> Result<()> {
        let mut stream = self.request(Command::SetWriterDuration)?;
        wire::write_f32(&mut stream, seconds)?;
        Self::decode_duration_reply(&mut stream)
    }

    /// Update the reader phase duration on the server.
    pub fn set_reader_duration(&self, seconds: f32) -> Result<()> {
        let mut stream = self.request(Command::SetReaderDuration)?;
        wire::write_f32(&mut stream, seconds)?;
        Self::decode_duration_reply(&mut stream)
    }

    fn decode_duration_reply(stream: &mut TcpStream) -> Result<()> {
        match wire::read_code(stream)? {
            ResponseCode::Ok => Ok(()),
            ResponseCode::DurationTooSmall => Err(FindexError::DurationTooSmall),
            code => Err(FindexError::Protocol(code as u8)),
        }
    }
}
