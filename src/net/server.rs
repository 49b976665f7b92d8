//! The TCP server and command dispatcher.
//!
//! Every request arrives on a fresh connection: one command byte, its
//! arguments, one reply, then the socket closes. Each accepted connection
//! is handed to the scheduled pool as a reader task; query commands run
//! right there under the index's read lock, while mutating commands only
//! allocate a task ID, enqueue a writer closure and reply immediately.

use std::io::Write;
use std::net::{TcpListener, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use log::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::error::Result;
use crate::index::manager::FileIndex;
use crate::net::codes::{Command, ResponseCode};
use crate::net::tasks::{TaskId, TaskStatus, WriteTaskRegistry};
use crate::net::wire::{self, MAX_STRING_LEN};
use crate::pool::{PoolConfig, RwScheduledPool};
use crate::storage::{FileStorage, Storage};
use crate::util::bytes;

struct ServerInner {
    index: FileIndex,
    pool: RwScheduledPool,
    tasks: WriteTaskRegistry,
}

/// The findex TCP server.
#[derive(Clone)]
pub struct Server {
    inner: Arc<ServerInner>,
}

impl Server {
    /// Build a server over the configured base directory.
    pub fn new(config: &ServerConfig) -> Result<Server> {
        let storage = Arc::new(FileStorage::open(&config.base_dir)?);
        Server::with_storage(storage, config.pool_config())
    }

    /// Build a server over an arbitrary storage backend.
    pub fn with_storage(storage: Arc<dyn Storage>, pool: PoolConfig) -> Result<Server> {
        Ok(Server {
            inner: Arc::new(ServerInner {
                index: FileIndex::new(storage),
                pool: RwScheduledPool::new(pool)?,
                tasks: WriteTaskRegistry::new(),
            }),
        })
    }

    /// The index this server exposes.
    pub fn index(&self) -> &FileIndex {
        &self.inner.index
    }

    /// Walk the storage and index every file in it.
    ///
    /// Bodies are read and tokenized on a few threads fed from a shared
    /// channel; per-file failures are logged and skipped. Returns the
    /// number of files indexed.
    pub fn bootstrap(&self) -> Result<usize> {
        let paths = self.inner.index.storage().list()?;
        let total = paths.len();

        let (sender, receiver) = crossbeam_channel::unbounded::<String>();
        for path in paths {
            let _ = sender.send(path);
        }
        drop(sender);

        let added = AtomicUsize::new(0);
        let index = &self.inner.index;
        let threads = num_cpus::get().min(total.max(1));

        thread::scope(|scope| {
            for _ in 0..threads {
                let receiver = receiver.clone();
                let added = &added;
                scope.spawn(move || {
                    while let Ok(path) = receiver.recv() {
                        match index.add_file(&path) {
                            Ok(()) => {
                                added.fetch_add(1, Ordering::Relaxed);
                            }
                            Err(err) => warn!("not indexing {path:?}: {err}"),
                        }
                    }
                });
            }
        });

        let added = added.load(Ordering::Relaxed);
        info!("bootstrap indexed {added}/{total} files");
        Ok(added)
    }

    /// Bind and serve forever.
    pub fn run<A: ToSocketAddrs>(&self, addr: A) -> Result<()> {
        let listener = TcpListener::bind(addr)?;
        self.serve(listener)
    }

    /// Serve connections accepted from an already-bound listener.
    pub fn serve(&self, listener: TcpListener) -> Result<()> {
        info!("listening on {}", listener.local_addr()?);

        for stream in listener.incoming() {
            match stream {
                Ok(stream) => {
                    let inner = Arc::clone(&self.inner);
                    self.inner
                        .pool
                        .spawn_reader(move || serve_connection(&inner, stream));
                }
                Err(err) => error!("accept failed: {err}"),
            }
        }
        Ok(())
    }
}

fn serve_connection(inner: &Arc<ServerInner>, mut stream: TcpStream) {
    let command_byte = match wire::read_u8(&mut stream) {
        Ok(byte) => byte,
        Err(_) => {
            let _ = wire::write_code(&mut stream, ResponseCode::ErrorReceivingCommand);
            return;
        }
    };

    let command = match Command::try_from(command_byte) {
        Ok(command) => command,
        Err(byte) => {
            debug!("unknown command byte {byte}");
            let _ = wire::write_code(&mut stream, ResponseCode::InvalidCommand);
            return;
        }
    };

    let outcome = match command {
        Command::SetWriterDuration => set_writer_duration(inner, &mut stream),
        Command::SetReaderDuration => set_reader_duration(inner, &mut stream),
        Command::GetWriterDuration => get_writer_duration(inner, &mut stream),
        Command::GetReaderDuration => get_reader_duration(inner, &mut stream),
        Command::GetFileContent => get_file_content(inner, &mut stream),
        Command::GetWriteResult => get_write_result(inner, &mut stream),
        Command::ModifyFile => modify_file(inner, &mut stream),
        Command::RemoveFile => remove_file(inner, &mut stream),
        Command::AddFile => add_file(inner, &mut stream),
        Command::HasFile => has_file(inner, &mut stream),
        Command::Search => search(inner, &mut stream),
    };

    if let Err(err) = outcome {
        debug!("dropping connection mid-{command:?}: {err}");
    }
}

// Receive helpers. `None` means the reply was already sent and the
// connection is done; handlers just bail out.

fn recv_u16(stream: &mut TcpStream, allow_zero: bool) -> Option<u16> {
    match wire::read_u16(stream) {
        Ok(0) if !allow_zero => {
            let _ = wire::write_code(stream, ResponseCode::ArgumentIsZero);
            None
        }
        Ok(value) => Some(value),
        Err(_) => {
            let _ = wire::write_code(stream, ResponseCode::ErrorReceivingData);
            None
        }
    }
}

fn recv_u32_nonzero(stream: &mut TcpStream) -> Option<u32> {
    match wire::read_u32(stream) {
        Ok(0) => {
            let _ = wire::write_code(stream, ResponseCode::ArgumentIsZero);
            None
        }
        Ok(value) => Some(value),
        Err(_) => {
            let _ = wire::write_code(stream, ResponseCode::ErrorReceivingData);
            None
        }
    }
}

fn recv_u64_nonzero(stream: &mut TcpStream) -> Option<u64> {
    match wire::read_u64(stream) {
        Ok(0) => {
            let _ = wire::write_code(stream, ResponseCode::ArgumentIsZero);
            None
        }
        Ok(value) => Some(value),
        Err(_) => {
            let _ = wire::write_code(stream, ResponseCode::ErrorReceivingData);
            None
        }
    }
}

fn recv_bool(stream: &mut TcpStream) -> Option<bool> {
    match wire::read_bool(stream) {
        Ok(value) => Some(value),
        Err(_) => {
            let _ = wire::write_code(stream, ResponseCode::ErrorReceivingData);
            None
        }
    }
}

fn recv_string(stream: &mut TcpStream, allow_empty: bool) -> Option<String> {
    let text = match wire::read_string(stream) {
        Ok(text) => text,
        Err(_) => {
            let _ = wire::write_code(stream, ResponseCode::ErrorReceivingData);
            return None;
        }
    };
    if !allow_empty && text.is_empty() {
        let _ = wire::write_code(stream, ResponseCode::ArgumentIsZero);
        return None;
    }
    Some(text)
}

fn reply_task_id(stream: &mut TcpStream, task_id: TaskId) -> Result<()> {
    wire::write_code(stream, ResponseCode::Ok)?;
    wire::write_u64(stream, task_id)?;
    Ok(())
}

// Command handlers. A handler's `Err` only ever means the reply could not
// be sent; the connection is closed either way.

fn set_writer_duration(inner: &ServerInner, stream: &mut TcpStream) -> Result<()> {
    let Some(bits) = recv_u32_nonzero(stream) else {
        return Ok(());
    };
    let code = match inner.pool.set_writer_duration(bytes::f32_from_bits(bits)) {
        Ok(()) => ResponseCode::Ok,
        Err(_) => ResponseCode::DurationTooSmall,
    };
    Ok(wire::write_code(stream, code)?)
}

fn set_reader_duration(inner: &ServerInner, stream: &mut TcpStream) -> Result<()> {
    let Some(bits) = recv_u32_nonzero(stream) else {
        return Ok(());
    };
    let code = match inner.pool.set_reader_duration(bytes::f32_from_bits(bits)) {
        Ok(()) => ResponseCode::Ok,
        Err(_) => ResponseCode::DurationTooSmall,
    };
    Ok(wire::write_code(stream, code)?)
}

fn get_writer_duration(inner: &ServerInner, stream: &mut TcpStream) -> Result<()> {
    wire::write_code(stream, ResponseCode::Ok)?;
    Ok(wire::write_f32(stream, inner.pool.writer_duration())?)
}

fn get_reader_duration(inner: &ServerInner, stream: &mut TcpStream) -> Result<()> {
    wire::write_code(stream, ResponseCode::Ok)?;
    Ok(wire::write_f32(stream, inner.pool.reader_duration())?)
}

fn get_file_content(inner: &ServerInner, stream: &mut TcpStream) -> Result<()> {
    let Some(path) = recv_string(stream, false) else {
        return Ok(());
    };

    match inner.index.file_content(&path) {
        Ok(body) if body.len() <= MAX_STRING_LEN => {
            wire::write_code(stream, ResponseCode::Ok)?;
            wire::write_string(stream, &body)?;
            Ok(())
        }
        Ok(body) => {
            warn!("{path:?} is {} bytes, too large for the wire", body.len());
            Ok(wire::write_code(stream, ResponseCode::FileNotFound)?)
        }
        Err(err) => {
            debug!("content of {path:?} unavailable: {err}");
            Ok(wire::write_code(stream, ResponseCode::FileNotFound)?)
        }
    }
}

fn get_write_result(inner: &ServerInner, stream: &mut TcpStream) -> Result<()> {
    let Some(task_id) = recv_u64_nonzero(stream) else {
        return Ok(());
    };
    let code = match inner.tasks.status(task_id) {
        Some(status) => ResponseCode::from(status),
        None => ResponseCode::WriteTaskIdNotFound,
    };
    Ok(wire::write_code(stream, code)?)
}

fn modify_file(inner: &Arc<ServerInner>, stream: &mut TcpStream) -> Result<()> {
    let Some(path) = recv_string(stream, false) else {
        return Ok(());
    };

    let task_id = inner.tasks.register();
    let worker = Arc::clone(inner);
    inner.pool.spawn_writer(move || {
        worker.tasks.update(task_id, TaskStatus::InProgress);
        let status = match worker.index.modify_file(&path) {
            Ok(()) => TaskStatus::Done,
            Err(err) => {
                debug!("modify {path:?} failed: {err}");
                TaskStatus::FileNotFound
            }
        };
        worker.tasks.update(task_id, status);
    });

    reply_task_id(stream, task_id)
}

fn remove_file(inner: &Arc<ServerInner>, stream: &mut TcpStream) -> Result<()> {
    let Some(path) = recv_string(stream, false) else {
        return Ok(());
    };

    let task_id = inner.tasks.register();
    let worker = Arc::clone(inner);
    inner.pool.spawn_writer(move || {
        worker.tasks.update(task_id, TaskStatus::InProgress);
        let status = match worker.index.remove_file(&path) {
            Ok(()) => TaskStatus::Done,
            Err(err) => {
                debug!("remove {path:?} failed: {err}");
                TaskStatus::FileNotFound
            }
        };
        worker.tasks.update(task_id, status);
    });

    reply_task_id(stream, task_id)
}

fn add_file(inner: &Arc<ServerInner>, stream: &mut TcpStream) -> Result<()> {
    let Some(path) = recv_string(stream, false) else {
        return Ok(());
    };
    let Some(on_server) = recv_bool(stream) else {
        return Ok(());
    };
    let body = if on_server {
        None
    } else {
        // Uploaded bodies may legitimately be empty files.
        let Some(body) = recv_string(stream, true) else {
            return Ok(());
        };
        Some(body)
    };

    let task_id = inner.tasks.register();
    let worker = Arc::clone(inner);
    inner.pool.spawn_writer(move || {
        worker.tasks.update(task_id, TaskStatus::InProgress);
        let result = match &body {
            Some(body) => worker.index.add_file_with_body(&path, body),
            None => worker.index.add_file(&path),
        };
        let status = match result {
            Ok(()) => TaskStatus::Done,
            Err(err) => {
                debug!("add {path:?} failed: {err}");
                TaskStatus::CouldNotAdd
            }
        };
        worker.tasks.update(task_id, status);
    });

    reply_task_id(stream, task_id)
}

fn has_file(inner: &ServerInner, stream: &mut TcpStream) -> Result<()> {
    let Some(path) = recv_string(stream, false) else {
        return Ok(());
    };
    let code = if inner.index.contains(&path) {
        ResponseCode::Ok
    } else {
        ResponseCode::FileNotFound
    };
    Ok(wire::write_code(stream, code)?)
}

fn search(inner: &ServerInner, stream: &mut TcpStream) -> Result<()> {
    let Some(files_only) = recv_bool(stream) else {
        return Ok(());
    };
    // Zero words is a legal frame; it just cannot match anything.
    let Some(word_count) = recv_u16(stream, true) else {
        return Ok(());
    };

    let mut words = Vec::with_capacity(word_count as usize);
    for _ in 0..word_count {
        let Some(word) = recv_string(stream, false) else {
            return Ok(());
        };
        words.push(word);
    }

    let matches = match inner.index.search(&words, !files_only) {
        Ok(matches) => matches,
        Err(err) => {
            debug!("search {words:?} found nothing: {err}");
            return Ok(wire::write_code(stream, ResponseCode::SearchEntriesNotFound)?);
        }
    };

    // One buffered write for the whole reply; result sets can be wide.
    let mut reply = Vec::new();
    wire::write_code(&mut reply, ResponseCode::Ok)?;
    wire::write_u32(&mut reply, matches.files.len() as u32)?;

    if files_only {
        for path in matches.files.values() {
            wire::write_string(&mut reply, path.as_bytes())?;
        }
    } else {
        for (&file_id, path) in &matches.files {
            wire::write_u32(&mut reply, file_id)?;
            wire::write_string(&mut reply, path.as_bytes())?;
        }
        wire::write_u64(&mut reply, matches.postings.len() as u64)?;
        for posting in &matches.postings {
            wire::write_u32(&mut reply, posting.file_id)?;
            wire::write_u32(&mut reply, posting.position)?;
        }
    }

    stream.write_all(&reply)?;
    Ok(())
}
