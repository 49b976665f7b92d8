//! The findex server binary.

use std::path::PathBuf;
use std::process::exit;

use clap::Parser;
use log::{error, info};

use findex::{Server, ServerConfig};

/// Networked in-memory full-text search index.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Address to bind (default 127.0.0.1)
    host: Option<String>,

    /// Port to bind (default 8080)
    port: Option<u16>,

    /// JSON configuration file; CLI arguments override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory holding the indexed corpus
    #[arg(long)]
    base_dir: Option<PathBuf>,

    /// Worker thread count
    #[arg(long)]
    workers: Option<usize>,

    /// Writer phase duration in seconds
    #[arg(long)]
    writer_phase: Option<f32>,

    /// Reader phase duration in seconds
    #[arg(long)]
    reader_phase: Option<f32>,

    /// Allow reader and writer tasks to overlap
    #[arg(long)]
    can_interlap: bool,

    /// Start scheduling with the writer phase
    #[arg(long)]
    start_with_writers: bool,
}

impl Cli {
    fn into_config(self) -> findex::Result<ServerConfig> {
        let mut config = match &self.config {
            Some(path) => ServerConfig::load(path)?,
            None => ServerConfig::default(),
        };

        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(base_dir) = self.base_dir {
            config.base_dir = base_dir;
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if let Some(writer_phase) = self.writer_phase {
            config.writer_phase = writer_phase;
        }
        if let Some(reader_phase) = self.reader_phase {
            config.reader_phase = reader_phase;
        }
        config.can_interlap |= self.can_interlap;
        config.start_with_writers |= self.start_with_writers;

        Ok(config)
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = match cli.into_config() {
        Ok(config) => config,
        Err(err) => {
            error!("{err}");
            exit(1);
        }
    };

    info!("findex-server {}", findex::VERSION);
    info!("corpus directory: {}", config.base_dir.display());

    if let Err(err) = boot(&config) {
        error!("{err}");
        exit(1);
    }
}

fn boot(config: &ServerConfig) -> findex::Result<()> {
    let server = Server::new(config)?;
    server.bootstrap()?;
    server.run(config.bind_addr())
}
