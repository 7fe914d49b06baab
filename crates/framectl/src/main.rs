//! framectl - operate on a Codeframe frame store from the shell.
//!
//! Logs go to stderr; stdout carries only ids and frame content so the
//! output can be piped.

use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use framestore::{
    configured_fixtures, frame_file_name, spawn_seed, FileFrameStore, FrameId, FrameStore,
    StoreConfig, StoreError,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Content-addressed storage for Codeframe frames
#[derive(Parser, Debug)]
#[command(name = "framectl", version, about, long_about = None)]
struct Cli {
    /// TOML config file with a [store] section
    #[arg(short, long, env = "CODEFRAME_CONFIG")]
    config: Option<PathBuf>,

    /// Frame directory (overrides the config file and environment)
    #[arg(short, long)]
    store: Option<PathBuf>,

    /// Log at debug level (RUST_LOG takes precedence)
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ensure the bundled and configured fixtures are stored
    Seed,

    /// Store a frame from FILE (or stdin) and print its id
    Put { file: Option<PathBuf> },

    /// Print the frame stored under ID
    Get { id: String },

    /// Print the id FILE (or stdin) would be stored under
    Id { file: Option<PathBuf> },

    /// Print the path of the frame file for ID
    Path { id: String },
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> Result<StoreConfig> {
    let mut config = match &cli.config {
        Some(path) => StoreConfig::from_file(path)?,
        None => StoreConfig::from_env()?,
    };
    if let Some(store) = &cli.store {
        config.base_path = store.clone();
    }
    Ok(config)
}

fn read_input(file: Option<&Path>) -> Result<String> {
    match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display())),
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read stdin")?;
            Ok(buf)
        }
    }
}

fn parse_id(id: &str) -> Result<FrameId> {
    id.parse()
        .with_context(|| format!("{:?} is not a frame id", id))
}

fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;

    match &cli.command {
        Command::Id { file } => {
            let content = read_input(file.as_deref())?;
            println!("{}", FrameId::from_content(&content));
        }
        Command::Path { id } => {
            let id = parse_id(id)?;
            // Path lookup must not create the directory as a side effect.
            let path = config.base_path.join(frame_file_name(&id));
            println!("{}", path.display());
        }
        Command::Seed => {
            let store = Arc::new(FileFrameStore::open(config.clone())?);
            info!(path = %store.base_path().display(), "seeding fixtures");
            let report = spawn_seed(store, configured_fixtures(&config)).wait();
            for (name, id) in &report.seeded {
                println!("{} {}", id, name);
            }
            for (name, reason) in &report.failed {
                error!(fixture = %name, %reason, "fixture not seeded");
            }
        }
        Command::Put { file } => {
            let content = read_input(file.as_deref())?;
            let store = FileFrameStore::open(config)?;
            let id = store.create(&content)?;
            info!(%id, bytes = content.len(), "frame stored");
            println!("{}", id);
        }
        Command::Get { id } => {
            // Nothing has ever been stored here, so no id can resolve.
            if !config.base_path.is_dir() {
                return Err(StoreError::not_found(id.as_str()).into());
            }
            let store = FileFrameStore::open(StoreConfig {
                read_only: true,
                ..config
            })?;
            let content = store.get_str(id)?;
            let mut stdout = io::stdout().lock();
            stdout.write_all(content.as_bytes())?;
            stdout.flush()?;
        }
    }

    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let code = match e.downcast_ref::<StoreError>() {
                Some(StoreError::NotFound { .. }) => 2,
                Some(StoreError::CorruptData { .. }) => 3,
                _ => 1,
            };
            error!("{:#}", e);
            ExitCode::from(code)
        }
    }
}
