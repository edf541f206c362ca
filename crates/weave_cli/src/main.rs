//! Weave CLI
//!
//! Inspects and edits the state snapshot a Weave application persists:
//! - `weave init` writes a default weave.toml
//! - `weave get [path]` prints the state or one value by dot path
//! - `weave set <json>` deep-merges a patch, notifying and persisting as the
//!   application would
//! - `weave reset` restores the configured initial state
//! - `weave stats` prints collection counters, the filter and the next id

mod commands;
mod config;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use weave_core::Store;

use crate::config::WeaveConfig;

/// Inspect and edit persisted Weave state
#[derive(Parser, Debug)]
#[command(name = "weave")]
#[command(about = "Inspect and edit persisted Weave state")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Config file, or the directory containing weave.toml
    #[arg(short, long, global = true, default_value = ".")]
    config: PathBuf,

    /// Snapshot directory (overrides `storage.dir`)
    #[arg(long, global = true, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a default weave.toml
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the state, or the value at a dot path such as `todos.1.title`
    Get { path: Option<String> },

    /// Deep-merge a JSON object into the state
    Set {
        /// JSON object patch
        patch: String,

        /// Action label passed to subscribers
        #[arg(short, long)]
        action: Option<String>,
    },

    /// Restore the configured initial state
    Reset,

    /// Print item counts, the current filter and the next id
    Stats,
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Directory `init` writes into: the `--config` directory, or the parent of
/// an explicit `.toml` file
fn init_dir(config: &Path) -> PathBuf {
    match config.extension() {
        Some(ext) if ext == "toml" => config
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(".")),
        _ => config.to_path_buf(),
    }
}

fn run(cli: &Cli) -> Result<String> {
    let open = || -> Result<Store> {
        let config = WeaveConfig::load_from_dir(&cli.config)?;
        let data_dir = cli
            .data_dir
            .clone()
            .unwrap_or_else(|| config.data_dir(&cli.config));
        debug!(data_dir = %data_dir.display(), "opening store");
        commands::open_store(&config, &data_dir)
    };

    match &cli.command {
        Command::Init { force } => commands::init(&init_dir(&cli.config), *force),
        Command::Get { path } => commands::get(&open()?, path.as_deref()),
        Command::Set { patch, action } => commands::set(&open()?, patch, action.as_deref()),
        Command::Reset => commands::reset(&open()?),
        Command::Stats => commands::stats(&open()?),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    debug!(?cli, "parsed arguments");

    println!("{}", run(&cli)?);
    Ok(())
}
