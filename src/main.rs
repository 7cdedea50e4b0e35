mod cli;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use agent_memstore::config::MemstoreConfig;

#[derive(Parser)]
#[command(name = "memstore", version, about = "Namespaced memory store for AI agents")]
struct Cli {
    /// Config file (default: ~/.memstore/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Database file, overriding the config and MEMSTORE_DB
    #[arg(long, global = true)]
    db: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print one item as JSON
    Get { namespace: String, key: String },
    /// Insert or replace an item; VALUE must be a JSON object
    Put {
        namespace: String,
        key: String,
        value: String,
    },
    /// Delete an item
    Delete { namespace: String, key: String },
    /// List items under a namespace prefix
    Search {
        prefix: String,
        /// JSON filter, e.g. '{"score": {"$gte": 3}}'
        #[arg(long)]
        filter: Option<String>,
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long, default_value_t = 0)]
        offset: usize,
    },
    /// List distinct namespaces
    Namespaces {
        #[arg(long)]
        prefix: Option<String>,
        #[arg(long)]
        suffix: Option<String>,
        #[arg(long)]
        max_depth: Option<usize>,
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long, default_value_t = 0)]
        offset: usize,
    },
    /// Run database diagnostics
    Doctor,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => MemstoreConfig::load_from(path)?,
        None => MemstoreConfig::load()?,
    };
    if let Some(db) = cli.db {
        config.storage.db_path = db;
    }

    // Log to stderr so stdout carries only command output.
    let filter = EnvFilter::try_new(&config.logging.level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Get { namespace, key } => cli::items::get(&config, &namespace, &key)?,
        Command::Put {
            namespace,
            key,
            value,
        } => cli::items::put(&config, &namespace, &key, &value)?,
        Command::Delete { namespace, key } => cli::items::delete(&config, &namespace, &key)?,
        Command::Search {
            prefix,
            filter,
            limit,
            offset,
        } => cli::search::search(&config, &prefix, filter.as_deref(), limit, offset)?,
        Command::Namespaces {
            prefix,
            suffix,
            max_depth,
            limit,
            offset,
        } => cli::search::namespaces(
            &config,
            cli::search::NamespaceArgs {
                prefix,
                suffix,
                max_depth,
                limit,
                offset,
            },
        )?,
        Command::Doctor => cli::doctor::doctor(&config)?,
    }

    Ok(())
}
