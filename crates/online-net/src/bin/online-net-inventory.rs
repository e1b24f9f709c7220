//! Online.net external inventory script for Ansible.
//!
//! Configuration is read from `online_net.toml`, then from environment
//! variables, then from command-line arguments. A handy way to export the
//! resolved API settings is `export $(online-net-inventory --env)`.

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use online_net::{
    ApiClient, CacheMode, CacheStore, InventoryCommand, InventoryLoader, Overrides, Settings,
};

/// Produce an Ansible Inventory file based on the Online.net API.
#[derive(Parser)]
#[command(name = "online-net-inventory")]
#[command(about = "Produce an Ansible Inventory file based on the Online.net API")]
struct Cli {
    /// List all Online.net servers as Ansible inventory (default: true).
    #[arg(long)]
    #[allow(dead_code)]
    list: bool,

    /// Get all Ansible inventory variables about a specific server.
    #[arg(long)]
    host: Option<String>,

    /// List all Online.net information as raw JSON.
    #[arg(long)]
    all: bool,

    /// Pretty-print results.
    #[arg(short, long)]
    pretty: bool,

    /// Path to the cache files (default: .).
    #[arg(long)]
    cache_path: Option<std::path::PathBuf>,

    /// Maximum age of the cached items in seconds (default: 0).
    #[arg(long, alias = "cache-max_age")]
    cache_max_age: Option<u64>,

    /// Only use data from the cache.
    #[arg(long)]
    force_cache: bool,

    /// Force refresh of cache by making API requests to Online.net.
    #[arg(short, long)]
    refresh_cache: bool,

    /// Display `ONLINE_NET_API_URI` and `ONLINE_NET_API_TOKEN`.
    #[arg(short, long)]
    env: bool,

    /// Online.net API URI.
    #[arg(short = 'u', long)]
    api_uri: Option<String>,

    /// Online.net API token.
    #[arg(short = 't', long)]
    api_token: Option<String>,

    /// Enable verbose logging.
    #[arg(short, long, default_value = "false")]
    verbose: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr, stdout is the inventory.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if cli.verbose { "debug" } else { "warn" })
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let settings = Settings::load(Overrides {
        api_uri: cli.api_uri,
        api_token: cli.api_token,
        cache_path: cli.cache_path,
        cache_max_age: cli.cache_max_age,
    })
    .context("Failed to load settings")?;
    let token = settings.require_token()?;

    if cli.env {
        println!("{}", settings.env_line());
        return Ok(());
    }

    let client =
        ApiClient::new(&settings.api_uri, token).context("Failed to create API client")?;
    let store = CacheStore::new(settings.cache_file(), settings.cache_max_age);
    let loader = InventoryLoader::new(client, store);

    let snapshot = loader
        .load(CacheMode {
            refresh: cli.refresh_cache,
            force_cache: cli.force_cache,
        })
        .await?;

    // --list is the default when neither --host nor --all is given.
    let command = InventoryCommand::from_flags(cli.all, cli.host);
    let output = command.render(&snapshot);

    let text = if cli.pretty {
        serde_json::to_string_pretty(&output)?
    } else {
        serde_json::to_string(&output)?
    };
    println!("{text}");

    Ok(())
}
