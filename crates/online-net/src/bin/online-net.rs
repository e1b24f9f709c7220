//! Online.net server management plugin for Ansible.
//!
//! Reads a JSON parameter object from the file given as argument (or stdin)
//! and prints `{"changed", "server", "output"}`, or `{"failed": true, "msg"}`
//! with a non-zero exit status.

use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use online_net::{manage, ApiClient, ManageOutcome, ManageParams, Overrides, Settings};

/// Manage an Online.net server.
#[derive(Parser)]
#[command(name = "online-net")]
#[command(about = "Manage an Online.net server")]
struct Cli {
    /// JSON parameter file (`-` or absent reads stdin).
    params: Option<PathBuf>,

    /// Enable verbose logging.
    #[arg(short, long, default_value = "false")]
    verbose: bool,
}

fn read_params(path: Option<&PathBuf>) -> Result<ManageParams> {
    let text = match path {
        Some(path) if path.as_os_str() != "-" => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read parameters from {}", path.display()))?,
        _ => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("Failed to read parameters from stdin")?;
            text
        }
    };
    ManageParams::from_json(&text).context("Invalid parameters")
}

async fn execute(cli: &Cli) -> Result<ManageOutcome> {
    let params = read_params(cli.params.as_ref())?;

    let settings = Settings::load(Overrides {
        api_uri: params.api_uri.clone(),
        api_token: params.api_token.clone(),
        ..Overrides::default()
    })
    .context("Failed to load settings")?;
    let token = settings.require_token()?;
    let client =
        ApiClient::new(&settings.api_uri, token).context("Failed to create API client")?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling");
            on_signal.cancel();
        }
    });

    Ok(manage::run(client, &params, &cancel).await?)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logs go to stderr, stdout is the plugin result.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if cli.verbose { "debug" } else { "warn" })
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match execute(&cli).await {
        Ok(outcome) => match serde_json::to_string(&outcome) {
            Ok(text) => {
                println!("{text}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                println!("{}", json!({"failed": true, "msg": e.to_string()}));
                ExitCode::FAILURE
            }
        },
        Err(e) => {
            println!("{}", json!({"failed": true, "msg": format!("{e:#}")}));
            ExitCode::FAILURE
        }
    }
}
