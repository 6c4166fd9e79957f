//! droidrelay - chat agent for Android projects
//!
//! ## Commands
//!
//! - `chat`: interactive session where the model runs shell, test and release tools
//! - `token`: exchange the signing key for a store access token

mod chat;
mod completion;
mod config;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, Level};

use droidrelay_core::{
    Agent, CommandExecutor, CommandRouter, EnvSecretProvider, SecretProvider,
    ShellCommandHandler, ShellExecutor,
};
use droidrelay_release::{
    register_release_tools, HttpReleaseBackend, ReleaseBackend, RsaTokenService, TokenProvider,
};

use crate::completion::HttpCompletion;
use crate::config::{FileConfig, DEFAULT_CONFIG_FILE};

#[derive(Parser)]
#[command(name = "droidrelay")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Chat agent that builds, tests and publishes Android apps", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Config file (default: ./droidrelay.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive chat session
    Chat,

    /// Request a store access token
    Token {
        /// Write the token as JSON to this file instead of discarding it
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    droidrelay_core::telemetry::init_tracing(cli.json, level);

    let config = match &cli.config {
        Some(path) => FileConfig::load(path, true)?,
        None => FileConfig::load(Path::new(DEFAULT_CONFIG_FILE), false)?,
    };

    match cli.command {
        Commands::Chat => cmd_chat(config).await,
        Commands::Token { out } => cmd_token(config, out.as_deref()).await,
    }
}

fn token_service(config: &FileConfig, secrets: Arc<dyn SecretProvider>) -> Result<RsaTokenService> {
    let http = config
        .release
        .http_client()
        .context("Failed to build release HTTP client")?;
    Ok(RsaTokenService::new(&config.release, secrets, http))
}

async fn cmd_chat(config: FileConfig) -> Result<()> {
    let secrets: Arc<dyn SecretProvider> = Arc::new(EnvSecretProvider);
    let api_key = secrets
        .get_secret(&config.completion.api_key_secret)
        .with_context(|| format!("{} is not set", config.completion.api_key_secret))?;
    let completion = HttpCompletion::new(config.completion.clone(), api_key)
        .context("Failed to create completion client")?;

    let executor: Arc<dyn CommandExecutor> = Arc::new(ShellExecutor::new(config.shell.clone()));
    let tokens: Arc<dyn TokenProvider> = Arc::new(token_service(&config, secrets.clone())?);
    let http = config
        .release
        .http_client()
        .context("Failed to build release HTTP client")?;
    let backend: Arc<dyn ReleaseBackend> = Arc::new(HttpReleaseBackend::new(&config.release, http));

    let mut router = CommandRouter::new();
    router.register(Arc::new(ShellCommandHandler::new(executor.clone())))?;
    register_release_tools(
        &mut router,
        executor,
        tokens,
        backend,
        secrets,
        config.release.sdk_root.clone(),
    )?;
    info!(tools = ?router.handler_names(), "tools registered");

    let mut agent = Agent::new(config.agent, Arc::new(completion), router);
    chat::run(&mut agent).await
}

async fn cmd_token(config: FileConfig, out: Option<&Path>) -> Result<()> {
    let service = token_service(&config, Arc::new(EnvSecretProvider))?;
    let token = service
        .acquire_access_token()
        .await
        .context("Failed to obtain access token")?;

    match out {
        Some(path) => {
            let body = serde_json::json!({ "jwe": token.value, "ttl": token.ttl_seconds });
            std::fs::write(path, serde_json::to_string_pretty(&body)?)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Token written to {} (ttl {}s)", path.display(), token.ttl_seconds);
        }
        None => println!("Token acquired (ttl {}s)", token.ttl_seconds),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_token_with_global_flags() {
        let cli = Cli::try_parse_from(["droidrelay", "token", "--out", "t.json", "-v", "--config", "x.toml"])
            .unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("x.toml")));
        assert!(matches!(cli.command, Commands::Token { out: Some(ref p) } if p == Path::new("t.json")));
    }
}
