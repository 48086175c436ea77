//! Storyrank - multi-role backlog prioritization server

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use storyrank_gateway::GatewayServer;
use storyrank_providers::OpenAICompatibleClient;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;
mod config;

use commands::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    if let Err(e) = run(&cli).await {
        eprintln!("{}: {:#}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run(cli: &Cli) -> Result<()> {
    let resolved = config::load(cli)?;
    let settings = &resolved.config;

    let client = OpenAICompatibleClient::new(config::provider_config(&settings.providers))?;
    let server = GatewayServer::new(Arc::new(client))
        .with_options(config::gateway_options(settings));

    server
        .start(&settings.server.host, settings.server.port)
        .await?;
    Ok(())
}
