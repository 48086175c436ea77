//! CLI arguments

use std::path::PathBuf;

use clap::Parser;

/// Storyrank - multi-role backlog prioritization server
#[derive(Parser, Debug)]
#[command(name = "storyrank")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file (storyrank.jsonc, storyrank.json or storyrank.yaml)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Address to bind, overrides `server.host`
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind, overrides `server.port`
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long)]
    pub verbose: bool,
}
