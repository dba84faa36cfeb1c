use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

/// Genline streaming generation service
#[derive(Debug, Parser)]
#[command(name = "genline", about = "Streaming LLM generations with provider fallback and caps billing")]
pub struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "genline.toml", env = "GENLINE_CONFIG")]
    pub config: PathBuf,

    /// Override the listen address
    #[arg(long, env = "GENLINE_LISTEN")]
    pub listen: Option<SocketAddr>,

    /// Log filter directive
    #[arg(long, default_value = "info", env = "GENLINE_LOG")]
    pub log: String,
}
