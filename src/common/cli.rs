use std::path::PathBuf;

use clap::Parser;

/// `chfs` — a lightweight multi-tenant file server exposing shares over a
/// JSON/HTTP API and WebDAV.
#[derive(Debug, Parser, Clone)]
#[command(name = "chfs", version, about)]
pub struct Cli {
    /// Path to the main declarative config file.
    #[arg(long, env = "CHFS_CONFIG", default_value = "chfs.yaml")]
    pub config: PathBuf,

    /// Bind host, overriding the value in the config file.
    #[arg(long)]
    pub host: Option<String>,

    /// Bind port, overriding the value in the config file.
    #[arg(long)]
    pub port: Option<u16>,

    /// Enable hot-reload of the config file.
    #[arg(long)]
    pub reload: bool,

    /// Enable debug logging and verbose error details.
    #[arg(long, env = "CHFS_DEBUG")]
    pub debug: bool,
}
