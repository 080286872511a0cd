//! Command-line configuration for `lisod`

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "lisod", version, about = "Readiness-driven HTTP/1.1 file server")]
pub struct Config {
    /// Address to listen on
    #[arg(long, env = "LISO_LISTEN", default_value = "127.0.0.1:8080")]
    pub listen: SocketAddr,

    /// Folder served as the root of the site
    #[arg(long, env = "LISO_WWW", default_value = "./www")]
    pub www: PathBuf,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl Config {
    pub fn load() -> Self {
        Config::parse()
    }
}
