use std::path::PathBuf;

use clap::{Args, ValueEnum};

#[derive(Args)]
pub struct Run {
    /// Minigame played on this server
    #[clap(long, value_enum)]
    pub game: GameKind,

    /// Logging verbosity: trace, debug, info, warn or error (or its first
    /// letter)
    #[clap(long)]
    pub log_level: Option<String>,

    /// Close the server as soon as it started, for deployment checks
    #[clap(long)]
    pub testing: bool,

    /// IP protocol version to listen with
    #[clap(long, value_enum, default_value = "v4")]
    pub ip: IpVersion,

    /// Listening port, overrides the configuration file
    #[clap(long)]
    pub port: Option<u16>,

    /// Networking backend carrying the RPTL protocol
    #[clap(long, value_enum, default_value = "tcp")]
    pub net_backend: NetBackend,

    /// Path to a PEM certificate file (TLS backends only)
    #[clap(long)]
    pub crt: Option<PathBuf>,

    /// Path to a PEM private key file (TLS backends only)
    #[clap(long)]
    pub privkey: Option<PathBuf>,

    /// Path to a TOML configuration file
    #[clap(long)]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum GameKind {
    Acores,
    Bermudes,
    Canaries,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum IpVersion {
    V4,
    V6,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum NetBackend {
    Tcp,
    Wss,
    UnsafeWs,
}
