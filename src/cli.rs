use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Environment {
    Development,
    #[default]
    Production,
}

#[derive(Parser, Debug)]
#[command(
    name = "rs-livedrops",
    about = "live drop feed client with duplicate suppression and persisted recent history",
    version
)]
pub struct Args {
    /// Deployment environment, selects the default live and API endpoints
    #[arg(short, long, value_enum, default_value_t = Environment::Production)]
    pub env: Environment,

    /// Live WebSocket endpoint URL (overrides the environment default)
    #[arg(short, long)]
    pub url: Option<String>,

    /// REST API base URL used for the initial recent-drops seed
    #[arg(long)]
    pub api_url: Option<String>,

    /// Directory holding the persisted drop history
    #[arg(long)]
    pub history_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Output logs in JSON format
    #[arg(long)]
    pub json_logs: bool,

    /// Enable metrics server
    #[arg(long)]
    pub metrics: bool,

    /// Metrics server port
    #[arg(long, default_value = "9090")]
    pub metrics_port: u16,

    /// Connection timeout in seconds
    #[arg(long, default_value = "20")]
    pub connect_timeout: u64,

    /// Initial reconnection delay in milliseconds
    #[arg(long, default_value = "1000")]
    pub reconnect_min: u64,

    /// Maximum reconnection delay in milliseconds
    #[arg(long, default_value = "5000")]
    pub reconnect_max: u64,

    /// Disable colored output (useful for piping to files)
    #[arg(long)]
    pub no_color: bool,

    /// Skip the one-shot recent-drops fetch on startup
    #[arg(long)]
    pub no_seed: bool,
}
