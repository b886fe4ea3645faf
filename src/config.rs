/// file: src/config.rs
/// description: runtime configuration for the live connection, filters and persisted history
use crate::cli::{Args, Environment};
use crate::error::LiveDropsError;
use anyhow::Result;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

pub const DEV_LIVE_URL: &str = "ws://localhost:3001/live";
pub const PROD_LIVE_URL: &str = "wss://api.livedrops.gg/live";
pub const DEV_API_URL: &str = "http://localhost:3001/api/";
pub const PROD_API_URL: &str = "https://api.livedrops.gg/api/";

/// Name of the durable record holding the drop history.
pub const HISTORY_RECORD: &str = "live_drops_history";

#[derive(Debug, Clone)]
pub struct Config {
    pub transport: TransportConfig,
    pub dedup: DedupConfig,
    pub history: HistoryConfig,
    pub toast: ToastConfig,
    pub api: ApiConfig,
    pub metrics: MetricsConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub url: Url,
    pub connect_timeout: Duration,
    pub reconnect_min: Duration,
    pub reconnect_max: Duration,
}

#[derive(Debug, Clone, Copy)]
pub struct DedupConfig {
    /// Same-key suppression window.
    pub window: chrono::Duration,
    /// Entries older than this are compacted away.
    pub retention: chrono::Duration,
    /// Drops older than this on receipt are never published.
    pub stale_after: chrono::Duration,
}

#[derive(Debug, Clone)]
pub struct HistoryConfig {
    pub dir: PathBuf,
    pub record: String,
    pub max_len: usize,
    pub max_age: chrono::Duration,
    pub stale_after: chrono::Duration,
}

#[derive(Debug, Clone, Copy)]
pub struct ToastConfig {
    pub default_duration: Duration,
    pub link_duration: Duration,
    pub refetch_delay: Duration,
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub base_url: Url,
    pub seed_limit: usize,
    pub seed_enabled: bool,
    pub request_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
    pub colored: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            url: Url::parse(PROD_LIVE_URL).expect("static url"),
            connect_timeout: Duration::from_secs(20),
            reconnect_min: Duration::from_secs(1),
            reconnect_max: Duration::from_secs(5),
        }
    }
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            window: chrono::Duration::seconds(10),
            retention: chrono::Duration::seconds(300),
            stale_after: chrono::Duration::minutes(5),
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            dir: default_history_dir(),
            record: HISTORY_RECORD.to_string(),
            max_len: 17,
            max_age: chrono::Duration::hours(24),
            stale_after: chrono::Duration::minutes(5),
        }
    }
}

impl Default for ToastConfig {
    fn default() -> Self {
        Self {
            default_duration: Duration::from_secs(4),
            link_duration: Duration::from_secs(6),
            refetch_delay: Duration::from_millis(100),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse(PROD_API_URL).expect("static url"),
            seed_limit: 12,
            seed_enabled: true,
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            transport: TransportConfig::default(),
            dedup: DedupConfig::default(),
            history: HistoryConfig::default(),
            toast: ToastConfig::default(),
            api: ApiConfig::default(),
            metrics: MetricsConfig {
                enabled: false,
                port: 9090,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                json: false,
                colored: true,
            },
        }
    }
}

fn default_history_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("rs-livedrops")
}

impl Config {
    pub fn from_args(args: &Args) -> Result<Self> {
        let (live_default, api_default) = match args.env {
            Environment::Development => (DEV_LIVE_URL, DEV_API_URL),
            Environment::Production => (PROD_LIVE_URL, PROD_API_URL),
        };

        let url = Url::parse(args.url.as_deref().unwrap_or(live_default))?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(LiveDropsError::InvalidConfig(format!(
                "live endpoint must be ws:// or wss://, got {url}"
            ))
            .into());
        }

        let mut api_url = Url::parse(args.api_url.as_deref().unwrap_or(api_default))?;
        // Url::join drops the last path segment without a trailing slash
        if !api_url.path().ends_with('/') {
            let path = format!("{}/", api_url.path());
            api_url.set_path(&path);
        }

        if args.reconnect_min == 0 || args.reconnect_min > args.reconnect_max {
            return Err(LiveDropsError::InvalidConfig(format!(
                "reconnect delays must satisfy 0 < min ({}) <= max ({})",
                args.reconnect_min, args.reconnect_max
            ))
            .into());
        }

        let defaults = Config::default();
        Ok(Config {
            transport: TransportConfig {
                url,
                connect_timeout: Duration::from_secs(args.connect_timeout),
                reconnect_min: Duration::from_millis(args.reconnect_min),
                reconnect_max: Duration::from_millis(args.reconnect_max),
            },
            dedup: defaults.dedup,
            history: HistoryConfig {
                dir: args.history_dir.clone().unwrap_or(defaults.history.dir),
                ..defaults.history
            },
            toast: defaults.toast,
            api: ApiConfig {
                base_url: api_url,
                seed_enabled: !args.no_seed,
                ..defaults.api
            },
            metrics: MetricsConfig {
                enabled: args.metrics,
                port: args.metrics_port,
            },
            logging: LoggingConfig {
                level: args.log_level.clone(),
                json: args.json_logs,
                colored: !args.no_color,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn environment_selects_endpoints() {
        let args = Args::parse_from(["rs-livedrops", "--env", "development"]);
        let config = Config::from_args(&args).unwrap();
        assert_eq!(config.transport.url.as_str(), DEV_LIVE_URL);
        assert_eq!(config.api.base_url.as_str(), DEV_API_URL);

        let args = Args::parse_from(["rs-livedrops"]);
        let config = Config::from_args(&args).unwrap();
        assert_eq!(config.transport.url.as_str(), PROD_LIVE_URL);
        assert_eq!(config.transport.connect_timeout, Duration::from_secs(20));
        assert_eq!(config.transport.reconnect_min, Duration::from_secs(1));
        assert_eq!(config.transport.reconnect_max, Duration::from_secs(5));
        assert_eq!(config.history.max_len, 17);
        assert_eq!(config.api.seed_limit, 12);
    }

    #[test]
    fn url_override_must_be_websocket() {
        let args = Args::parse_from(["rs-livedrops", "--url", "https://example.com/live"]);
        assert!(Config::from_args(&args).is_err());

        let args = Args::parse_from(["rs-livedrops", "--url", "ws://127.0.0.1:9000/live"]);
        let config = Config::from_args(&args).unwrap();
        assert_eq!(config.transport.url.port(), Some(9000));
    }

    #[test]
    fn api_base_gains_trailing_slash() {
        let args = Args::parse_from(["rs-livedrops", "--api-url", "http://localhost:8080/v2"]);
        let config = Config::from_args(&args).unwrap();
        assert_eq!(config.api.base_url.as_str(), "http://localhost:8080/v2/");
    }

    #[test]
    fn inverted_backoff_bounds_are_rejected() {
        let args = Args::parse_from([
            "rs-livedrops",
            "--reconnect-min",
            "6000",
            "--reconnect-max",
            "5000",
        ]);
        assert!(Config::from_args(&args).is_err());
    }
}
