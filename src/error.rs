use thiserror::Error;

#[derive(Error, Debug)]
pub enum LiveDropsError {
    #[error("WebSocket connection error: {0}")]
    WebSocketError(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("JSON serialization/deserialization error: {0}")]
    SerdeError(#[from] serde_json::Error),

    #[error("URL parsing error: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("HTTP request error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Connection timeout after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Storage error on record '{record}': {reason}")]
    StorageError { record: String, reason: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Metrics server error: {0}")]
    MetricsError(String),
}
