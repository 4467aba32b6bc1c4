use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("{0} is unreachable")]
    Unreachable(String),
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
    #[error("unexpected status {status} for {url}")]
    Status { url: String, status: u16 },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("cache store io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("cache store serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("corrupted cache entry body for {0}")]
    Body(String),
}

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("precache of {url} failed: {source}")]
    Precache {
        url: String,
        #[source]
        source: FetchError,
    },
    #[error("request failed and no cached copy exists: {0}")]
    Network(#[from] FetchError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("proxy must be installed before it can activate")]
    NotInstalled,
    #[error("registration scope {0} is outside the site root")]
    Scope(String),
}

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("websocket error: {0}")]
    Socket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("invalid feed url: {0}")]
    Url(#[from] url::ParseError),
    #[error("origin {0} has no websocket counterpart")]
    Scheme(String),
    #[error("feed payload parsing error: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no configuration directory available")]
    NoConfigDir,
    #[error("config io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config parsing error: {0}")]
    Parse(#[from] serde_json::Error),
}
