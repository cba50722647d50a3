use thiserror::Error;

/// Transport faults raised by the downloader.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("{url} answered with HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },
    #[error("reading response from {url} failed: {source}")]
    Body {
        url: String,
        #[source]
        source: std::io::Error,
    },
    #[error("downloader is not running")]
    Killed,
}

/// Faults while turning a response body into records.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// Body is not valid JSON.
    #[error("response is not valid JSON: {0}")]
    Decode(#[source] serde_json::Error),
    /// Valid JSON lacking an expected field, or with one of the wrong type.
    #[error("unexpected {what} shape{}: {source}", id_suffix(.id))]
    Shape {
        what: &'static str,
        /// Identifier of the offending object when it could be read.
        id: Option<String>,
        #[source]
        source: serde_json::Error,
    },
}

impl ExtractError {
    pub fn shape(what: &'static str, id: Option<String>, source: serde_json::Error) -> Self {
        ExtractError::Shape { what, id, source }
    }
}

fn id_suffix(id: &Option<String>) -> String {
    match id {
        Some(id) => format!(" (id {})", id),
        None => String::new(),
    }
}

/// Fault of one fetch-and-parse step.
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Extract(#[from] ExtractError),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("config.concurrent_requests cannot be zero")]
    NoConcurrency,
    #[error("config.concurrent_requests_per_domain cannot exceed config.concurrent_requests")]
    PerDomainExceedsTotal,
    #[error("config.download_delay must not be negative")]
    NegativeDelay,
    #[error("config.user_agents cannot be empty")]
    NoUserAgents,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("no spiders set")]
    NoSpiders,
    #[error("duplicate spider name {0}")]
    DuplicateSpider(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("feed i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("building media client failed: {0}")]
    MediaClient(#[from] reqwest::Error),
    #[error("worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Failure downloading one offer image.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("downloading {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("storing {url} failed: {source}")]
    Io {
        url: String,
        #[source]
        source: std::io::Error,
    },
}
