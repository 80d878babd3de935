//! Error types for fetching provider data and loading market files

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP {status} from {url}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },

    #[error("Failed to decode response from {url}: {message}")]
    Decode { url: String, message: String },

    #[error("Proxy and primary both failed (proxy: {proxy}; primary: {primary})")]
    AllAttemptsFailed { proxy: String, primary: String },

    #[error("Missing API key: set {0}")]
    MissingApiKey(&'static str),

    #[error("Missing data: {0}")]
    MissingData(String),

    #[error("Unsupported query: {0}")]
    UnsupportedQuery(String),

    #[error("Failed to build HTTP client: {0}")]
    Client(String),
}

pub type FetchResult<T> = Result<T, FetchError>;

#[derive(Error, Debug)]
pub enum MarketError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid market {name}: {reason}")]
    Invalid { name: String, reason: String },

    #[error(transparent)]
    Time(#[from] TimeError),
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum TimeError {
    #[error("Unknown timezone: {0}")]
    UnknownTimezone(String),

    #[error("Unrecognized date/time '{0}' (expected YYYY-MM-DD HH:MM[:SS])")]
    Format(String),

    #[error("Local time {0} does not exist in {1}")]
    Nonexistent(String, String),

    #[error("Local time {0} is ambiguous in {1}")]
    Ambiguous(String, String),

    #[error("Unsupported kline interval: {0}")]
    Interval(String),
}
