//! Runtime configuration read from the environment (after `.env` is loaded)

use std::env;
use tracing::warn;

use crate::api::sports_data::League;
use crate::error::{FetchError, FetchResult};

pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;

pub const BINANCE_BASE_URL: &str = "https://api.binance.com";
pub const SPORTS_DATA_IO_BASE_URL: &str = "https://api.sportsdata.io";
pub const YOUTUBE_BASE_URL: &str = "https://www.googleapis.com";

/// Where one provider lives: an optional proxy tried first, then the
/// primary base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub proxy: Option<String>,
    pub primary: String,
}

impl Endpoint {
    pub fn primary(url: impl Into<String>) -> Self {
        Self {
            proxy: None,
            primary: url.into(),
        }
    }

    pub fn with_proxy(mut self, url: impl Into<String>) -> Self {
        self.proxy = Some(url.into());
        self
    }
}

/// SportsDataIO issues a separate subscription key per league
#[derive(Debug, Clone, Default)]
pub struct SportsDataKeys {
    pub mlb: Option<String>,
    pub nba: Option<String>,
    pub nhl: Option<String>,
    pub nfl: Option<String>,
    pub cfb: Option<String>,
    pub cbb: Option<String>,
}

impl SportsDataKeys {
    pub fn for_league(&self, league: League) -> FetchResult<&str> {
        let key = match league {
            League::Mlb => &self.mlb,
            League::Nba => &self.nba,
            League::Nhl => &self.nhl,
            League::Nfl => &self.nfl,
            League::Cfb => &self.cfb,
            League::Cbb => &self.cbb,
        };
        key.as_deref()
            .ok_or(FetchError::MissingApiKey(league.api_key_var()))
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub http_timeout_secs: u64,
    pub binance: Endpoint,
    pub binance_api_key: Option<String>,
    pub sports_data: Endpoint,
    pub sports_data_keys: SportsDataKeys,
    pub youtube: Endpoint,
    pub youtube_api_key: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            binance: Endpoint::primary(BINANCE_BASE_URL),
            binance_api_key: None,
            sports_data: Endpoint::primary(SPORTS_DATA_IO_BASE_URL),
            sports_data_keys: SportsDataKeys::default(),
            youtube: Endpoint::primary(YOUTUBE_BASE_URL),
            youtube_api_key: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build a config from an arbitrary variable lookup. Empty values count
    /// as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let endpoint = |proxy_var: &str, base_var: &str, default: &str| Endpoint {
            proxy: get(proxy_var),
            primary: get(base_var).unwrap_or_else(|| default.to_string()),
        };

        Self {
            http_timeout_secs: get("RESOLVER_HTTP_TIMEOUT_SECS")
                .and_then(|v| parse_timeout(&v))
                .unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS),
            binance: endpoint("BINANCE_PROXY_URL", "BINANCE_BASE_URL", BINANCE_BASE_URL),
            binance_api_key: get("BINANCE_API_KEY"),
            sports_data: endpoint(
                "SPORTS_DATA_IO_PROXY_URL",
                "SPORTS_DATA_IO_BASE_URL",
                SPORTS_DATA_IO_BASE_URL,
            ),
            sports_data_keys: SportsDataKeys {
                mlb: get(League::Mlb.api_key_var()),
                nba: get(League::Nba.api_key_var()),
                nhl: get(League::Nhl.api_key_var()),
                nfl: get(League::Nfl.api_key_var()),
                cfb: get(League::Cfb.api_key_var()),
                cbb: get(League::Cbb.api_key_var()),
            },
            youtube: endpoint("YOUTUBE_PROXY_URL", "YOUTUBE_BASE_URL", YOUTUBE_BASE_URL),
            youtube_api_key: get("YOUTUBE_API_KEY"),
        }
    }
}

/// Positive whole seconds; anything else is ignored with a warning
fn parse_timeout(value: &str) -> Option<u64> {
    match value.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Some(secs),
        _ => {
            warn!(
                value,
                default = DEFAULT_HTTP_TIMEOUT_SECS,
                "Ignoring invalid RESOLVER_HTTP_TIMEOUT_SECS"
            );
            None
        }
    }
}
