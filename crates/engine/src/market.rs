//! Market definition files
//!
//! Each market is one TOML document naming the data to fetch, the
//! comparison to apply and (optionally) how outcomes map onto tokens.
//! Files are parsed into [`MarketFile`] and validated into [`Market`], which
//! holds only typed, already-converted values (UTC millis, parsed dates).

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::api::sports_data::League;
use crate::error::MarketError;
use crate::resolution::{Comparison, OutcomeMap, Recommendation};
use crate::time::{parse_date, parse_local, parse_timezone, to_millis, DEFAULT_TIMEZONE};
use crate::types::Interval;

const DAY_MS: i64 = 86_400_000;

/// A market as written on disk
#[derive(Debug, Clone, Deserialize)]
pub struct MarketFile {
    pub name: String,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub outcomes: OutcomeMap,
    #[serde(default)]
    pub on_failure: Option<Recommendation>,
    #[serde(flatten)]
    pub spec: MarketSpec,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MarketSpec {
    PriceDirection {
        symbol: String,
        interval: String,
        start: String,
        #[serde(default)]
        end: Option<String>,
    },
    PriceThreshold {
        symbol: String,
        at: String,
        threshold: Decimal,
        #[serde(default = "default_price_comparison")]
        comparison: Comparison,
        #[serde(default)]
        interval: Option<String>,
    },
    PriceRange {
        symbol: String,
        at: String,
        low: Decimal,
        high: Decimal,
        #[serde(default)]
        interval: Option<String>,
    },
    GameWinner {
        league: League,
        date: String,
        home: String,
        away: String,
    },
    GameTotal {
        league: League,
        date: String,
        home: String,
        away: String,
        line: Decimal,
    },
    PlayerStat {
        league: League,
        date: String,
        player: String,
        stat: String,
        threshold: Decimal,
        #[serde(default = "default_count_comparison")]
        comparison: Comparison,
    },
    YoutubeViews {
        video_id: String,
        threshold: Decimal,
        #[serde(default = "default_count_comparison")]
        comparison: Comparison,
    },
    YoutubeCaptions {
        video_id: String,
        language: String,
    },
}

fn default_price_comparison() -> Comparison {
    Comparison::Gt
}

fn default_count_comparison() -> Comparison {
    Comparison::Gte
}

/// A validated market, ready to resolve
#[derive(Debug, Clone, Serialize)]
pub struct Market {
    pub name: String,
    pub outcomes: OutcomeMap,
    pub on_failure: Recommendation,
    pub query: MarketQuery,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MarketQuery {
    /// Open of the candle starting at `start_ms` against the close of the
    /// candle ending at `end_ms`
    PriceDirection {
        symbol: String,
        #[serde(serialize_with = "serialize_interval")]
        interval: Interval,
        start_ms: i64,
        end_ms: i64,
    },
    PriceThreshold {
        symbol: String,
        #[serde(serialize_with = "serialize_interval")]
        interval: Interval,
        at_ms: i64,
        threshold: Decimal,
        comparison: Comparison,
    },
    PriceRange {
        symbol: String,
        #[serde(serialize_with = "serialize_interval")]
        interval: Interval,
        at_ms: i64,
        low: Decimal,
        high: Decimal,
    },
    GameWinner {
        league: League,
        date: NaiveDate,
        home: String,
        away: String,
    },
    GameTotal {
        league: League,
        date: NaiveDate,
        home: String,
        away: String,
        line: Decimal,
    },
    PlayerStat {
        league: League,
        date: NaiveDate,
        player: String,
        stat: String,
        threshold: Decimal,
        comparison: Comparison,
    },
    YoutubeViews {
        video_id: String,
        threshold: Decimal,
        comparison: Comparison,
    },
    YoutubeCaptions {
        video_id: String,
        language: String,
    },
}

fn serialize_interval<S: serde::Serializer>(interval: &Interval, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(interval.as_str())
}

impl MarketFile {
    pub fn parse(text: &str, path: &Path) -> Result<Self, MarketError> {
        toml::from_str(text).map_err(|source| MarketError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn validate(self) -> Result<Market, MarketError> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(invalid("<unnamed>", "name must not be empty"));
        }
        let tz = parse_timezone(self.timezone.as_deref().unwrap_or(DEFAULT_TIMEZONE))?;

        let query = match self.spec {
            MarketSpec::PriceDirection {
                symbol,
                interval,
                start,
                end,
            } => {
                let symbol = non_empty(&name, "symbol", symbol)?;
                let interval: Interval = interval.parse()?;
                let start_ms = to_millis(parse_local(&start, tz)?);
                let end_ms = match end {
                    Some(end) => to_millis(parse_local(&end, tz)?),
                    None => start_ms + interval.millis(),
                };
                if end_ms <= start_ms {
                    return Err(invalid(&name, "end must be after start"));
                }
                check_aligned(&name, interval, start_ms, "start")?;
                check_aligned(&name, interval, end_ms, "end")?;
                MarketQuery::PriceDirection {
                    symbol,
                    interval,
                    start_ms,
                    end_ms,
                }
            }
            MarketSpec::PriceThreshold {
                symbol,
                at,
                threshold,
                comparison,
                interval,
            } => {
                let symbol = non_empty(&name, "symbol", symbol)?;
                let interval = candle_interval(interval)?;
                let at_ms = to_millis(parse_local(&at, tz)?);
                check_aligned(&name, interval, at_ms, "at")?;
                MarketQuery::PriceThreshold {
                    symbol,
                    interval,
                    at_ms,
                    threshold,
                    comparison,
                }
            }
            MarketSpec::PriceRange {
                symbol,
                at,
                low,
                high,
                interval,
            } => {
                let symbol = non_empty(&name, "symbol", symbol)?;
                if low >= high {
                    return Err(invalid(&name, "low must be below high"));
                }
                let interval = candle_interval(interval)?;
                let at_ms = to_millis(parse_local(&at, tz)?);
                check_aligned(&name, interval, at_ms, "at")?;
                MarketQuery::PriceRange {
                    symbol,
                    interval,
                    at_ms,
                    low,
                    high,
                }
            }
            MarketSpec::GameWinner {
                league,
                date,
                home,
                away,
            } => MarketQuery::GameWinner {
                league,
                date: parse_date(&date)?,
                home: non_empty(&name, "home", home)?,
                away: non_empty(&name, "away", away)?,
            },
            MarketSpec::GameTotal {
                league,
                date,
                home,
                away,
                line,
            } => MarketQuery::GameTotal {
                league,
                date: parse_date(&date)?,
                home: non_empty(&name, "home", home)?,
                away: non_empty(&name, "away", away)?,
                line,
            },
            MarketSpec::PlayerStat {
                league,
                date,
                player,
                stat,
                threshold,
                comparison,
            } => {
                if league == League::Nfl {
                    return Err(invalid(&name, "NFL player stats are not available by date"));
                }
                MarketQuery::PlayerStat {
                    league,
                    date: parse_date(&date)?,
                    player: non_empty(&name, "player", player)?,
                    stat: non_empty(&name, "stat", stat)?,
                    threshold,
                    comparison,
                }
            }
            MarketSpec::YoutubeViews {
                video_id,
                threshold,
                comparison,
            } => MarketQuery::YoutubeViews {
                video_id: non_empty(&name, "video_id", video_id)?,
                threshold,
                comparison,
            },
            MarketSpec::YoutubeCaptions { video_id, language } => MarketQuery::YoutubeCaptions {
                video_id: non_empty(&name, "video_id", video_id)?,
                language: non_empty(&name, "language", language)?,
            },
        };

        Ok(Market {
            name,
            outcomes: self.outcomes,
            on_failure: self.on_failure.unwrap_or(Recommendation::P4),
            query,
        })
    }
}

fn invalid(name: &str, reason: impl Into<String>) -> MarketError {
    MarketError::Invalid {
        name: name.to_string(),
        reason: reason.into(),
    }
}

fn non_empty(name: &str, field: &str, value: String) -> Result<String, MarketError> {
    let value = value.trim().to_string();
    if value.is_empty() {
        Err(invalid(name, format!("{field} must not be empty")))
    } else {
        Ok(value)
    }
}

fn candle_interval(interval: Option<String>) -> Result<Interval, MarketError> {
    match interval {
        Some(s) => Ok(s.parse()?),
        None => Ok(Interval::ONE_MINUTE),
    }
}

/// Binance candles up to one day open on UTC multiples of their length
fn check_aligned(name: &str, interval: Interval, ms: i64, field: &str) -> Result<(), MarketError> {
    if interval.millis() <= DAY_MS && ms % interval.millis() != 0 {
        return Err(invalid(
            name,
            format!("{field} is not on a {interval} candle boundary"),
        ));
    }
    Ok(())
}

/// Read and validate one market file
pub fn load(path: impl AsRef<Path>) -> Result<Market, MarketError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|source| MarketError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    MarketFile::parse(&text, path)?.validate()
}

/// Every `*.toml` file directly inside `dir`, sorted by file name
pub fn market_files(dir: impl AsRef<Path>) -> Result<Vec<PathBuf>, MarketError> {
    let dir = dir.as_ref();
    let io_err = |source| MarketError::Io {
        path: dir.to_path_buf(),
        source,
    };

    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "toml") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
