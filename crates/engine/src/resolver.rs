//! Resolve a validated market into an outcome and a recommendation token
//!
//! Data comes in through three narrow traits so the same resolution code
//! runs against the live provider clients or in-memory fixtures.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::api::sports_data::{Game, League, PlayerGameStat};
use crate::api::youtube::{CaptionTrack, VideoStatistics};
use crate::api::{BinanceClient, SportsDataClient, YouTubeClient};
use crate::config::Config;
use crate::error::{FetchError, FetchResult};
use crate::market::{Market, MarketQuery};
use crate::resolution::{self, Outcome, Recommendation};
use crate::types::{Interval, Kline};

#[async_trait]
pub trait KlineSource: Send + Sync {
    async fn candle_at(&self, symbol: &str, interval: Interval, open_time: i64)
        -> FetchResult<Kline>;
}

#[async_trait]
pub trait SportsSource: Send + Sync {
    async fn games_by_date(&self, league: League, date: NaiveDate) -> FetchResult<Vec<Game>>;

    async fn player_stats_by_date(
        &self,
        league: League,
        date: NaiveDate,
    ) -> FetchResult<Vec<PlayerGameStat>>;
}

#[async_trait]
pub trait VideoSource: Send + Sync {
    async fn video_statistics(&self, video_id: &str) -> FetchResult<VideoStatistics>;

    async fn caption_tracks(&self, video_id: &str) -> FetchResult<Vec<CaptionTrack>>;
}

/// The result of resolving one market
#[derive(Debug, Clone, Serialize)]
pub struct Resolution {
    pub market: String,
    pub outcome: Outcome,
    pub recommendation: Recommendation,
    /// The values the decision was based on
    pub observed: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

type Clock = Arc<dyn Fn() -> i64 + Send + Sync>;

pub struct Resolver {
    klines: Arc<dyn KlineSource>,
    sports: Arc<dyn SportsSource>,
    videos: Arc<dyn VideoSource>,
    now_ms: Clock,
}

impl Resolver {
    pub fn new(
        klines: Arc<dyn KlineSource>,
        sports: Arc<dyn SportsSource>,
        videos: Arc<dyn VideoSource>,
    ) -> Self {
        Self {
            klines,
            sports,
            videos,
            now_ms: Arc::new(|| Utc::now().timestamp_millis()),
        }
    }

    pub fn from_config(config: &Config) -> FetchResult<Self> {
        Ok(Self::new(
            Arc::new(BinanceClient::from_config(config)?),
            Arc::new(SportsDataClient::from_config(config)?),
            Arc::new(YouTubeClient::from_config(config)?),
        ))
    }

    /// Replace the wall clock used to decide whether candles have closed
    pub fn with_clock(mut self, now_ms: impl Fn() -> i64 + Send + Sync + 'static) -> Self {
        self.now_ms = Arc::new(now_ms);
        self
    }

    /// Never fails: a market whose data cannot be obtained resolves to its
    /// `on_failure` token.
    pub async fn resolve(&self, market: &Market) -> Resolution {
        match self.evaluate(&market.query).await {
            Ok((outcome, observed)) => {
                let recommendation = market.outcomes.recommend(outcome);
                info!(
                    market = %market.name,
                    %outcome,
                    %recommendation,
                    "Market resolved"
                );
                Resolution {
                    market: market.name.clone(),
                    outcome,
                    recommendation,
                    observed,
                    error: None,
                }
            }
            Err(e) => {
                error!(market = %market.name, error = %e, "Failed to resolve market");
                Resolution {
                    market: market.name.clone(),
                    outcome: Outcome::Unavailable,
                    recommendation: market.on_failure,
                    observed: serde_json::Value::Null,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    async fn evaluate(&self, query: &MarketQuery) -> FetchResult<(Outcome, serde_json::Value)> {
        let now = (self.now_ms)();

        match query {
            MarketQuery::PriceDirection {
                symbol,
                interval,
                start_ms,
                end_ms,
            } => {
                if now < *end_ms {
                    debug!(%symbol, end_ms = *end_ms, "Window has not closed yet");
                    return Ok((Outcome::Pending, serde_json::json!({ "now": now })));
                }
                let first = self.closed_candle(symbol, *interval, *start_ms, now).await?;
                let last_open = end_ms - interval.millis();
                let last = if last_open == *start_ms {
                    first.clone()
                } else {
                    self.closed_candle(symbol, *interval, last_open, now).await?
                };
                let outcome = resolution::price_direction(first.open, last.close);
                Ok((
                    outcome,
                    serde_json::json!({ "open": first.open, "close": last.close }),
                ))
            }
            MarketQuery::PriceThreshold {
                symbol,
                interval,
                at_ms,
                threshold,
                comparison,
            } => {
                let Some(candle) = self.candle_if_closed(symbol, *interval, *at_ms, now).await?
                else {
                    return Ok((Outcome::Pending, serde_json::json!({ "now": now })));
                };
                let outcome = resolution::threshold(candle.close, *comparison, *threshold);
                Ok((
                    outcome,
                    serde_json::json!({
                        "price": candle.close,
                        "rule": format!("{} {}", comparison.symbol(), threshold),
                    }),
                ))
            }
            MarketQuery::PriceRange {
                symbol,
                interval,
                at_ms,
                low,
                high,
            } => {
                let Some(candle) = self.candle_if_closed(symbol, *interval, *at_ms, now).await?
                else {
                    return Ok((Outcome::Pending, serde_json::json!({ "now": now })));
                };
                let outcome = resolution::range(candle.close, *low, *high);
                Ok((
                    outcome,
                    serde_json::json!({ "price": candle.close, "low": low, "high": high }),
                ))
            }
            MarketQuery::GameWinner {
                league,
                date,
                home,
                away,
            } => {
                let game = self.find_game(*league, *date, home, away).await?;
                Ok((resolution::game_winner(&game), game_facts(&game)))
            }
            MarketQuery::GameTotal {
                league,
                date,
                home,
                away,
                line,
            } => {
                let game = self.find_game(*league, *date, home, away).await?;
                let mut facts = game_facts(&game);
                facts["line"] = serde_json::json!(line);
                Ok((resolution::game_total(&game, *line), facts))
            }
            MarketQuery::PlayerStat {
                league,
                date,
                player,
                stat,
                threshold,
                comparison,
            } => {
                let lines = self.sports.player_stats_by_date(*league, *date).await?;
                let line = lines
                    .iter()
                    .find(|l| l.name.trim().eq_ignore_ascii_case(player))
                    .ok_or_else(|| {
                        FetchError::MissingData(format!("no {league} stat line for {player} on {date}"))
                    })?;
                if line.is_game_over == Some(false) {
                    return Ok((Outcome::Pending, serde_json::json!({ "player": line.name })));
                }
                let value = line.stat(stat).ok_or_else(|| {
                    FetchError::MissingData(format!("{player} has no {stat} value"))
                })?;
                let mut facts = serde_json::json!({ "player": line.name, "team": line.team });
                facts[stat.as_str()] = serde_json::json!(value);
                Ok((resolution::threshold(value, *comparison, *threshold), facts))
            }
            MarketQuery::YoutubeViews {
                video_id,
                threshold,
                comparison,
            } => {
                let stats = self.videos.video_statistics(video_id).await?;
                let views = Decimal::from(stats.view_count);
                Ok((
                    resolution::threshold(views, *comparison, *threshold),
                    serde_json::json!({ "views": stats.view_count }),
                ))
            }
            MarketQuery::YoutubeCaptions { video_id, language } => {
                let tracks = self.videos.caption_tracks(video_id).await?;
                let found = tracks.iter().any(|t| language_matches(&t.language, language));
                let languages: Vec<&str> = tracks.iter().map(|t| t.language.as_str()).collect();
                Ok((
                    if found { Outcome::Yes } else { Outcome::No },
                    serde_json::json!({ "languages": languages }),
                ))
            }
        }
    }

    async fn closed_candle(
        &self,
        symbol: &str,
        interval: Interval,
        open_time: i64,
        now: i64,
    ) -> FetchResult<Kline> {
        let candle = self.klines.candle_at(symbol, interval, open_time).await?;
        if !candle.is_closed(now) {
            return Err(FetchError::MissingData(format!(
                "{symbol} candle at {open_time} is still open"
            )));
        }
        Ok(candle)
    }

    /// `None` while the candle is still forming
    async fn candle_if_closed(
        &self,
        symbol: &str,
        interval: Interval,
        open_time: i64,
        now: i64,
    ) -> FetchResult<Option<Kline>> {
        if now < open_time + interval.millis() {
            return Ok(None);
        }
        self.closed_candle(symbol, interval, open_time, now)
            .await
            .map(Some)
    }

    async fn find_game(
        &self,
        league: League,
        date: NaiveDate,
        home: &str,
        away: &str,
    ) -> FetchResult<Game> {
        let games = self.sports.games_by_date(league, date).await?;
        games
            .into_iter()
            .find(|g| g.is_matchup(home, away))
            .ok_or_else(|| {
                FetchError::MissingData(format!("no {league} game {away} @ {home} on {date}"))
            })
    }
}

fn game_facts(game: &Game) -> serde_json::Value {
    serde_json::json!({
        "status": game.status,
        "home": game.home_team,
        "away": game.away_team,
        "home_score": game.home_points(),
        "away_score": game.away_points(),
    })
}

/// `en` matches `en` and regional variants such as `en-GB`
fn language_matches(track: &str, wanted: &str) -> bool {
    let track = track.to_ascii_lowercase();
    let wanted = wanted.to_ascii_lowercase();
    track == wanted || track.starts_with(&format!("{wanted}-"))
}
