//! SportsDataIO scores and player game stats
//!
//! Authenticated with the `Ocp-Apim-Subscription-Key` header; every league
//! has its own subscription key.

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

use crate::api::fallback::FallbackClient;
use crate::config::{Config, SportsDataKeys};
use crate::error::{FetchError, FetchResult};
use crate::resolver::SportsSource;
use crate::time::sports_data_date;

const AUTH_HEADER: &str = "ocp-apim-subscription-key";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum League {
    Mlb,
    Nba,
    Nhl,
    Nfl,
    Cfb,
    Cbb,
}

impl League {
    pub fn as_str(&self) -> &'static str {
        match self {
            League::Mlb => "mlb",
            League::Nba => "nba",
            League::Nhl => "nhl",
            League::Nfl => "nfl",
            League::Cfb => "cfb",
            League::Cbb => "cbb",
        }
    }

    pub fn api_key_var(&self) -> &'static str {
        match self {
            League::Mlb => "SPORTS_DATA_IO_MLB_API_KEY",
            League::Nba => "SPORTS_DATA_IO_NBA_API_KEY",
            League::Nhl => "SPORTS_DATA_IO_NHL_API_KEY",
            League::Nfl => "SPORTS_DATA_IO_NFL_API_KEY",
            League::Cfb => "SPORTS_DATA_IO_CFB_API_KEY",
            League::Cbb => "SPORTS_DATA_IO_CBB_API_KEY",
        }
    }

    fn games_path(&self, date: NaiveDate) -> String {
        // NFL publishes scores rather than games for a given day
        let endpoint = match self {
            League::Nfl => "ScoresByDate",
            _ => "GamesByDate",
        };
        format!(
            "/v3/{}/scores/json/{}/{}",
            self.as_str(),
            endpoint,
            sports_data_date(date)
        )
    }

    fn player_stats_path(&self, date: NaiveDate) -> FetchResult<String> {
        if *self == League::Nfl {
            return Err(FetchError::UnsupportedQuery(
                "NFL player stats are published by week, not by date".to_string(),
            ));
        }
        Ok(format!(
            "/v3/{}/stats/json/PlayerGameStatsByDate/{}",
            self.as_str(),
            sports_data_date(date)
        ))
    }
}

impl fmt::Display for League {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str().to_uppercase())
    }
}

/// Lifecycle of a game as far as resolution cares
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameStatus {
    Final,
    Canceled,
    Pending,
}

impl GameStatus {
    pub fn from_api(status: &str) -> Self {
        match status.trim() {
            "Final" | "F/OT" | "F/SO" | "Closed" => GameStatus::Final,
            "Canceled" | "Cancelled" | "Postponed" | "Forfeit" | "NotNecessary" => {
                GameStatus::Canceled
            }
            _ => GameStatus::Pending,
        }
    }
}

/// The feeds send `null` for unknown strings (TBD teams, unannounced status)
fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// One game from a scores endpoint. Score field names differ per league
/// (`HomeTeamRuns` in MLB, `HomeScore` in NFL, `HomeTeamScore` elsewhere).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Game {
    #[serde(rename = "GameID", default)]
    pub game_id: Option<i64>,
    #[serde(rename = "Status", default, deserialize_with = "null_as_empty")]
    pub status: String,
    #[serde(rename = "DateTime", default)]
    pub date_time: Option<String>,
    #[serde(rename = "HomeTeam", default, deserialize_with = "null_as_empty")]
    pub home_team: String,
    #[serde(rename = "AwayTeam", default, deserialize_with = "null_as_empty")]
    pub away_team: String,
    #[serde(rename = "HomeTeamScore", default)]
    home_team_score: Option<i64>,
    #[serde(rename = "AwayTeamScore", default)]
    away_team_score: Option<i64>,
    #[serde(rename = "HomeTeamRuns", default)]
    home_team_runs: Option<i64>,
    #[serde(rename = "AwayTeamRuns", default)]
    away_team_runs: Option<i64>,
    #[serde(rename = "HomeScore", default)]
    home_score: Option<i64>,
    #[serde(rename = "AwayScore", default)]
    away_score: Option<i64>,
}

impl Game {
    pub fn new(home: &str, away: &str, status: &str, score: Option<(i64, i64)>) -> Self {
        Self {
            game_id: None,
            status: status.to_string(),
            date_time: None,
            home_team: home.to_string(),
            away_team: away.to_string(),
            home_team_score: score.map(|s| s.0),
            away_team_score: score.map(|s| s.1),
            home_team_runs: None,
            away_team_runs: None,
            home_score: None,
            away_score: None,
        }
    }

    pub fn status(&self) -> GameStatus {
        GameStatus::from_api(&self.status)
    }

    pub fn home_points(&self) -> Option<i64> {
        self.home_team_score
            .or(self.home_team_runs)
            .or(self.home_score)
    }

    pub fn away_points(&self) -> Option<i64> {
        self.away_team_score
            .or(self.away_team_runs)
            .or(self.away_score)
    }

    pub fn is_matchup(&self, home: &str, away: &str) -> bool {
        self.home_team.eq_ignore_ascii_case(home) && self.away_team.eq_ignore_ascii_case(away)
    }
}

/// One player's stat line for one game. Stat columns vary by league so they
/// are kept as raw JSON and read by name.
#[derive(Debug, Clone, Deserialize)]
pub struct PlayerGameStat {
    #[serde(rename = "Name", default, deserialize_with = "null_as_empty")]
    pub name: String,
    #[serde(rename = "Team", default)]
    pub team: Option<String>,
    #[serde(rename = "IsGameOver", default)]
    pub is_game_over: Option<bool>,
    #[serde(flatten)]
    pub stats: HashMap<String, serde_json::Value>,
}

impl PlayerGameStat {
    pub fn stat(&self, key: &str) -> Option<Decimal> {
        let value = self.stats.get(key)?;
        if let Some(i) = value.as_i64() {
            return Some(Decimal::from(i));
        }
        value.as_f64().and_then(|f| Decimal::try_from(f).ok())
    }
}

#[derive(Clone)]
pub struct SportsDataClient {
    http: FallbackClient,
    keys: SportsDataKeys,
}

impl SportsDataClient {
    pub fn new(http: FallbackClient, keys: SportsDataKeys) -> Self {
        Self { http, keys }
    }

    pub fn from_config(config: &Config) -> FetchResult<Self> {
        let http = FallbackClient::new(config.sports_data.clone(), config.http_timeout_secs)?;
        Ok(Self::new(http, config.sports_data_keys.clone()))
    }

    fn authed(&self, league: League) -> FetchResult<FallbackClient> {
        let key = self.keys.for_league(league)?;
        self.http.clone().with_header(AUTH_HEADER, key)
    }

    pub async fn games_by_date(&self, league: League, date: NaiveDate) -> FetchResult<Vec<Game>> {
        let http = self.authed(league)?;
        debug!(%league, %date, "Fetching games");
        let games: Vec<Game> = http.get_json(&league.games_path(date), &[]).await?;
        debug!(count = games.len(), "Games fetched");
        Ok(games)
    }

    pub async fn player_stats_by_date(
        &self,
        league: League,
        date: NaiveDate,
    ) -> FetchResult<Vec<PlayerGameStat>> {
        let path = league.player_stats_path(date)?;
        let http = self.authed(league)?;
        debug!(%league, %date, "Fetching player game stats");
        let stats: Vec<PlayerGameStat> = http.get_json(&path, &[]).await?;
        debug!(count = stats.len(), "Player game stats fetched");
        Ok(stats)
    }
}

#[async_trait]
impl SportsSource for SportsDataClient {
    async fn games_by_date(&self, league: League, date: NaiveDate) -> FetchResult<Vec<Game>> {
        SportsDataClient::games_by_date(self, league, date).await
    }

    async fn player_stats_by_date(
        &self,
        league: League,
        date: NaiveDate,
    ) -> FetchResult<Vec<PlayerGameStat>> {
        SportsDataClient::player_stats_by_date(self, league, date).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Endpoint;
    use rust_decimal_macros::dec;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 10, 22).unwrap()
    }

    fn client(server: &MockServer) -> SportsDataClient {
        let config = Config {
            sports_data: Endpoint::primary(server.uri()),
            sports_data_keys: SportsDataKeys {
                nba: Some("nba-key".to_string()),
                mlb: Some("mlb-key".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        SportsDataClient::from_config(&config).unwrap()
    }

    #[test]
    fn test_game_score_fields_per_league() {
        let mlb: Game = serde_json::from_value(serde_json::json!({
            "GameID": 1, "Status": "Final", "HomeTeam": "NYY", "AwayTeam": "BOS",
            "HomeTeamRuns": 5, "AwayTeamRuns": 3
        }))
        .unwrap();
        assert_eq!((mlb.home_points(), mlb.away_points()), (Some(5), Some(3)));

        let nfl: Game = serde_json::from_value(serde_json::json!({
            "Status": "F/OT", "HomeTeam": "KC", "AwayTeam": "BUF",
            "HomeScore": 27, "AwayScore": 24
        }))
        .unwrap();
        assert_eq!((nfl.home_points(), nfl.away_points()), (Some(27), Some(24)));
        assert_eq!(nfl.status(), GameStatus::Final);

        let scheduled: Game = serde_json::from_value(serde_json::json!({
            "Status": "Scheduled", "HomeTeam": "LAL", "AwayTeam": "DEN",
            "HomeTeamScore": null, "AwayTeamScore": null
        }))
        .unwrap();
        assert_eq!(scheduled.home_points(), None);
        assert_eq!(scheduled.status(), GameStatus::Pending);
    }

    #[test]
    fn test_null_strings_do_not_sink_the_whole_slate() {
        let games: Vec<Game> = serde_json::from_value(serde_json::json!([
            { "Status": null, "HomeTeam": null, "AwayTeam": null },
            { "Status": "Final", "HomeTeam": "LAL", "AwayTeam": "MIN",
              "HomeTeamScore": 110, "AwayTeamScore": 103 }
        ]))
        .unwrap();
        assert_eq!(games.len(), 2);
        assert_eq!(games[0].status(), GameStatus::Pending);
        assert!(!games[0].is_matchup("LAL", "MIN"));
        assert!(games[1].is_matchup("LAL", "MIN"));

        let lines: Vec<PlayerGameStat> = serde_json::from_value(serde_json::json!([
            { "Name": null, "Points": 3 },
            { "Name": "LeBron James", "Points": 25 }
        ]))
        .unwrap();
        assert_eq!(lines[0].name, "");
        assert_eq!(lines[1].stat("Points"), Some(dec!(25)));
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(GameStatus::from_api("F/SO"), GameStatus::Final);
        assert_eq!(GameStatus::from_api("Postponed"), GameStatus::Canceled);
        assert_eq!(GameStatus::from_api("Canceled"), GameStatus::Canceled);
        assert_eq!(GameStatus::from_api("InProgress"), GameStatus::Pending);
        assert_eq!(GameStatus::from_api("Suspended"), GameStatus::Pending);
    }

    #[test]
    fn test_matchup_is_case_insensitive() {
        let game = Game::new("LAL", "DEN", "Final", Some((110, 102)));
        assert!(game.is_matchup("lal", "den"));
        assert!(!game.is_matchup("DEN", "LAL"));
    }

    #[test]
    fn test_player_stat_lookup() {
        let line: PlayerGameStat = serde_json::from_value(serde_json::json!({
            "Name": "LeBron James", "Team": "LAL", "IsGameOver": true,
            "Points": 27.0, "Rebounds": 8, "Minutes": null
        }))
        .unwrap();
        assert_eq!(line.stat("Points"), Some(dec!(27)));
        assert_eq!(line.stat("Rebounds"), Some(dec!(8)));
        assert_eq!(line.stat("Minutes"), None);
        assert_eq!(line.stat("Assists"), None);
    }

    #[test]
    fn test_paths() {
        assert_eq!(
            League::Nba.games_path(date()),
            "/v3/nba/scores/json/GamesByDate/2024-OCT-22"
        );
        assert_eq!(
            League::Nfl.games_path(date()),
            "/v3/nfl/scores/json/ScoresByDate/2024-OCT-22"
        );
        assert_eq!(
            League::Mlb.player_stats_path(date()).unwrap(),
            "/v3/mlb/stats/json/PlayerGameStatsByDate/2024-OCT-22"
        );
        assert!(matches!(
            League::Nfl.player_stats_path(date()),
            Err(FetchError::UnsupportedQuery(_))
        ));
    }

    #[tokio::test]
    async fn test_games_by_date_sends_league_key() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v3/nba/scores/json/GamesByDate/2024-OCT-22"))
            .and(header("Ocp-Apim-Subscription-Key", "nba-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                { "GameID": 9, "Status": "Final", "HomeTeam": "LAL", "AwayTeam": "MIN",
                  "HomeTeamScore": 110, "AwayTeamScore": 103 }
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let games = client(&server)
            .games_by_date(League::Nba, date())
            .await
            .unwrap();
        assert_eq!(games.len(), 1);
        assert_eq!(games[0].game_id, Some(9));
        assert_eq!(games[0].home_points(), Some(110));
    }

    #[tokio::test]
    async fn test_missing_league_key_fails_before_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let err = client(&server)
            .games_by_date(League::Nhl, date())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            FetchError::MissingApiKey("SPORTS_DATA_IO_NHL_API_KEY")
        ));
    }

    #[tokio::test]
    async fn test_player_stats_by_date() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v3/mlb/stats/json/PlayerGameStatsByDate/2024-OCT-22"))
            .and(header("Ocp-Apim-Subscription-Key", "mlb-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                { "Name": "Aaron Judge", "Team": "NYY", "IsGameOver": true, "HomeRuns": 2.0 }
            ])))
            .mount(&server)
            .await;

        let stats = client(&server)
            .player_stats_by_date(League::Mlb, date())
            .await
            .unwrap();
        assert_eq!(stats[0].stat("HomeRuns"), Some(dec!(2)));
    }
}
