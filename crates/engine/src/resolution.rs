//! Outcome decisions and their mapping to recommendation tokens
//!
//! Everything here is pure: the resolver fetches the numbers, these
//! functions decide what they mean.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::api::sports_data::{Game, GameStatus};

/// The token printed as `recommendation: pN`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Recommendation {
    #[serde(rename = "p1")]
    P1,
    #[serde(rename = "p2")]
    P2,
    #[serde(rename = "p3")]
    P3,
    #[serde(rename = "p4")]
    P4,
}

impl Recommendation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Recommendation::P1 => "p1",
            Recommendation::P2 => "p2",
            Recommendation::P3 => "p3",
            Recommendation::P4 => "p4",
        }
    }

    /// The single line a resolution prints
    pub fn line(&self) -> String {
        format!("recommendation: {}", self.as_str())
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Yes,
    No,
    Up,
    Down,
    /// Close equal to open
    Flat,
    Home,
    Away,
    Tie,
    Over,
    Under,
    /// Total exactly on the line
    Push,
    Canceled,
    /// Data exists but the event is not over yet
    Pending,
    /// Data could not be fetched or located
    Unavailable,
}

impl Outcome {
    fn default_recommendation(&self) -> Recommendation {
        match self {
            Outcome::No | Outcome::Down | Outcome::Away | Outcome::Under => Recommendation::P1,
            Outcome::Yes | Outcome::Up | Outcome::Flat | Outcome::Home | Outcome::Over => {
                Recommendation::P2
            }
            Outcome::Tie | Outcome::Push | Outcome::Canceled => Recommendation::P3,
            Outcome::Pending | Outcome::Unavailable => Recommendation::P4,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Outcome::Yes => "yes",
            Outcome::No => "no",
            Outcome::Up => "up",
            Outcome::Down => "down",
            Outcome::Flat => "flat",
            Outcome::Home => "home",
            Outcome::Away => "away",
            Outcome::Tie => "tie",
            Outcome::Over => "over",
            Outcome::Under => "under",
            Outcome::Push => "push",
            Outcome::Canceled => "canceled",
            Outcome::Pending => "pending",
            Outcome::Unavailable => "unavailable",
        };
        f.write_str(s)
    }
}

/// Per-market overrides on top of the usual convention (p1 no/down,
/// p2 yes/up, p3 50-50, p4 too early)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OutcomeMap(HashMap<Outcome, Recommendation>);

impl OutcomeMap {
    pub fn new(overrides: HashMap<Outcome, Recommendation>) -> Self {
        Self(overrides)
    }

    pub fn recommend(&self, outcome: Outcome) -> Recommendation {
        if let Some(rec) = self.0.get(&outcome) {
            return *rec;
        }
        // A flat candle counts as "up" unless the market says otherwise
        if outcome == Outcome::Flat {
            return self.recommend(Outcome::Up);
        }
        outcome.default_recommendation()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Comparison {
    Gt,
    Gte,
    Lt,
    Lte,
}

impl Comparison {
    pub fn holds(&self, value: Decimal, threshold: Decimal) -> bool {
        match self {
            Comparison::Gt => value > threshold,
            Comparison::Gte => value >= threshold,
            Comparison::Lt => value < threshold,
            Comparison::Lte => value <= threshold,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Comparison::Gt => ">",
            Comparison::Gte => ">=",
            Comparison::Lt => "<",
            Comparison::Lte => "<=",
        }
    }
}

pub fn price_direction(open: Decimal, close: Decimal) -> Outcome {
    match close.cmp(&open) {
        std::cmp::Ordering::Greater => Outcome::Up,
        std::cmp::Ordering::Less => Outcome::Down,
        std::cmp::Ordering::Equal => Outcome::Flat,
    }
}

pub fn threshold(value: Decimal, cmp: Comparison, threshold: Decimal) -> Outcome {
    if cmp.holds(value, threshold) {
        Outcome::Yes
    } else {
        Outcome::No
    }
}

/// `low` inclusive, `high` exclusive
pub fn range(value: Decimal, low: Decimal, high: Decimal) -> Outcome {
    if value >= low && value < high {
        Outcome::Yes
    } else {
        Outcome::No
    }
}

fn final_score(game: &Game) -> Result<(i64, i64), Outcome> {
    match game.status() {
        GameStatus::Canceled => Err(Outcome::Canceled),
        GameStatus::Pending => Err(Outcome::Pending),
        GameStatus::Final => match (game.home_points(), game.away_points()) {
            (Some(home), Some(away)) => Ok((home, away)),
            // Marked final before the box score landed
            _ => Err(Outcome::Pending),
        },
    }
}

pub fn game_winner(game: &Game) -> Outcome {
    match final_score(game) {
        Ok((home, away)) if home > away => Outcome::Home,
        Ok((home, away)) if home < away => Outcome::Away,
        Ok(_) => Outcome::Tie,
        Err(outcome) => outcome,
    }
}

pub fn game_total(game: &Game, line: Decimal) -> Outcome {
    match final_score(game) {
        Ok((home, away)) => {
            let total = Decimal::from(home + away);
            match total.cmp(&line) {
                std::cmp::Ordering::Greater => Outcome::Over,
                std::cmp::Ordering::Less => Outcome::Under,
                std::cmp::Ordering::Equal => Outcome::Push,
            }
        }
        Err(outcome) => outcome,
    }
}
