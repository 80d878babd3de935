//! Shared market data types

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::TimeError;

/// A single candlestick (OHLCV)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Kline {
    pub open_time: i64,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
    pub close_time: i64,
}

impl Kline {
    /// Whether the candle had fully closed at `now_ms`
    pub fn is_closed(&self, now_ms: i64) -> bool {
        self.close_time < now_ms
    }
}

/// A Binance kline interval. Monthly candles are not supported because
/// their length varies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Interval {
    millis: i64,
    label: &'static str,
}

const MINUTE_MS: i64 = 60_000;
const HOUR_MS: i64 = 60 * MINUTE_MS;
const DAY_MS: i64 = 24 * HOUR_MS;

const INTERVALS: &[(&str, i64)] = &[
    ("1m", MINUTE_MS),
    ("3m", 3 * MINUTE_MS),
    ("5m", 5 * MINUTE_MS),
    ("15m", 15 * MINUTE_MS),
    ("30m", 30 * MINUTE_MS),
    ("1h", HOUR_MS),
    ("2h", 2 * HOUR_MS),
    ("4h", 4 * HOUR_MS),
    ("6h", 6 * HOUR_MS),
    ("8h", 8 * HOUR_MS),
    ("12h", 12 * HOUR_MS),
    ("1d", DAY_MS),
    ("3d", 3 * DAY_MS),
    ("1w", 7 * DAY_MS),
];

impl Interval {
    pub const ONE_MINUTE: Interval = Interval {
        millis: MINUTE_MS,
        label: "1m",
    };

    pub fn millis(&self) -> i64 {
        self.millis
    }

    pub fn as_str(&self) -> &'static str {
        self.label
    }
}

impl FromStr for Interval {
    type Err = TimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        INTERVALS
            .iter()
            .find(|(label, _)| *label == s.trim())
            .map(|&(label, millis)| Interval { millis, label })
            .ok_or_else(|| TimeError::Interval(s.to_string()))
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_interval_parse() {
        let hour: Interval = "1h".parse().unwrap();
        assert_eq!(hour.millis(), 3_600_000);
        assert_eq!(hour.to_string(), "1h");
        assert_eq!("1m".parse::<Interval>().unwrap(), Interval::ONE_MINUTE);
        assert!("1M".parse::<Interval>().is_err());
        assert!("7m".parse::<Interval>().is_err());
    }

    #[test]
    fn test_kline_closed() {
        let k = Kline {
            open_time: 0,
            open: dec!(1),
            high: dec!(1),
            low: dec!(1),
            close: dec!(1),
            volume: dec!(0),
            close_time: 59_999,
        };
        assert!(!k.is_closed(59_999));
        assert!(k.is_closed(60_000));
    }
}
