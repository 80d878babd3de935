//! Binance market data client (klines and spot price), proxied
//!
//! The proxy mirror is expected to expose the same `/api/v3/...` paths and
//! response shapes as Binance itself.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;
use tracing::debug;

use crate::api::fallback::FallbackClient;
use crate::config::Config;
use crate::error::{FetchError, FetchResult};
use crate::resolver::KlineSource;
use crate::types::{Interval, Kline};

const MAX_KLINES_PER_REQUEST: u32 = 1000;

/// Binance public market data client
#[derive(Clone)]
pub struct BinanceClient {
    http: FallbackClient,
}

/// Raw kline data from Binance API (array of arrays)
#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct RawKline(
    i64,    // 0: Open time
    String, // 1: Open
    String, // 2: High
    String, // 3: Low
    String, // 4: Close
    String, // 5: Volume
    i64,    // 6: Close time
    String, // 7: Quote asset volume
    u64,    // 8: Number of trades
    String, // 9: Taker buy base
    String, // 10: Taker buy quote
    String, // 11: Ignore
);

impl RawKline {
    fn into_kline(self) -> Option<Kline> {
        Some(Kline {
            open_time: self.0,
            open: Decimal::from_str(&self.1).ok()?,
            high: Decimal::from_str(&self.2).ok()?,
            low: Decimal::from_str(&self.3).ok()?,
            close: Decimal::from_str(&self.4).ok()?,
            volume: Decimal::from_str(&self.5).ok()?,
            close_time: self.6,
        })
    }
}

/// Binance ticker price response
#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct TickerPrice {
    symbol: String,
    price: String,
}

impl BinanceClient {
    pub fn new(http: FallbackClient) -> Self {
        Self { http }
    }

    pub fn from_config(config: &Config) -> FetchResult<Self> {
        let mut http = FallbackClient::new(config.binance.clone(), config.http_timeout_secs)?;
        if let Some(key) = &config.binance_api_key {
            http = http.with_header("x-mbx-apikey", key)?;
        }
        Ok(Self::new(http))
    }

    /// Fetch klines (candlestick data) for a symbol
    pub async fn get_klines(
        &self,
        symbol: &str,
        interval: Interval,
        start_time: Option<i64>,
        end_time: Option<i64>,
        limit: Option<u32>,
    ) -> FetchResult<Vec<Kline>> {
        let query = klines_query(symbol, interval, start_time, end_time, limit);
        debug!(symbol, %interval, "Fetching klines from Binance");

        let raw_klines: Vec<RawKline> = self.http.get_json("/api/v3/klines", &query).await?;
        let klines = parse_klines(raw_klines);

        debug!(count = klines.len(), "Fetched klines");
        Ok(klines)
    }

    /// Fetch klines as the untouched upstream rows, all twelve columns
    pub async fn get_kline_rows(
        &self,
        symbol: &str,
        interval: Interval,
        start_time: Option<i64>,
        end_time: Option<i64>,
        limit: Option<u32>,
    ) -> FetchResult<Vec<serde_json::Value>> {
        let query = klines_query(symbol, interval, start_time, end_time, limit);
        debug!(symbol, %interval, "Fetching raw kline rows from Binance");
        self.http.get_json("/api/v3/klines", &query).await
    }

    /// The candle that opens exactly at `open_time`
    pub async fn candle_at(
        &self,
        symbol: &str,
        interval: Interval,
        open_time: i64,
    ) -> FetchResult<Kline> {
        let klines = self
            .get_klines(symbol, interval, Some(open_time), None, Some(1))
            .await?;
        pick_candle(klines, symbol, interval, open_time)
    }

    /// Get current price for a symbol
    pub async fn get_price(&self, symbol: &str) -> FetchResult<Decimal> {
        let query = [("symbol", symbol.to_string())];
        let ticker: TickerPrice = self.http.get_json("/api/v3/ticker/price", &query).await?;
        Decimal::from_str(&ticker.price).map_err(|e| FetchError::Decode {
            url: "/api/v3/ticker/price".to_string(),
            message: format!("price '{}': {}", ticker.price, e),
        })
    }
}

#[async_trait]
impl KlineSource for BinanceClient {
    async fn candle_at(&self, symbol: &str, interval: Interval, open_time: i64) -> FetchResult<Kline> {
        BinanceClient::candle_at(self, symbol, interval, open_time).await
    }
}

fn klines_query(
    symbol: &str,
    interval: Interval,
    start_time: Option<i64>,
    end_time: Option<i64>,
    limit: Option<u32>,
) -> Vec<(&'static str, String)> {
    let mut query = vec![
        ("symbol", symbol.to_string()),
        ("interval", interval.to_string()),
    ];
    if let Some(start) = start_time {
        query.push(("startTime", start.to_string()));
    }
    if let Some(end) = end_time {
        query.push(("endTime", end.to_string()));
    }
    let limit = limit.unwrap_or(500).min(MAX_KLINES_PER_REQUEST);
    query.push(("limit", limit.to_string()));
    query
}

fn parse_klines(raw: Vec<RawKline>) -> Vec<Kline> {
    raw.into_iter().filter_map(RawKline::into_kline).collect()
}

fn pick_candle(
    klines: Vec<Kline>,
    symbol: &str,
    interval: Interval,
    open_time: i64,
) -> FetchResult<Kline> {
    klines
        .into_iter()
        .find(|k| k.open_time == open_time)
        .ok_or_else(|| {
            FetchError::MissingData(format!(
                "no {interval} {symbol} candle opening at {open_time}"
            ))
        })
}
