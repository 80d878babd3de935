//! Market resolution engine
//!
//! Provides:
//! - Proxy-then-primary HTTP fetch shared by every provider client
//! - Binance, SportsDataIO and YouTube Data API clients
//! - Timezone-aware conversion of market times to provider timestamps
//! - Declarative market files and the resolver that turns them into
//!   `recommendation: pN` tokens

pub mod api;
pub mod config;
pub mod error;
pub mod market;
pub mod resolution;
pub mod resolver;
pub mod time;
pub mod types;

// Re-exports for convenience
pub use api::{BinanceClient, FallbackClient, League, SportsDataClient, YouTubeClient};
pub use config::{Config, Endpoint};
pub use error::{FetchError, MarketError, TimeError};
pub use market::{load, market_files, Market, MarketFile, MarketQuery};
pub use resolution::{Comparison, Outcome, OutcomeMap, Recommendation};
pub use resolver::{KlineSource, Resolution, Resolver, SportsSource, VideoSource};
pub use types::{Interval, Kline};
