//! Provider API clients, all routed through the proxy-then-primary fetch

pub mod binance;
pub mod fallback;
pub mod sports_data;
pub mod youtube;

pub use binance::BinanceClient;
pub use fallback::FallbackClient;
pub use sports_data::{Game, GameStatus, League, PlayerGameStat, SportsDataClient};
pub use youtube::{CaptionTrack, VideoStatistics, YouTubeClient};
