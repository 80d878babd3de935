//! YouTube Data API v3: video statistics and caption track listing

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::fallback::FallbackClient;
use crate::config::Config;
use crate::error::{FetchError, FetchResult};
use crate::resolver::VideoSource;

const API_KEY_VAR: &str = "YOUTUBE_API_KEY";

#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct VideoItem {
    statistics: Option<RawStatistics>,
}

/// The API reports counts as decimal strings
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawStatistics {
    view_count: Option<String>,
    like_count: Option<String>,
    comment_count: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VideoStatistics {
    pub view_count: u64,
    pub like_count: Option<u64>,
    pub comment_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct CaptionItem {
    snippet: CaptionTrack,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptionTrack {
    pub language: String,
    #[serde(default)]
    pub track_kind: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Clone)]
pub struct YouTubeClient {
    http: FallbackClient,
    api_key: Option<String>,
}

impl YouTubeClient {
    pub fn new(http: FallbackClient, api_key: Option<String>) -> Self {
        Self { http, api_key }
    }

    pub fn from_config(config: &Config) -> FetchResult<Self> {
        let http = FallbackClient::new(config.youtube.clone(), config.http_timeout_secs)?;
        Ok(Self::new(http, config.youtube_api_key.clone()))
    }

    fn key(&self) -> FetchResult<String> {
        self.api_key
            .clone()
            .ok_or(FetchError::MissingApiKey(API_KEY_VAR))
    }

    pub async fn video_statistics(&self, video_id: &str) -> FetchResult<VideoStatistics> {
        let query = [
            ("part", "statistics".to_string()),
            ("id", video_id.to_string()),
            ("key", self.key()?),
        ];
        debug!(video_id, "Fetching video statistics");
        let resp: ListResponse<VideoItem> = self.http.get_json("/youtube/v3/videos", &query).await?;

        let raw = resp
            .items
            .into_iter()
            .next()
            .and_then(|item| item.statistics)
            .ok_or_else(|| FetchError::MissingData(format!("video {video_id} not found")))?;

        let view_count = parse_count(raw.view_count.as_deref()).ok_or_else(|| {
            FetchError::MissingData(format!("video {video_id} has no public view count"))
        })?;

        Ok(VideoStatistics {
            view_count,
            like_count: parse_count(raw.like_count.as_deref()),
            comment_count: parse_count(raw.comment_count.as_deref()),
        })
    }

    pub async fn caption_tracks(&self, video_id: &str) -> FetchResult<Vec<CaptionTrack>> {
        let query = [
            ("part", "snippet".to_string()),
            ("videoId", video_id.to_string()),
            ("key", self.key()?),
        ];
        debug!(video_id, "Fetching caption tracks");
        let resp: ListResponse<CaptionItem> =
            self.http.get_json("/youtube/v3/captions", &query).await?;
        Ok(resp.items.into_iter().map(|item| item.snippet).collect())
    }
}

fn parse_count(raw: Option<&str>) -> Option<u64> {
    raw.and_then(|s| s.parse().ok())
}

#[async_trait]
impl VideoSource for YouTubeClient {
    async fn video_statistics(&self, video_id: &str) -> FetchResult<VideoStatistics> {
        YouTubeClient::video_statistics(self, video_id).await
    }

    async fn caption_tracks(&self, video_id: &str) -> FetchResult<Vec<CaptionTrack>> {
        YouTubeClient::caption_tracks(self, video_id).await
    }
}
