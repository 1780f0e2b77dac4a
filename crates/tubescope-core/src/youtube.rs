//! YouTube Data API v3 client.
//!
//! Read-only: channel lookup by handle, uploads playlist enumeration and
//! batched video statistics. Shorts are not flagged by the API, so short
//! videos are classified by probing the `/shorts/<id>` URL.

use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, de::DeserializeOwned};

use crate::{
    error::{Result, TubescopeError},
    format::{format_duration, parse_iso8601_duration},
    types::{ChannelStats, ContentType, VideoRecord},
};

pub const API_BASE: &str = "https://www.googleapis.com/youtube/v3";
pub const SHORTS_BASE: &str = "https://www.youtube.com/shorts";

/// The Data API caps both page size and ids per `videos` call at 50.
pub const MAX_RESULTS_PER_PAGE: usize = 50;

/// Shorts may run up to three minutes; anything longer is never probed.
pub const SHORTS_MAX_SECONDS: u64 = 180;

/// Where channel and video data comes from.
#[async_trait]
pub trait ChannelSource: Send + Sync {
    async fn find_channel(&self, handle: &str) -> Result<Option<ChannelStats>>;

    async fn recent_video_ids(&self, uploads_playlist: &str, limit: usize) -> Result<Vec<String>>;

    async fn fetch_videos(&self, ids: &[String]) -> Result<Vec<VideoRecord>>;
}

pub struct YouTubeClient {
    http: reqwest::Client,
    probe: reqwest::Client,
    api_key: String,
}

impl YouTubeClient {
    pub fn new(api_key: impl Into<String>, probe_timeout: Duration) -> Result<Self> {
        let probe = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(probe_timeout)
            .build()?;

        Ok(Self {
            http: reqwest::Client::new(),
            probe,
            api_key: api_key.into(),
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, &str)],
    ) -> Result<T> {
        let url = format!("{}/{}", API_BASE, endpoint);
        tracing::debug!(endpoint, ?params, "YouTube API request");

        let response = self
            .http
            .get(&url)
            .query(params)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(endpoint, status = status.as_u16(), "YouTube API error");
            return Err(api_error(endpoint, status.as_u16(), body));
        }

        Ok(response.json::<T>().await?)
    }

    async fn channel_by(&self, key: &str, value: &str) -> Result<Option<ChannelStats>> {
        let response: ChannelListResponse = self
            .get_json(
                "channels",
                &[("part", "statistics,contentDetails,snippet"), (key, value)],
            )
            .await?;
        Ok(response.items.into_iter().next().map(ChannelItem::into_stats))
    }

    /// HEAD the Shorts URL without following redirects. Regular videos
    /// redirect to `/watch`; only Shorts answer 200.
    pub async fn probe_shorts(&self, video_id: &str) -> Result<bool> {
        let url = format!("{}/{}", SHORTS_BASE, video_id);
        let response = self
            .probe
            .head(&url)
            .send()
            .await
            .map_err(|source| TubescopeError::Probe {
                video_id: video_id.to_string(),
                source,
            })?;
        Ok(response.status() == reqwest::StatusCode::OK)
    }

    async fn classify(&self, video_id: &str, seconds: u64) -> ContentType {
        if !is_shorts_candidate(seconds) {
            return ContentType::LongForm;
        }
        match self.probe_shorts(video_id).await {
            Ok(true) => ContentType::Shorts,
            Ok(false) => ContentType::LongForm,
            Err(e) => {
                tracing::warn!(video_id, error = %e, "Shorts probe failed, counting as long-form");
                ContentType::LongForm
            }
        }
    }
}

#[async_trait]
impl ChannelSource for YouTubeClient {
    async fn find_channel(&self, handle: &str) -> Result<Option<ChannelStats>> {
        if handle.starts_with('@') {
            if let Some(channel) = self.channel_by("forHandle", handle).await? {
                return Ok(Some(channel));
            }
            tracing::debug!(handle, "forHandle lookup empty, falling back to search");
        }

        let search: SearchResponse = self
            .get_json(
                "search",
                &[
                    ("part", "id,snippet"),
                    ("type", "channel"),
                    ("maxResults", "1"),
                    ("q", handle),
                ],
            )
            .await?;

        let Some(channel_id) = search
            .items
            .into_iter()
            .find_map(|item| item.id.channel_id)
        else {
            return Ok(None);
        };

        self.channel_by("id", &channel_id).await
    }

    async fn recent_video_ids(&self, uploads_playlist: &str, limit: usize) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        let mut page_token: Option<String> = None;

        while ids.len() < limit {
            let page_size = (limit - ids.len()).min(MAX_RESULTS_PER_PAGE).to_string();
            let page: PlaylistItemsResponse = {
                let mut params = vec![
                    ("part", "contentDetails"),
                    ("playlistId", uploads_playlist),
                    ("maxResults", page_size.as_str()),
                ];
                if let Some(token) = page_token.as_deref() {
                    params.push(("pageToken", token));
                }
                self.get_json("playlistItems", &params).await?
            };

            if page.items.is_empty() {
                break;
            }
            ids.extend(page.items.into_iter().map(|item| item.content_details.video_id));

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        ids.truncate(limit);
        tracing::info!(count = ids.len(), "Collected recent video ids");
        Ok(ids)
    }

    async fn fetch_videos(&self, ids: &[String]) -> Result<Vec<VideoRecord>> {
        let mut videos = Vec::with_capacity(ids.len());

        for batch in ids.chunks(MAX_RESULTS_PER_PAGE) {
            let joined = batch.join(",");
            let response: VideoListResponse = self
                .get_json(
                    "videos",
                    &[
                        ("part", "statistics,contentDetails,snippet"),
                        ("id", joined.as_str()),
                    ],
                )
                .await?;

            for item in response.items {
                let seconds = item.duration_seconds();
                let content_type = self.classify(&item.id, seconds).await;
                videos.push(item.into_record(seconds, content_type));
            }
        }

        Ok(videos)
    }
}

pub fn is_shorts_candidate(seconds: u64) -> bool {
    seconds <= SHORTS_MAX_SECONDS
}

/// Accepts `@handle`, a bare name, or a channel URL such as
/// `https://www.youtube.com/@handle/videos`.
pub fn normalize_handle(input: &str) -> Result<String> {
    let input = input.trim();
    if input.is_empty() {
        return Err(TubescopeError::InvalidInput {
            reason: "channel handle is empty".to_string(),
        });
    }

    if input.starts_with("http") {
        if let Some(at) = input.find("/@") {
            let rest = &input[at + 1..];
            let handle = rest.split(['/', '?', '#']).next().unwrap_or(rest);
            return Ok(handle.to_string());
        }
        if let Some(pos) = input.find("/channel/") {
            let rest = &input[pos + "/channel/".len()..];
            let id = rest.split(['/', '?', '#']).next().unwrap_or(rest);
            return Ok(id.to_string());
        }
    }

    Ok(input.to_string())
}

fn api_error(endpoint: &str, status: u16, body: String) -> TubescopeError {
    let key_problem = body.contains("API_KEY_INVALID")
        || body.contains("keyInvalid")
        || body.contains("API key not valid");
    if matches!(status, 400 | 401 | 403) && key_problem {
        return TubescopeError::InvalidCredentials {
            service: "YouTube Data API".to_string(),
            reason: format!("{} returned {}", endpoint, status),
        };
    }
    TubescopeError::Api {
        endpoint: endpoint.to_string(),
        status,
        body,
    }
}

fn parse_count(value: Option<&str>) -> u64 {
    value.and_then(|v| v.parse().ok()).unwrap_or(0)
}

fn parse_published(value: &str) -> NaiveDate {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.date_naive())
        .or_else(|_| NaiveDate::parse_from_str(value.get(..10).unwrap_or(value), "%Y-%m-%d"))
        .unwrap_or_else(|e| {
            tracing::warn!(value, error = %e, "Unparseable publish date");
            NaiveDate::default()
        })
}

// YouTube API response structures

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: SearchId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchId {
    channel_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChannelListResponse {
    #[serde(default)]
    items: Vec<ChannelItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChannelItem {
    id: String,
    snippet: ChannelSnippet,
    #[serde(default)]
    statistics: ChannelStatistics,
    content_details: ChannelContentDetails,
}

impl ChannelItem {
    fn into_stats(self) -> ChannelStats {
        let thumbnail = ["high", "medium", "default"]
            .iter()
            .find_map(|size| self.snippet.thumbnails.get(*size))
            .map(|t| t.url.clone());

        ChannelStats {
            id: self.id,
            title: self.snippet.title,
            thumbnail,
            subscribers: parse_count(self.statistics.subscriber_count.as_deref()),
            views: parse_count(self.statistics.view_count.as_deref()),
            video_count: parse_count(self.statistics.video_count.as_deref()),
            uploads_playlist: self.content_details.related_playlists.uploads,
            description: self.snippet.description,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChannelSnippet {
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    thumbnails: HashMap<String, Thumbnail>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChannelStatistics {
    subscriber_count: Option<String>,
    view_count: Option<String>,
    video_count: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChannelContentDetails {
    related_playlists: RelatedPlaylists,
}

#[derive(Debug, Deserialize)]
struct RelatedPlaylists {
    uploads: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistItemsResponse {
    next_page_token: Option<String>,
    #[serde(default)]
    items: Vec<PlaylistItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistItem {
    content_details: PlaylistItemContentDetails,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistItemContentDetails {
    video_id: String,
}

#[derive(Debug, Deserialize)]
struct VideoListResponse {
    #[serde(default)]
    items: Vec<VideoItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoItem {
    id: String,
    snippet: VideoSnippet,
    #[serde(default)]
    statistics: VideoStatistics,
    content_details: VideoContentDetails,
}

impl VideoItem {
    fn duration_seconds(&self) -> u64 {
        let raw = &self.content_details.duration;
        parse_iso8601_duration(raw).unwrap_or_else(|| {
            tracing::warn!(video_id = %self.id, duration = %raw, "Unparseable duration");
            0
        })
    }

    fn into_record(self, duration_seconds: u64, content_type: ContentType) -> VideoRecord {
        VideoRecord {
            published: parse_published(&self.snippet.published_at),
            views: parse_count(self.statistics.view_count.as_deref()),
            likes: parse_count(self.statistics.like_count.as_deref()),
            comments: parse_count(self.statistics.comment_count.as_deref()),
            duration: format_duration(duration_seconds),
            duration_seconds,
            title: self.snippet.title,
            id: self.id,
            content_type,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoSnippet {
    title: String,
    published_at: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoStatistics {
    view_count: Option<String>,
    like_count: Option<String>,
    comment_count: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VideoContentDetails {
    duration: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_handle() {
        assert_eq!(normalize_handle(" @veritasium ").unwrap(), "@veritasium");
        assert_eq!(
            normalize_handle("https://www.youtube.com/@veritasium/videos").unwrap(),
            "@veritasium"
        );
        assert_eq!(
            normalize_handle("https://youtube.com/@chan?si=abc").unwrap(),
            "@chan"
        );
        assert_eq!(
            normalize_handle("https://www.youtube.com/channel/UCHnyfMqiRRG1u-2MsSQLbXA").unwrap(),
            "UCHnyfMqiRRG1u-2MsSQLbXA"
        );
        assert_eq!(normalize_handle("plain name").unwrap(), "plain name");
        assert!(matches!(
            normalize_handle("   "),
            Err(TubescopeError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_shorts_threshold() {
        assert!(is_shorts_candidate(0));
        assert!(is_shorts_candidate(59));
        assert!(is_shorts_candidate(180));
        assert!(!is_shorts_candidate(181));
    }

    #[test]
    fn test_api_error_classification() {
        let body = r#"{"error":{"code":400,"message":"API key not valid. Please pass a valid API key.","errors":[{"reason":"badRequest"}]}}"#;
        assert!(matches!(
            api_error("search", 400, body.to_string()),
            TubescopeError::InvalidCredentials { .. }
        ));

        let quota = r#"{"error":{"code":403,"errors":[{"reason":"quotaExceeded"}]}}"#;
        assert!(matches!(
            api_error("videos", 403, quota.to_string()),
            TubescopeError::Api { status: 403, .. }
        ));
    }

    #[test]
    fn test_channel_response_into_stats() {
        let json = r#"{
            "kind": "youtube#channelListResponse",
            "items": [{
                "id": "UC123",
                "snippet": {
                    "title": "Some Channel",
                    "description": "About us",
                    "thumbnails": {
                        "default": {"url": "https://img/default.jpg"},
                        "high": {"url": "https://img/high.jpg"}
                    }
                },
                "statistics": {
                    "viewCount": "123456",
                    "subscriberCount": "789",
                    "hiddenSubscriberCount": false,
                    "videoCount": "42"
                },
                "contentDetails": {"relatedPlaylists": {"likes": "", "uploads": "UU123"}}
            }]
        }"#;
        let response: ChannelListResponse = serde_json::from_str(json).unwrap();
        let stats = response.items.into_iter().next().unwrap().into_stats();
        assert_eq!(stats.id, "UC123");
        assert_eq!(stats.title, "Some Channel");
        assert_eq!(stats.thumbnail.as_deref(), Some("https://img/high.jpg"));
        assert_eq!(stats.subscribers, 789);
        assert_eq!(stats.views, 123456);
        assert_eq!(stats.video_count, 42);
        assert_eq!(stats.uploads_playlist, "UU123");
    }

    #[test]
    fn test_hidden_subscribers_default_to_zero() {
        let json = r#"{"items": [{
            "id": "UC1",
            "snippet": {"title": "Hidden"},
            "statistics": {"viewCount": "10", "hiddenSubscriberCount": true, "videoCount": "1"},
            "contentDetails": {"relatedPlaylists": {"uploads": "UU1"}}
        }]}"#;
        let response: ChannelListResponse = serde_json::from_str(json).unwrap();
        let stats = response.items.into_iter().next().unwrap().into_stats();
        assert_eq!(stats.subscribers, 0);
        assert_eq!(stats.thumbnail, None);
    }

    #[test]
    fn test_search_response_without_items() {
        let response: SearchResponse =
            serde_json::from_str(r#"{"kind": "youtube#searchListResponse"}"#).unwrap();
        assert!(response.items.is_empty());
    }

    #[test]
    fn test_playlist_page() {
        let json = r#"{
            "nextPageToken": "CDIQAA",
            "items": [
                {"contentDetails": {"videoId": "a1", "videoPublishedAt": "2025-01-01T00:00:00Z"}},
                {"contentDetails": {"videoId": "b2"}}
            ]
        }"#;
        let page: PlaylistItemsResponse = serde_json::from_str(json).unwrap();
        assert_eq!(page.next_page_token.as_deref(), Some("CDIQAA"));
        let ids: Vec<_> = page
            .items
            .into_iter()
            .map(|i| i.content_details.video_id)
            .collect();
        assert_eq!(ids, ["a1", "b2"]);
    }

    #[test]
    fn test_video_item_into_record() {
        let json = r#"{"items": [{
            "id": "vid1",
            "snippet": {"title": "Deep dive", "publishedAt": "2024-11-03T18:00:01Z"},
            "statistics": {"viewCount": "5000", "likeCount": "250"},
            "contentDetails": {"duration": "PT1H2M5S"}
        }]}"#;
        let response: VideoListResponse = serde_json::from_str(json).unwrap();
        let item = response.items.into_iter().next().unwrap();
        let seconds = item.duration_seconds();
        assert_eq!(seconds, 3725);

        let record = item.into_record(seconds, ContentType::LongForm);
        assert_eq!(record.duration, "1:02:05");
        assert_eq!(record.views, 5000);
        assert_eq!(record.likes, 250);
        assert_eq!(record.comments, 0);
        assert_eq!(record.published, NaiveDate::from_ymd_opt(2024, 11, 3).unwrap());
    }

    #[test]
    fn test_parse_published_fallbacks() {
        assert_eq!(
            parse_published("2023-02-10"),
            NaiveDate::from_ymd_opt(2023, 2, 10).unwrap()
        );
        assert_eq!(parse_published("garbage"), NaiveDate::default());
    }
}
