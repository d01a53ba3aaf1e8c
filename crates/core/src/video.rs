//! Video search collaborators used to enrich subtopics.

use crate::error::{FetchError, ParseError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const YOUTUBE_SEARCH_URL: &str = "https://www.googleapis.com/youtube/v3/search";
const YOUTUBE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoResult {
    pub title: String,
    pub url: String,
    pub thumbnail: String,
}

/// Searches an external provider for videos matching a free-text query.
#[async_trait]
pub trait VideoSearch: Send + Sync {
    async fn search(&self, query: &str, max_results: usize)
    -> Result<Vec<VideoResult>, FetchError>;
}

/// `VideoSearch` over the YouTube Data API v3.
pub struct YouTubeSearch {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl YouTubeSearch {
    pub fn new(api_key: String) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(YOUTUBE_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            api_key,
            base_url: YOUTUBE_SEARCH_URL.to_string(),
        })
    }

    /// Points the client at a different endpoint (proxies, fakes).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl VideoSearch for YouTubeSearch {
    async fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<VideoResult>, FetchError> {
        let max_results = max_results.to_string();
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("part", "snippet"),
                ("q", query),
                ("maxResults", max_results.as_str()),
                ("type", "video"),
                ("videoDuration", "medium"),
                ("order", "viewCount"),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                service: "youtube",
                status,
            });
        }

        let body = response.text().await?;
        let videos = parse_search_response(&body)?;
        debug!(%query, count = videos.len(), "YouTube search completed");
        Ok(videos)
    }
}

#[derive(Deserialize)]
struct SearchListResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Deserialize)]
struct SearchItem {
    id: SearchItemId,
    snippet: Snippet,
}

#[derive(Deserialize)]
struct SearchItemId {
    #[serde(rename = "videoId")]
    video_id: Option<String>,
}

#[derive(Deserialize)]
struct Snippet {
    title: Option<String>,
    #[serde(default)]
    thumbnails: Thumbnails,
}

#[derive(Deserialize, Default)]
struct Thumbnails {
    medium: Option<Thumbnail>,
}

#[derive(Deserialize)]
struct Thumbnail {
    url: String,
}

/// Maps a YouTube `search.list` body onto [`VideoResult`]s.
fn parse_search_response(body: &str) -> Result<Vec<VideoResult>, ParseError> {
    let response: SearchListResponse = serde_json::from_str(body)?;
    response
        .items
        .into_iter()
        .map(|item| {
            let video_id = item.id.video_id.ok_or(ParseError::MissingField("videoId"))?;
            let thumbnail = item
                .snippet
                .thumbnails
                .medium
                .ok_or(ParseError::MissingField("thumbnails.medium"))?;
            Ok(VideoResult {
                title: item.snippet.title.unwrap_or_else(|| "No title".to_string()),
                url: format!("https://www.youtube.com/watch?v={video_id}"),
                thumbnail: thumbnail.url,
            })
        })
        .collect()
}

/// A mock `VideoSearch` returning placeholder videos derived from the query.
pub struct MockVideoSearch;

#[async_trait]
impl VideoSearch for MockVideoSearch {
    async fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<VideoResult>, FetchError> {
        Ok((1..=max_results)
            .map(|n| VideoResult {
                title: format!("{query} #{n}"),
                url: format!("https://example.com/videos/{n}"),
                thumbnail: format!("https://example.com/thumbnails/{n}.jpg"),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_youtube_items() {
        let body = r#"{
            "items": [
                {
                    "id": {"kind": "youtube#video", "videoId": "abc123"},
                    "snippet": {
                        "title": "Rome in 10 minutes",
                        "thumbnails": {"medium": {"url": "https://i.ytimg.com/vi/abc123/mqdefault.jpg"}}
                    }
                },
                {
                    "id": {"videoId": "def456"},
                    "snippet": {"thumbnails": {"medium": {"url": "t2"}}}
                }
            ]
        }"#;
        let videos = parse_search_response(body).unwrap();
        assert_eq!(videos.len(), 2);
        assert_eq!(videos[0].title, "Rome in 10 minutes");
        assert_eq!(videos[0].url, "https://www.youtube.com/watch?v=abc123");
        assert_eq!(
            videos[0].thumbnail,
            "https://i.ytimg.com/vi/abc123/mqdefault.jpg"
        );
        assert_eq!(videos[1].title, "No title");
    }

    #[test]
    fn missing_items_means_no_results() {
        assert!(parse_search_response("{}").unwrap().is_empty());
    }

    #[test]
    fn item_without_video_id_is_a_parse_error() {
        let body = r#"{"items": [{"id": {"channelId": "x"}, "snippet": {"title": "t"}}]}"#;
        assert!(matches!(
            parse_search_response(body),
            Err(ParseError::MissingField("videoId"))
        ));
    }

    #[tokio::test]
    async fn mock_search_honours_max_results() {
        let videos = MockVideoSearch.search("History Rome", 3).await.unwrap();
        assert_eq!(videos.len(), 3);
        assert_eq!(videos[0].title, "History Rome #1");
    }
}
