//! YouTube Data API v3 implementation of [`EntityApi`]
//!
//! - parent lookup: `channels.list`
//! - child listing: `search.list` restricted to videos of one channel
//! - child details: `videos.list`, up to 50 IDs per call

use super::{ChildDetail, ChildPage, EntityApi, MAX_IDS_PER_DETAIL_REQUEST};
use crate::error::{Error, Result};
use crate::http::{ApiRequest, ResilientClient};
use crate::pagination::PageRequest;
use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

/// Default API root
pub const YOUTUBE_API_URL: &str = "https://www.googleapis.com/youtube/v3";

/// Parts requested from `channels.list`
pub const CHANNEL_PARTS: &str = "brandingSettings,id,snippet,statistics";

/// Parts requested from `videos.list`
pub const VIDEO_PARTS: &str = "contentDetails,id,liveStreamingDetails,localizations,\
                               recordingDetails,snippet,statistics,status,topicDetails";

const VIDEO_KIND: &str = "youtube#video";

/// YouTube-backed entity API
#[derive(Debug)]
pub struct YouTubeApi {
    client: ResilientClient,
    listing_order: String,
}

impl YouTubeApi {
    /// Create an API over a configured client
    ///
    /// The client is expected to carry the API key as a default `key` query
    /// parameter.
    pub fn new(client: ResilientClient) -> Self {
        Self {
            client,
            listing_order: "date".to_string(),
        }
    }

    /// Set the `order` used for the child listing (default `date`)
    #[must_use]
    pub fn with_listing_order(mut self, order: impl Into<String>) -> Self {
        self.listing_order = order.into();
        self
    }

    /// Underlying client
    pub fn client(&self) -> &ResilientClient {
        &self.client
    }
}

fn items(body: &Value) -> &[Value] {
    body.get("items")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

#[async_trait]
impl EntityApi for YouTubeApi {
    async fn get_parent(&self, parent_id: &str) -> Result<Value> {
        let request = ApiRequest::get("channels")
            .query("part", CHANNEL_PARTS)
            .query("id", parent_id);
        let body = self.client.execute(&request).await?;

        items(&body)
            .iter()
            .find(|item| item.get("id").and_then(Value::as_str) == Some(parent_id))
            .or_else(|| items(&body).first())
            .cloned()
            .ok_or_else(|| Error::NotFound {
                body: format!("channel {parent_id} not found"),
            })
    }

    async fn list_children(&self, parent_id: &str, page: &PageRequest) -> Result<ChildPage> {
        let mut request = ApiRequest::get("search")
            .query("part", "id")
            .query("channelId", parent_id)
            .query("type", "video")
            .query("order", self.listing_order.as_str())
            .query("maxResults", page.max_results.to_string());
        if let Some(token) = &page.page_token {
            request = request.query("pageToken", token.as_str());
        }

        let body = self.client.execute(&request).await?;

        let child_ids: Vec<String> = items(&body)
            .iter()
            .filter_map(|item| item.get("id"))
            .filter(|id| id.get("kind").and_then(Value::as_str) == Some(VIDEO_KIND))
            .filter_map(|id| id.get("videoId").and_then(Value::as_str))
            .map(str::to_string)
            .collect();
        let next_page_token = body
            .get("nextPageToken")
            .and_then(Value::as_str)
            .map(str::to_string);

        debug!(
            parent_id,
            ids = child_ids.len(),
            has_next = next_page_token.is_some(),
            "Listed child page"
        );
        Ok(ChildPage {
            child_ids,
            next_page_token,
        })
    }

    async fn get_children_details(&self, child_ids: &[String]) -> Result<Vec<ChildDetail>> {
        if child_ids.is_empty() {
            return Ok(Vec::new());
        }
        if child_ids.len() > MAX_IDS_PER_DETAIL_REQUEST {
            return Err(Error::Other(format!(
                "detail batch of {} IDs exceeds provider limit of {MAX_IDS_PER_DETAIL_REQUEST}",
                child_ids.len()
            )));
        }

        let request = ApiRequest::get("videos")
            .query("part", VIDEO_PARTS)
            .query("id", child_ids.join(","));
        let body = self.client.execute(&request).await?;

        let details = items(&body)
            .iter()
            .filter_map(|item| match item.get("id").and_then(Value::as_str) {
                Some(id) => Some(ChildDetail {
                    id: id.to_string(),
                    payload: item.clone(),
                }),
                None => {
                    warn!("Skipping video item without an id");
                    None
                }
            })
            .collect();
        Ok(details)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{ClientConfig, RateLimiter};
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{method, path, query_param, query_param_is_missing};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn api(server: &MockServer) -> YouTubeApi {
        let config = ClientConfig::builder()
            .base_url(server.uri())
            .default_query("key", "test-key")
            .backoff(Duration::from_millis(1), Duration::from_millis(5), Duration::ZERO)
            .build();
        let client = ResilientClient::new(config, RateLimiter::per_second(1000).unwrap()).unwrap();
        YouTubeApi::new(client)
    }

    #[tokio::test]
    async fn test_get_parent_returns_item() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/channels"))
            .and(query_param("id", "UC1"))
            .and(query_param("part", CHANNEL_PARTS))
            .and(query_param("key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{"id": "UC1", "snippet": {"title": "One"}}]
            })))
            .mount(&server)
            .await;

        let parent = api(&server).get_parent("UC1").await.unwrap();
        assert_eq!(parent["snippet"]["title"], "One");
    }

    #[tokio::test]
    async fn test_get_parent_empty_items_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/channels"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": []})))
            .mount(&server)
            .await;

        let err = api(&server).get_parent("UCX").await.unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_list_children_filters_videos_and_passes_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("channelId", "UC1"))
            .and(query_param("type", "video"))
            .and(query_param("order", "date"))
            .and(query_param("maxResults", "7"))
            .and(query_param("pageToken", "P2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "nextPageToken": "P3",
                "items": [
                    {"id": {"kind": "youtube#video", "videoId": "v1"}},
                    {"id": {"kind": "youtube#playlist", "playlistId": "pl"}},
                    {"id": {"kind": "youtube#video", "videoId": "v2"}}
                ]
            })))
            .mount(&server)
            .await;

        let page = api(&server)
            .list_children(
                "UC1",
                &PageRequest {
                    page_token: Some("P2".to_string()),
                    max_results: 7,
                },
            )
            .await
            .unwrap();

        assert_eq!(page.child_ids, vec!["v1", "v2"]);
        assert_eq!(page.next_page_token.as_deref(), Some("P3"));
    }

    #[tokio::test]
    async fn test_first_listing_page_has_no_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param_is_missing("pageToken"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": []})))
            .expect(1)
            .mount(&server)
            .await;

        let page = api(&server)
            .list_children(
                "UC1",
                &PageRequest {
                    page_token: None,
                    max_results: 50,
                },
            )
            .await
            .unwrap();
        assert!(page.child_ids.is_empty());
        assert!(page.next_page_token.is_none());
    }

    #[tokio::test]
    async fn test_details_joins_ids() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/videos"))
            .and(query_param("id", "a,b,c"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{"id": "a", "snippet": {}}, {"id": "c"}, {"snippet": {}}]
            })))
            .mount(&server)
            .await;

        let ids: Vec<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
        let details = api(&server).get_children_details(&ids).await.unwrap();

        let returned: Vec<&str> = details.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(returned, vec!["a", "c"]);
    }

    #[tokio::test]
    async fn test_details_rejects_oversized_batch() {
        let server = MockServer::start().await;
        let ids: Vec<String> = (0..51).map(|i| format!("v{i}")).collect();
        assert!(api(&server).get_children_details(&ids).await.is_err());
        assert!(server.received_requests().await.unwrap().is_empty());
    }
}
