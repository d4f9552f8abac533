//! Google Photos Library API client

use std::time::Duration;

use bytes::Bytes;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, error, warn};

use crate::auth::Credentials;
use crate::error::{PhotosError, PhotosResult};
use crate::models::{
    BatchGetMediaItemsResponse, BatchItem, ListMediaItemsResponse, MediaPage, MediaRecord,
};
use crate::source::{MAX_BATCH_SIZE, MediaSource};

pub const DEFAULT_API_BASE_URL: &str = "https://photoslibrary.googleapis.com";

const LIST_ENDPOINT: &str = "mediaItems.list";
const BATCH_GET_ENDPOINT: &str = "mediaItems.batchGet";
const FETCH_ENDPOINT: &str = "media bytes";

/// Configuration for the Library API client
#[derive(Debug, Clone)]
pub struct PhotosConfig {
    /// Scheme and host of the API, without trailing slash
    pub api_base_url: String,
    /// Items requested per listing page (the API caps this at 100)
    pub page_size: u32,
    /// Upper bound for any single HTTP exchange
    pub request_timeout: Duration,
}

impl Default for PhotosConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            page_size: 100,
            request_timeout: Duration::from_secs(60),
        }
    }
}

/// Authenticated client for the Library API
#[derive(Debug, Clone)]
pub struct GooglePhotosClient {
    http: Client,
    config: PhotosConfig,
    credentials: Credentials,
}

impl GooglePhotosClient {
    pub fn new(config: PhotosConfig, credentials: Credentials) -> PhotosResult<Self> {
        let http = Client::builder().timeout(config.request_timeout).build()?;

        Ok(Self {
            http,
            config,
            credentials,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_base_url.trim_end_matches('/'), path)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &'static str,
        url: &str,
        query: &[(&str, &str)],
    ) -> PhotosResult<T> {
        let token = self.credentials.access_token().await?;

        let response = self
            .http
            .get(url)
            .bearer_auth(token)
            .query(query)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            if status == StatusCode::UNAUTHORIZED {
                self.credentials.invalidate().await;
            }
            error!("Received {} from {}", status, endpoint);
            return Err(PhotosError::Status {
                endpoint,
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|source| PhotosError::Decode { endpoint, source })
    }
}

impl MediaSource for GooglePhotosClient {
    async fn list_page(&self, page_token: Option<&str>) -> PhotosResult<MediaPage> {
        let page_size = self.config.page_size.to_string();
        let mut query = vec![("pageSize", page_size.as_str())];
        if let Some(token) = page_token {
            query.push(("pageToken", token));
        }

        let response: ListMediaItemsResponse = self
            .get_json(LIST_ENDPOINT, &self.url("/v1/mediaItems"), &query)
            .await?;

        Ok(response.into())
    }

    async fn batch_get(&self, ids: &[String]) -> PhotosResult<Vec<BatchItem>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        if ids.len() > MAX_BATCH_SIZE {
            return Err(PhotosError::InvalidRequest(format!(
                "batchGet accepts at most {} ids, got {}",
                MAX_BATCH_SIZE,
                ids.len()
            )));
        }

        let query: Vec<(&str, &str)> = ids.iter().map(|id| ("mediaItemIds", id.as_str())).collect();

        let response: BatchGetMediaItemsResponse = self
            .get_json(
                BATCH_GET_ENDPOINT,
                &self.url("/v1/mediaItems:batchGet"),
                &query,
            )
            .await?;

        if response.media_item_results.len() != ids.len() {
            warn!(
                "batchGet returned {} results for {} ids",
                response.media_item_results.len(),
                ids.len()
            );
        }

        // Resolved items carry their own id; failed ones only have their position.
        let items = response
            .media_item_results
            .into_iter()
            .enumerate()
            .map(|(index, result)| {
                let record = result.media_item.map(MediaRecord::from);
                let requested_id = match &record {
                    Some(record) => record.id.clone(),
                    None => ids.get(index).cloned().unwrap_or_default(),
                };
                BatchItem {
                    requested_id,
                    code: result.status.code,
                    message: result.status.message,
                    record,
                }
            })
            .collect();

        Ok(items)
    }

    async fn fetch_bytes(&self, url: &str) -> PhotosResult<Bytes> {
        debug!("Downloading {}", url);

        let response = self.http.get(url).send().await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(PhotosError::Status {
                endpoint: FETCH_ENDPOINT,
                status: status.as_u16(),
            });
        }

        Ok(response.bytes().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joins_without_double_slash() {
        let config = PhotosConfig {
            api_base_url: "http://localhost:8080/".to_string(),
            ..PhotosConfig::default()
        };
        let client = GooglePhotosClient::new(config, Credentials::from_access_token("t"))
            .expect("client builds");

        assert_eq!(
            client.url("/v1/mediaItems"),
            "http://localhost:8080/v1/mediaItems"
        );
    }

    #[tokio::test]
    async fn test_batch_get_rejects_oversized_batch() {
        let client = GooglePhotosClient::new(
            PhotosConfig::default(),
            Credentials::from_access_token("t"),
        )
        .expect("client builds");
        let ids: Vec<String> = (0..=MAX_BATCH_SIZE).map(|i| i.to_string()).collect();

        let result = client.batch_get(&ids).await;
        assert!(matches!(result, Err(PhotosError::InvalidRequest(_))));
    }
}
