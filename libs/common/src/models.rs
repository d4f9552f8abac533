//! Media data model
//!
//! Wire types mirror the Google Photos Library API JSON; [`MediaRecord`] is
//! the flattened form the caches keep in memory.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Processing state of a video item
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VideoStatus {
    Processing,
    Ready,
    Failed,
    /// `UNSPECIFIED` or anything this client does not recognise
    #[default]
    #[serde(alias = "UNSPECIFIED", other)]
    Unknown,
}

/// One remote media object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaRecord {
    pub id: String,
    /// Time-limited fetch URL prefix, empty until resolved
    pub base_url: String,
    pub mime_type: String,
    pub creation_time: Option<DateTime<Utc>>,
    pub video_status: VideoStatus,
    pub filename: String,
}

impl MediaRecord {
    /// A record that only knows its id, as restored from a snapshot
    pub fn from_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            base_url: String::new(),
            mime_type: String::new(),
            creation_time: None,
            video_status: VideoStatus::Unknown,
            filename: String::new(),
        }
    }

    /// Whether the item should be fetched as a playable video.
    ///
    /// Videos that are still processing are treated as stills.
    pub fn is_video(&self) -> bool {
        self.mime_type.starts_with("video/") && self.video_status == VideoStatus::Ready
    }

    /// Size/format qualified URL for downloading the item's bytes
    pub fn fetch_url(&self, image_width: u32) -> String {
        if self.is_video() {
            format!("{}=dv", self.base_url)
        } else {
            format!("{}=w{}", self.base_url, image_width)
        }
    }
}

/// One page of the library listing
#[derive(Debug, Clone, Default)]
pub struct MediaPage {
    pub records: Vec<MediaRecord>,
    /// `None` on the last page
    pub next_page_token: Option<String>,
}

/// Per-id outcome of a batch lookup
#[derive(Debug, Clone)]
pub struct BatchItem {
    pub requested_id: String,
    /// google.rpc.Code, 0 is OK
    pub code: i32,
    pub message: String,
    pub record: Option<MediaRecord>,
}

impl BatchItem {
    pub fn is_ok(&self) -> bool {
        self.code == 0 && self.record.is_some()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoMetadata {
    #[serde(default)]
    pub status: VideoStatus,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaMetadata {
    pub creation_time: Option<DateTime<Utc>>,
    pub video: Option<VideoMetadata>,
}

/// Media item as returned by the Library API
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaItem {
    pub id: String,
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub media_metadata: MediaMetadata,
    #[serde(default)]
    pub filename: String,
}

impl From<MediaItem> for MediaRecord {
    fn from(item: MediaItem) -> Self {
        let video_status = item
            .media_metadata
            .video
            .map(|video| video.status)
            .unwrap_or_default();

        Self {
            id: item.id,
            base_url: item.base_url,
            mime_type: item.mime_type,
            creation_time: item.media_metadata.creation_time,
            video_status,
            filename: item.filename,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListMediaItemsResponse {
    #[serde(default)]
    pub media_items: Vec<MediaItem>,
    #[serde(default)]
    pub next_page_token: String,
}

impl From<ListMediaItemsResponse> for MediaPage {
    fn from(response: ListMediaItemsResponse) -> Self {
        let next_page_token = Some(response.next_page_token).filter(|token| !token.is_empty());
        Self {
            records: response.media_items.into_iter().map(Into::into).collect(),
            next_page_token,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Status {
    #[serde(default)]
    pub code: i32,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaItemResult {
    #[serde(default)]
    pub status: Status,
    pub media_item: Option<MediaItem>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchGetMediaItemsResponse {
    #[serde(default)]
    pub media_item_results: Vec<MediaItemResult>,
}
