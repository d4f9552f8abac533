//! Application state shared across handlers

use tokio_util::sync::CancellationToken;

use crate::{download_cache::DownloadQueue, metadata_cache::MetadataCache};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub metadata: MetadataCache,
    pub downloads: DownloadQueue,
    pub cancel: CancellationToken,
    /// Seconds before the slideshow page asks for the next item
    pub reload_secs: u64,
}
