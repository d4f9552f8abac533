//! Contract of the remote photo library as seen by the caches

use std::future::Future;

use bytes::Bytes;

use crate::error::PhotosResult;
use crate::models::{BatchItem, MediaPage};

/// Hard ceiling on ids per batch lookup imposed by the Library API
pub const MAX_BATCH_SIZE: usize = 50;

/// Remote source of media metadata and bytes
pub trait MediaSource: Send + Sync + 'static {
    /// Fetch one page of the library listing, starting after `page_token`
    fn list_page(
        &self,
        page_token: Option<&str>,
    ) -> impl Future<Output = PhotosResult<MediaPage>> + Send;

    /// Resolve fresh records for up to [`MAX_BATCH_SIZE`] ids.
    ///
    /// Results are returned in request order with a status per id.
    fn batch_get(&self, ids: &[String]) -> impl Future<Output = PhotosResult<Vec<BatchItem>>> + Send;

    /// Download raw bytes from a fetch URL
    fn fetch_bytes(&self, url: &str) -> impl Future<Output = PhotosResult<Bytes>> + Send;
}
