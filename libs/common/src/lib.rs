//! Common library for the photo feeder
//!
//! This crate provides the pieces shared by the feeder services: the media
//! data model, the [`source::MediaSource`] contract, the Google Photos
//! Library client and its OAuth2 credentials.

pub mod auth;
pub mod error;
pub mod models;
pub mod photos;
pub mod source;

pub use error::{PhotosError, PhotosResult};
pub use models::{BatchItem, MediaPage, MediaRecord, VideoStatus};
pub use source::MediaSource;

/// Example usage of the Google Photos client
///
/// ```rust,no_run
/// use common::auth::Credentials;
/// use common::photos::{GooglePhotosClient, PhotosConfig};
/// use common::MediaSource;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let credentials = Credentials::from_access_token("ya29.token");
///     let client = GooglePhotosClient::new(PhotosConfig::default(), credentials)?;
///     let page = client.list_page(None).await?;
///     println!("First page holds {} items", page.records.len());
///     Ok(())
/// }
/// ```
pub fn example_usage() {}
