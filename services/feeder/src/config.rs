//! Feeder configuration
//!
//! Every setting can be supplied through a `FEEDER_`-prefixed environment
//! variable (`FEEDER_SNAPSHOT_PATH`, `FEEDER_REFRESH_MODE=merge`, ...) and has
//! a default otherwise.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use common::photos::{DEFAULT_API_BASE_URL, PhotosConfig};
use common::source::MAX_BATCH_SIZE;
use config::{Config, ConfigBuilder, Environment, builder::DefaultState};
use serde::Deserialize;

use crate::download_cache::DownloadSettings;
use crate::metadata_cache::MetadataSettings;

/// How a metadata refresh treats records that are no longer listed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefreshMode {
    /// Rebuild the store from the listing alone
    #[default]
    Replace,
    /// Keep known records and refresh the ones listed again
    Merge,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeederConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
    #[serde(default)]
    pub refresh_mode: RefreshMode,
    #[serde(default)]
    pub snapshot_path: Option<PathBuf>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default = "default_not_ready_backoff_ms")]
    pub not_ready_backoff_ms: u64,
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    #[serde(default = "default_image_width")]
    pub image_width: u32,
    #[serde(default = "default_reload_secs")]
    pub reload_secs: u64,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Fixed bearer token, used instead of the refresh-token grant when set
    #[serde(default)]
    pub access_token: Option<String>,
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 9999))
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_page_size() -> u32 {
    100
}

fn default_refresh_interval_secs() -> u64 {
    12 * 60 * 60
}

fn default_batch_size() -> usize {
    MAX_BATCH_SIZE
}

fn default_queue_capacity() -> usize {
    MAX_BATCH_SIZE
}

fn default_not_ready_backoff_ms() -> u64 {
    2000
}

fn default_fetch_timeout_secs() -> u64 {
    30
}

fn default_image_width() -> u32 {
    4000
}

fn default_reload_secs() -> u64 {
    5
}

impl FeederConfig {
    /// Load configuration from `FEEDER_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_builder(Config::builder().add_source(Environment::with_prefix("FEEDER")))
    }

    /// Load configuration from an arbitrary set of sources
    pub fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self> {
        let config: FeederConfig = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    pub fn photos(&self) -> PhotosConfig {
        PhotosConfig {
            api_base_url: self.api_base_url.clone(),
            page_size: self.page_size,
            ..PhotosConfig::default()
        }
    }

    pub fn metadata(&self) -> MetadataSettings {
        MetadataSettings {
            refresh_interval: Duration::from_secs(self.refresh_interval_secs),
            mode: self.refresh_mode,
            snapshot_path: self.snapshot_path.clone(),
        }
    }

    pub fn download(&self) -> DownloadSettings {
        DownloadSettings {
            batch_size: self.batch_size.clamp(1, MAX_BATCH_SIZE),
            queue_capacity: self.queue_capacity.max(1),
            not_ready_backoff: Duration::from_millis(self.not_ready_backoff_ms),
            fetch_timeout: Duration::from_secs(self.fetch_timeout_secs),
            image_width: self.image_width,
        }
    }
}
