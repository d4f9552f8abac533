//! Metadata cache
//!
//! Owns the set of known media records. A refresh task walks the remote
//! listing on a long interval and hands each page to a single ingestion task,
//! the only writer of the store. Finished refreshes are published by swapping
//! the whole store, so readers never observe a half-built listing.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use common::{MediaRecord, MediaSource};
use tokio::sync::{RwLock, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::RefreshMode;
use crate::error::{CacheError, RefreshError, SnapshotError};
use crate::snapshot;
use crate::store::{MediaStore, WorkingSet};

/// Pages buffered between the refresh and ingestion tasks
const INGEST_QUEUE_CAPACITY: usize = 16;

#[derive(Debug, Clone)]
pub struct MetadataSettings {
    pub refresh_interval: Duration,
    pub mode: RefreshMode,
    /// Where known ids are persisted between runs, if anywhere
    pub snapshot_path: Option<PathBuf>,
}

impl Default for MetadataSettings {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(12 * 60 * 60),
            mode: RefreshMode::Replace,
            snapshot_path: None,
        }
    }
}

/// Read handle on the metadata store
#[derive(Clone)]
pub struct MetadataCache {
    store: Arc<RwLock<Arc<MediaStore>>>,
}

impl MetadataCache {
    pub(crate) fn with_store(store: MediaStore) -> Self {
        Self {
            store: Arc::new(RwLock::new(Arc::new(store))),
        }
    }

    /// Up to `count` distinct records picked at random
    pub async fn sample(&self, count: usize) -> Result<Vec<MediaRecord>, CacheError> {
        let store = self.current().await;
        store.sample(count, &mut rand::thread_rng())
    }

    pub async fn len(&self) -> usize {
        self.current().await.len()
    }

    async fn current(&self) -> Arc<MediaStore> {
        self.store.read().await.clone()
    }
}

/// Running metadata cache together with its background tasks
pub struct MetadataService {
    cache: MetadataCache,
    refresh: JoinHandle<()>,
    ingest: JoinHandle<()>,
}

impl MetadataService {
    pub fn cache(&self) -> MetadataCache {
        self.cache.clone()
    }

    /// Wait for both background tasks to stop
    pub async fn join(self) {
        for (name, handle) in [("refresh", self.refresh), ("ingestion", self.ingest)] {
            if let Err(e) = handle.await {
                error!("Metadata {} task failed: {}", name, e);
            }
        }
    }
}

enum IngestCommand {
    Begin(RefreshMode),
    Page(Vec<MediaRecord>),
    Commit(oneshot::Sender<Arc<MediaStore>>),
    Abort,
}

/// Start the refresh and ingestion tasks.
///
/// Ids found in the snapshot seed the store before this returns; in that case
/// the first refresh waits a full interval, otherwise it starts right away.
pub async fn initialize<S: MediaSource>(
    source: Arc<S>,
    settings: MetadataSettings,
    cancel: &CancellationToken,
) -> Result<MetadataService, SnapshotError> {
    let seeded = match &settings.snapshot_path {
        Some(path) => {
            snapshot::validate_path(path).await?;
            match snapshot::load_ids(path).await {
                Ok(ids) => MediaStore::from_records(ids.into_iter().map(MediaRecord::from_id)),
                Err(e) => {
                    warn!("Failed to read metadata snapshot, starting empty: {}", e);
                    MediaStore::default()
                }
            }
        }
        None => MediaStore::default(),
    };

    let initial_delay = if seeded.is_empty() {
        Duration::ZERO
    } else {
        settings.refresh_interval
    };

    let cache = MetadataCache::with_store(seeded);
    let (commands, receiver) = mpsc::channel(INGEST_QUEUE_CAPACITY);

    let ingest = tokio::spawn(run_ingest(cache.clone(), receiver, cancel.clone()));
    let refresh = tokio::spawn(run_refresh(
        source,
        settings,
        commands,
        initial_delay,
        cancel.clone(),
    ));

    Ok(MetadataService {
        cache,
        refresh,
        ingest,
    })
}

async fn run_ingest(
    cache: MetadataCache,
    mut commands: mpsc::Receiver<IngestCommand>,
    cancel: CancellationToken,
) {
    let mut working: Option<WorkingSet> = None;

    loop {
        let command = tokio::select! {
            command = commands.recv() => command,
            _ = cancel.cancelled() => break,
        };
        let Some(command) = command else { break };

        match command {
            IngestCommand::Begin(mode) => {
                working = Some(match mode {
                    RefreshMode::Replace => WorkingSet::default(),
                    RefreshMode::Merge => WorkingSet::seeded(&*cache.current().await),
                });
            }
            IngestCommand::Page(records) => match working.as_mut() {
                Some(set) => {
                    let received = records.len();
                    let added = set.ingest(records);
                    debug!(
                        "Ingested {} new of {} listed records ({} total)",
                        added,
                        received,
                        set.len()
                    );
                }
                None => warn!("Dropping metadata page received outside a refresh"),
            },
            IngestCommand::Commit(reply) => match working.take() {
                Some(set) => {
                    let published = Arc::new(set.into_store());
                    *cache.store.write().await = published.clone();
                    let _ = reply.send(published);
                }
                None => warn!("Commit received outside a refresh"),
            },
            IngestCommand::Abort => {
                working = None;
            }
        }
    }

    debug!("Metadata ingestion stopped");
}

async fn run_refresh<S: MediaSource>(
    source: Arc<S>,
    settings: MetadataSettings,
    commands: mpsc::Sender<IngestCommand>,
    initial_delay: Duration,
    cancel: CancellationToken,
) {
    if !initial_delay.is_zero() {
        info!("First metadata refresh in {:?}", initial_delay);
        tokio::select! {
            _ = sleep(initial_delay) => {}
            _ = cancel.cancelled() => return,
        }
    }

    loop {
        info!("Attempting to fetch/refresh metadata");

        tokio::select! {
            result = refresh_once(source.as_ref(), settings.mode, &commands) => match result {
                Ok(store) => {
                    info!("Fetched all metadata pages; cache size: {}", store.len());
                    if let Some(path) = &settings.snapshot_path {
                        if let Err(e) = snapshot::write_ids(path, store.ids()).await {
                            warn!("Failed to write metadata snapshot: {}", e);
                        }
                    }
                }
                Err(e) => error!("Failed to fetch metadata: {}", e),
            },
            _ = cancel.cancelled() => break,
        }

        tokio::select! {
            _ = sleep(settings.refresh_interval) => {}
            _ = cancel.cancelled() => break,
        }
    }

    info!("Metadata refresh stopped");
}

async fn send(
    commands: &mpsc::Sender<IngestCommand>,
    command: IngestCommand,
) -> Result<(), RefreshError> {
    commands
        .send(command)
        .await
        .map_err(|_| RefreshError::IngestClosed)
}

/// Walk every listing page and publish the result
async fn refresh_once<S: MediaSource>(
    source: &S,
    mode: RefreshMode,
    commands: &mpsc::Sender<IngestCommand>,
) -> Result<Arc<MediaStore>, RefreshError> {
    send(commands, IngestCommand::Begin(mode)).await?;

    let mut page_token: Option<String> = None;
    let mut page_number = 1;

    loop {
        let page = match source.list_page(page_token.as_deref()).await {
            Ok(page) => page,
            Err(e) => {
                send(commands, IngestCommand::Abort).await?;
                return Err(RefreshError::Listing {
                    page: page_number,
                    source: e,
                });
            }
        };

        debug!(
            "Fetched metadata page #{} with {} items",
            page_number,
            page.records.len()
        );
        send(commands, IngestCommand::Page(page.records)).await?;

        match page.next_page_token {
            Some(token) => {
                page_token = Some(token);
                page_number += 1;
            }
            None => break,
        }
    }

    let (reply, published) = oneshot::channel();
    send(commands, IngestCommand::Commit(reply)).await?;
    published.await.map_err(|_| RefreshError::IngestClosed)
}
