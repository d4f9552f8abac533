//! Download cache
//!
//! Keeps a bounded queue of fully downloaded media so the serving layer can
//! hand one out without waiting on the network. Each cycle samples a batch of
//! records, re-resolves their fetch URLs (they expire after about an hour),
//! downloads every accepted item concurrently and forwards payloads in
//! completion order.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use common::source::MAX_BATCH_SIZE;
use common::{MediaRecord, MediaSource, PhotosResult};
use tokio::sync::{Mutex, mpsc};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{CacheError, FetchError};
use crate::metadata_cache::MetadataCache;

#[derive(Debug, Clone)]
pub struct DownloadSettings {
    /// Records sampled and resolved per cycle, at most [`MAX_BATCH_SIZE`]
    pub batch_size: usize,
    pub queue_capacity: usize,
    /// Wait before retrying when no metadata is available yet
    pub not_ready_backoff: Duration,
    /// Budget for a single download
    pub fetch_timeout: Duration,
    /// Width requested for still images
    pub image_width: u32,
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            batch_size: MAX_BATCH_SIZE,
            queue_capacity: MAX_BATCH_SIZE,
            not_ready_backoff: Duration::from_secs(2),
            fetch_timeout: Duration::from_secs(30),
            image_width: 4000,
        }
    }
}

/// A downloaded media item, ready to be served once
#[derive(Debug, Clone)]
pub struct CachedPayload {
    /// Record as resolved when the download started
    pub record: MediaRecord,
    pub bytes: Bytes,
}

/// Consumer side of the download queue
#[derive(Clone)]
pub struct DownloadQueue {
    receiver: Arc<Mutex<mpsc::Receiver<CachedPayload>>>,
}

impl DownloadQueue {
    /// Bounded queue and the sender feeding it
    pub(crate) fn bounded(capacity: usize) -> (mpsc::Sender<CachedPayload>, Self) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let queue = Self {
            receiver: Arc::new(Mutex::new(receiver)),
        };
        (sender, queue)
    }

    /// Wait for the next payload.
    ///
    /// Returns `None` once cancelled or when the producer has stopped.
    pub async fn next(&self, cancel: &CancellationToken) -> Option<CachedPayload> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            payload = async { self.receiver.lock().await.recv().await } => payload,
        }
    }
}

/// Running download cache together with its producer task
pub struct DownloadService {
    queue: DownloadQueue,
    producer: JoinHandle<()>,
}

impl DownloadService {
    pub fn queue(&self) -> DownloadQueue {
        self.queue.clone()
    }

    /// Wait for the producer task to stop
    pub async fn join(self) {
        if let Err(e) = self.producer.await {
            error!("Download producer task failed: {}", e);
        }
    }
}

/// How a batch ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardOutcome {
    /// Every task finished; this many payloads were queued
    Delivered(usize),
    Cancelled,
    /// Nobody is reading the queue any more
    Closed,
}

/// Start producing payloads from `metadata` into a queue of
/// `settings.queue_capacity` items.
pub fn initialize<S: MediaSource>(
    source: Arc<S>,
    metadata: MetadataCache,
    settings: DownloadSettings,
    cancel: &CancellationToken,
) -> DownloadService {
    let settings = DownloadSettings {
        batch_size: settings.batch_size.clamp(1, MAX_BATCH_SIZE),
        ..settings
    };
    let (sender, queue) = DownloadQueue::bounded(settings.queue_capacity);

    let producer = Producer {
        source,
        metadata,
        settings,
        sender,
        cancel: cancel.clone(),
    };

    DownloadService {
        queue,
        producer: tokio::spawn(producer.run()),
    }
}

struct Producer<S> {
    source: Arc<S>,
    metadata: MetadataCache,
    settings: DownloadSettings,
    sender: mpsc::Sender<CachedPayload>,
    cancel: CancellationToken,
}

impl<S: MediaSource> Producer<S> {
    async fn run(self) {
        info!(
            "Download producer started (batch size {}, queue capacity {})",
            self.settings.batch_size, self.settings.queue_capacity
        );

        while !self.cancel.is_cancelled() {
            let records = match self.metadata.sample(self.settings.batch_size).await {
                Ok(records) => records,
                Err(CacheError::NotReady) => {
                    info!("Image metadata hasn't loaded yet, going to wait...");
                    if !self.backoff().await {
                        break;
                    }
                    continue;
                }
            };

            let resolved = tokio::select! {
                resolved = resolve_batch(self.source.as_ref(), &records) => resolved,
                _ = self.cancel.cancelled() => break,
            };

            let accepted = match resolved {
                Ok(accepted) if accepted.is_empty() => {
                    warn!("No sampled item could be resolved; continuing");
                    if !self.backoff().await {
                        break;
                    }
                    continue;
                }
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!("Failed to get base URLs; continuing: {}", e);
                    if !self.backoff().await {
                        break;
                    }
                    continue;
                }
            };

            match fetch_and_forward(
                self.source.clone(),
                accepted,
                &self.settings,
                &self.sender,
                &self.cancel,
            )
            .await
            {
                ForwardOutcome::Delivered(0) => {
                    warn!("Every download in the batch failed; continuing");
                    if !self.backoff().await {
                        break;
                    }
                }
                ForwardOutcome::Delivered(count) => {
                    debug!("Queued {} of {} sampled items", count, records.len());
                }
                ForwardOutcome::Cancelled => break,
                ForwardOutcome::Closed => {
                    warn!("Download queue closed");
                    break;
                }
            }
        }

        info!("Download producer stopped");
    }

    /// Sleep for the backoff delay; `false` when cancelled meanwhile
    async fn backoff(&self) -> bool {
        tokio::select! {
            _ = sleep(self.settings.not_ready_backoff) => true,
            _ = self.cancel.cancelled() => false,
        }
    }
}

/// Refresh the fetch URLs of `records` in one batch lookup.
///
/// Items the lookup reports as failed are dropped; a failure of the lookup
/// itself fails the whole batch.
pub async fn resolve_batch<S: MediaSource>(
    source: &S,
    records: &[MediaRecord],
) -> PhotosResult<Vec<MediaRecord>> {
    let ids: Vec<String> = records.iter().map(|record| record.id.clone()).collect();
    let items = source.batch_get(&ids).await?;

    let mut accepted = Vec::with_capacity(items.len());
    for item in items {
        if !item.is_ok() {
            warn!(
                "BatchGet failed on id {} with error code {}: {}",
                item.requested_id, item.code, item.message
            );
            continue;
        }
        accepted.extend(item.record);
    }

    Ok(accepted)
}

/// Download `records` concurrently and queue each payload as it completes
pub async fn fetch_and_forward<S: MediaSource>(
    source: Arc<S>,
    records: Vec<MediaRecord>,
    settings: &DownloadSettings,
    sender: &mpsc::Sender<CachedPayload>,
    cancel: &CancellationToken,
) -> ForwardOutcome {
    let mut tasks = JoinSet::new();

    for record in records {
        let source = source.clone();
        let url = record.fetch_url(settings.image_width);
        let fetch_timeout = settings.fetch_timeout;

        tasks.spawn(async move {
            let result = match timeout(fetch_timeout, source.fetch_bytes(&url)).await {
                Ok(Ok(bytes)) => Ok(bytes),
                Ok(Err(e)) => Err(FetchError::Source(e)),
                Err(_) => Err(FetchError::Timeout),
            };
            (record, result)
        });
    }

    let mut delivered = 0;

    // Returning early drops `tasks`, which aborts downloads still in flight.
    loop {
        let joined = tokio::select! {
            joined = tasks.join_next() => joined,
            _ = cancel.cancelled() => return ForwardOutcome::Cancelled,
        };
        let Some(joined) = joined else { break };

        let (record, result) = match joined {
            Ok(finished) => finished,
            Err(e) => {
                error!("Download task failed: {}", e);
                continue;
            }
        };

        let bytes = match result {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Failed to download {}; continuing: {}", record.id, e);
                continue;
            }
        };

        tokio::select! {
            sent = sender.send(CachedPayload { record, bytes }) => {
                if sent.is_err() {
                    return ForwardOutcome::Closed;
                }
            }
            _ = cancel.cancelled() => return ForwardOutcome::Cancelled,
        }
        delivered += 1;
    }

    ForwardOutcome::Delivered(delivered)
}
