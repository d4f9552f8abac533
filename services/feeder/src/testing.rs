//! Scripted in-memory media source for cache tests

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use bytes::Bytes;
use common::{BatchItem, MediaPage, MediaRecord, MediaSource, PhotosError, PhotosResult};

/// Base URL handed out for every resolved id
pub fn base_url(id: &str) -> String {
    format!("https://media.test/{}", id)
}

enum Step {
    Page(MediaPage),
    Fail,
    Hang,
}

#[derive(Default)]
pub struct FakeSource {
    /// Responses per page token; the last response for a token repeats
    pages: Mutex<HashMap<Option<String>, VecDeque<Step>>>,
    rejected: Mutex<HashMap<String, i32>>,
    failing_batches: AtomicUsize,
    failing_fetches: Mutex<HashSet<String>>,
    hanging_fetches: Mutex<HashSet<String>>,
    pub list_calls: AtomicUsize,
    pub batch_calls: AtomicUsize,
    pub batch_requests: Mutex<Vec<Vec<String>>>,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(self, token: Option<&str>, step: Step) -> Self {
        self.pages
            .lock()
            .expect("fake lock")
            .entry(token.map(str::to_string))
            .or_default()
            .push_back(step);
        self
    }

    pub fn with_page(self, token: Option<&str>, ids: &[&str], next: Option<&str>) -> Self {
        let page = MediaPage {
            records: ids
                .iter()
                .map(|id| MediaRecord {
                    base_url: base_url(id),
                    mime_type: "image/jpeg".to_string(),
                    ..MediaRecord::from_id(*id)
                })
                .collect(),
            next_page_token: next.map(str::to_string),
        };
        self.push(token, Step::Page(page))
    }

    pub fn with_failing_page(self, token: Option<&str>) -> Self {
        self.push(token, Step::Fail)
    }

    pub fn with_hanging_page(self, token: Option<&str>) -> Self {
        self.push(token, Step::Hang)
    }

    pub fn rejecting(self, id: &str, code: i32) -> Self {
        self.rejected
            .lock()
            .expect("fake lock")
            .insert(id.to_string(), code);
        self
    }

    pub fn with_failing_batches(self, count: usize) -> Self {
        self.failing_batches.store(count, Ordering::SeqCst);
        self
    }

    pub fn failing_fetch(self, id: &str) -> Self {
        self.failing_fetches
            .lock()
            .expect("fake lock")
            .insert(base_url(id));
        self
    }

    pub fn hanging_fetch(self, id: &str) -> Self {
        self.hanging_fetches
            .lock()
            .expect("fake lock")
            .insert(base_url(id));
        self
    }

    fn next_step(&self, token: Option<&str>) -> Option<Step> {
        let mut pages = self.pages.lock().expect("fake lock");
        let steps = pages.get_mut(&token.map(str::to_string))?;
        if steps.len() > 1 {
            return steps.pop_front();
        }
        steps.front().map(|step| match step {
            Step::Page(page) => Step::Page(page.clone()),
            Step::Fail => Step::Fail,
            Step::Hang => Step::Hang,
        })
    }

    fn failure(status: u16) -> PhotosError {
        PhotosError::Status {
            endpoint: "fake",
            status,
        }
    }
}

impl MediaSource for FakeSource {
    async fn list_page(&self, page_token: Option<&str>) -> PhotosResult<MediaPage> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);

        match self.next_step(page_token) {
            Some(Step::Page(page)) => Ok(page),
            Some(Step::Hang) => std::future::pending().await,
            Some(Step::Fail) | None => Err(Self::failure(500)),
        }
    }

    async fn batch_get(&self, ids: &[String]) -> PhotosResult<Vec<BatchItem>> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        self.batch_requests
            .lock()
            .expect("fake lock")
            .push(ids.to_vec());

        let should_fail = self
            .failing_batches
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(Self::failure(503));
        }

        let rejected = self.rejected.lock().expect("fake lock");
        let items = ids
            .iter()
            .map(|id| match rejected.get(id) {
                Some(&code) => BatchItem {
                    requested_id: id.clone(),
                    code,
                    message: "rejected".to_string(),
                    record: None,
                },
                None => BatchItem {
                    requested_id: id.clone(),
                    code: 0,
                    message: String::new(),
                    record: Some(MediaRecord {
                        base_url: base_url(id),
                        mime_type: "image/jpeg".to_string(),
                        ..MediaRecord::from_id(id.clone())
                    }),
                },
            })
            .collect();

        Ok(items)
    }

    async fn fetch_bytes(&self, url: &str) -> PhotosResult<Bytes> {
        let base = url.split('=').next().unwrap_or(url);

        let hangs = self
            .hanging_fetches
            .lock()
            .expect("fake lock")
            .contains(base);
        if hangs {
            return std::future::pending().await;
        }

        let fails = self
            .failing_fetches
            .lock()
            .expect("fake lock")
            .contains(base);
        if fails {
            return Err(Self::failure(404));
        }

        Ok(Bytes::from(url.to_string()))
    }
}
