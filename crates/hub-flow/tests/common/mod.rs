//! Shared fixtures for hub-flow integration tests
#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use async_trait::async_trait;
use hub_flow::flow::SourceSelector;
use hub_flow::plugin::{Stage, StageContext};
use hub_flow::store::{Cursor, DocumentSource, DocumentStore, MemoryStore, Page, StoreResult};
use hub_flow::{DataFormat, Document, JobListener, JobStatus, ListenerError, StageError, StoreError};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Initialize tracing once per test binary
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("hub_flow=debug")),
        )
        .with_test_writer()
        .try_init();
}

/// URI of the i-th generated document
pub fn doc_uri(i: usize) -> String {
    format!("/doc-{i:03}.txt")
}

/// Store holding `n` text documents `/doc-000.txt`, `/doc-001.txt`, ...
pub fn text_store(n: usize) -> Arc<MemoryStore> {
    Arc::new(MemoryStore::with_documents(
        (0..n).map(|i| Document::new(doc_uri(i), format!("body {i}"), DataFormat::Text)),
    ))
}

/// Records every notification and checks callback ordering
#[derive(Default)]
pub struct RecordingListener {
    updates: Mutex<Vec<JobStatus>>,
    finished: Mutex<Vec<JobStatus>>,
    updates_after_finish: AtomicUsize,
}

impl RecordingListener {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn updates(&self) -> Vec<JobStatus> {
        self.updates.lock().unwrap().clone()
    }

    pub fn finished_calls(&self) -> usize {
        self.finished.lock().unwrap().len()
    }

    pub fn updates_after_finish(&self) -> usize {
        self.updates_after_finish.load(Ordering::SeqCst)
    }
}

impl JobListener for RecordingListener {
    fn on_status_changed(&self, status: &JobStatus) -> Result<(), ListenerError> {
        if !self.finished.lock().unwrap().is_empty() {
            self.updates_after_finish.fetch_add(1, Ordering::SeqCst);
        }
        self.updates.lock().unwrap().push(status.clone());
        Ok(())
    }

    fn on_finished(&self, status: &JobStatus) -> Result<(), ListenerError> {
        self.finished.lock().unwrap().push(status.clone());
        Ok(())
    }
}

/// Listener whose every callback panics
pub struct PanickingListener;

impl JobListener for PanickingListener {
    fn on_status_changed(&self, _status: &JobStatus) -> Result<(), ListenerError> {
        panic!("status listener exploded")
    }

    fn on_finished(&self, _status: &JobStatus) -> Result<(), ListenerError> {
        panic!("finish listener exploded")
    }
}

/// Stage that sleeps before passing the document on
pub struct SlowStage(pub Duration);

#[async_trait]
impl Stage for SlowStage {
    async fn run(&self, doc: Document, _ctx: &StageContext) -> Result<Document, StageError> {
        tokio::time::sleep(self.0).await;
        Ok(doc)
    }
}

/// Stage that records the most documents ever inside it at once
pub struct GaugeStage {
    current: AtomicUsize,
    max: AtomicUsize,
    pause: Duration,
}

impl GaugeStage {
    pub fn new(pause: Duration) -> Arc<Self> {
        Arc::new(Self {
            current: AtomicUsize::new(0),
            max: AtomicUsize::new(0),
            pause,
        })
    }

    pub fn max_in_flight(&self) -> usize {
        self.max.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Stage for GaugeStage {
    async fn run(&self, doc: Document, _ctx: &StageContext) -> Result<Document, StageError> {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.max.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.pause).await;
        self.current.fetch_sub(1, Ordering::SeqCst);
        Ok(doc)
    }
}

/// Source whose paging fails after `good_pages` pages
pub struct FailingSource {
    pub inner: Arc<MemoryStore>,
    pub good_pages: usize,
    pages: AtomicUsize,
}

impl FailingSource {
    pub fn new(inner: Arc<MemoryStore>, good_pages: usize) -> Self {
        Self {
            inner,
            good_pages,
            pages: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl DocumentSource for FailingSource {
    async fn next_page(&self, cursor: Cursor, page_size: usize) -> StoreResult<Page> {
        if self.pages.fetch_add(1, Ordering::SeqCst) >= self.good_pages {
            return Err(StoreError::Unavailable("connection reset".to_string()));
        }
        let uris = self.inner.list(&SourceSelector::All, cursor.offset, page_size).await?;
        Ok(Page::from_request(cursor, page_size, uris))
    }

    async fn fetch(&self, uri: &str) -> StoreResult<Document> {
        self.inner.read(uri).await
    }
}

/// Destination whose writes are all rejected as unavailable
#[derive(Default)]
pub struct UnavailableStore {
    pub attempts: AtomicUsize,
}

#[async_trait]
impl DocumentStore for UnavailableStore {
    async fn read(&self, uri: &str) -> StoreResult<Document> {
        Err(StoreError::NotFound(uri.to_string()))
    }

    async fn write(&self, _uri: &str, _doc: &Document) -> StoreResult<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(StoreError::Unavailable("destination offline".to_string()))
    }

    async fn list(&self, _selector: &SourceSelector, _offset: usize, _limit: usize) -> StoreResult<Vec<String>> {
        Ok(Vec::new())
    }
}

/// Destination whose `write` panics while building its future, before any
/// await point
pub struct EagerPanicStore;

#[async_trait]
impl DocumentStore for EagerPanicStore {
    async fn read(&self, uri: &str) -> StoreResult<Document> {
        Err(StoreError::NotFound(uri.to_string()))
    }

    fn write<'life0, 'life1, 'life2, 'async_trait>(
        &'life0 self,
        uri: &'life1 str,
        _doc: &'life2 Document,
    ) -> Pin<Box<dyn Future<Output = StoreResult<()>> + Send + 'async_trait>>
    where
        'life0: 'async_trait,
        'life1: 'async_trait,
        'life2: 'async_trait,
        Self: 'async_trait,
    {
        panic!("driver rejected {uri}")
    }

    async fn list(&self, _selector: &SourceSelector, _offset: usize, _limit: usize) -> StoreResult<Vec<String>> {
        Ok(Vec::new())
    }
}

/// Write a file below `root`, creating parent directories
pub fn write_file(root: &std::path::Path, relative: &str, contents: &str) {
    let path = root.join(relative);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, contents).unwrap();
}
