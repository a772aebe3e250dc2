//! Document stores and sources
//!
//! A [`DocumentStore`] holds documents by URI and is the destination a job
//! writes to. A [`DocumentSource`] is the paged view a job reads from;
//! [`SelectedSource`] turns any store plus a [`SourceSelector`] into one.

pub mod fs;
pub mod memory;

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::StoreError;
use crate::flow::SourceSelector;
use crate::types::Document;

pub use fs::FsStore;
pub use memory::MemoryStore;

/// Result type alias for store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Offset into a document source
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cursor {
    pub offset: usize,
}

impl Cursor {
    pub fn start() -> Self {
        Self::default()
    }
}

/// One page of document identifiers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub uris: Vec<String>,
    pub next_cursor: Cursor,
    pub has_more: bool,
}

impl Page {
    /// Build a page from the URIs returned for a request of `page_size`
    /// starting at `cursor`. A full page may have more behind it.
    pub fn from_request(cursor: Cursor, page_size: usize, uris: Vec<String>) -> Self {
        let has_more = uris.len() == page_size && page_size > 0;
        let next_cursor = Cursor {
            offset: cursor.offset + uris.len(),
        };
        Self {
            uris,
            next_cursor,
            has_more,
        }
    }
}

/// A store of documents addressed by URI. Methods take `&self`; implementations
/// must tolerate concurrent calls from job workers.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn read(&self, uri: &str) -> StoreResult<Document>;

    /// Commit one document. Each write is independent of any other.
    async fn write(&self, uri: &str, doc: &Document) -> StoreResult<()>;

    /// URIs of selected documents, in a stable order
    async fn list(&self, selector: &SourceSelector, offset: usize, limit: usize) -> StoreResult<Vec<String>>;
}

/// The paged input of a job
#[async_trait]
pub trait DocumentSource: Send + Sync {
    async fn next_page(&self, cursor: Cursor, page_size: usize) -> StoreResult<Page>;

    async fn fetch(&self, uri: &str) -> StoreResult<Document>;
}

/// A store filtered by a selector
pub struct SelectedSource {
    store: Arc<dyn DocumentStore>,
    selector: SourceSelector,
}

impl SelectedSource {
    pub fn new(store: Arc<dyn DocumentStore>, selector: SourceSelector) -> Self {
        Self { store, selector }
    }

    pub fn selector(&self) -> &SourceSelector {
        &self.selector
    }
}

#[async_trait]
impl DocumentSource for SelectedSource {
    async fn next_page(&self, cursor: Cursor, page_size: usize) -> StoreResult<Page> {
        let uris = match &self.selector {
            // Explicit lists are paged as given, including URIs the store lacks
            SourceSelector::Uris(uris) => uris
                .iter()
                .skip(cursor.offset)
                .take(page_size)
                .cloned()
                .collect(),
            selector => self.store.list(selector, cursor.offset, page_size).await?,
        };
        Ok(Page::from_request(cursor, page_size, uris))
    }

    async fn fetch(&self, uri: &str) -> StoreResult<Document> {
        self.store.read(uri).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use hub_common::types::DataFormat;

    async fn store_with(uris: &[&str]) -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        for uri in uris {
            store.insert(Document::new(*uri, "x", DataFormat::Text)).await;
        }
        store
    }

    #[tokio::test]
    async fn test_pages_until_exhausted() {
        let store = store_with(&["/a", "/b", "/c"]).await;
        let source = SelectedSource::new(store, SourceSelector::All);

        let first = source.next_page(Cursor::start(), 2).await.unwrap();
        assert_eq!(first.uris, vec!["/a", "/b"]);
        assert!(first.has_more);

        let second = source.next_page(first.next_cursor, 2).await.unwrap();
        assert_eq!(second.uris, vec!["/c"]);
        assert!(!second.has_more);
    }

    #[tokio::test]
    async fn test_explicit_uris_keep_order_and_missing_entries() {
        let store = store_with(&["/a", "/b"]).await;
        let selector = SourceSelector::Uris(vec!["/b".into(), "/missing".into(), "/a".into()]);
        let source = SelectedSource::new(store, selector);

        let page = source.next_page(Cursor::start(), 10).await.unwrap();
        assert_eq!(page.uris, vec!["/b", "/missing", "/a"]);
        assert!(!page.has_more);
        assert!(matches!(source.fetch("/missing").await, Err(StoreError::NotFound(_))));
    }
}
