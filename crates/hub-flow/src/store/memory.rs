//! In-memory document store

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

use super::{DocumentStore, StoreResult};
use crate::error::StoreError;
use crate::flow::SourceSelector;
use crate::types::Document;

/// Documents held in a URI-ordered map
#[derive(Default)]
pub struct MemoryStore {
    documents: RwLock<BTreeMap<String, Document>>,
    writes: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store holding `docs`
    pub fn with_documents(docs: impl IntoIterator<Item = Document>) -> Self {
        let documents = docs.into_iter().map(|d| (d.uri.clone(), d)).collect();
        Self {
            documents: RwLock::new(documents),
            writes: AtomicU64::new(0),
        }
    }

    /// Add or replace a document without counting it as a write
    pub async fn insert(&self, doc: Document) {
        self.documents.write().await.insert(doc.uri.clone(), doc);
    }

    pub async fn get(&self, uri: &str) -> Option<Document> {
        self.documents.read().await.get(uri).cloned()
    }

    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }

    pub async fn uris(&self) -> Vec<String> {
        self.documents.read().await.keys().cloned().collect()
    }

    /// Copy of every stored document, by URI
    pub async fn snapshot(&self) -> BTreeMap<String, Document> {
        self.documents.read().await.clone()
    }

    /// Number of `write` calls that committed a document
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn read(&self, uri: &str) -> StoreResult<Document> {
        self.get(uri)
            .await
            .ok_or_else(|| StoreError::NotFound(uri.to_string()))
    }

    async fn write(&self, uri: &str, doc: &Document) -> StoreResult<()> {
        let mut stored = doc.clone();
        stored.uri = uri.to_string();
        self.documents.write().await.insert(stored.uri.clone(), stored);
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn list(&self, selector: &SourceSelector, offset: usize, limit: usize) -> StoreResult<Vec<String>> {
        let documents = self.documents.read().await;
        Ok(documents
            .values()
            .filter(|doc| selector.matches(&doc.uri, &doc.collections))
            .skip(offset)
            .take(limit)
            .map(|doc| doc.uri.clone())
            .collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use hub_common::types::DataFormat;

    #[tokio::test]
    async fn test_list_by_collection() {
        let store = MemoryStore::with_documents([
            Document::new("/a", "1", DataFormat::Text).with_collections(["customers"]),
            Document::new("/b", "2", DataFormat::Text).with_collections(["orders"]),
            Document::new("/c", "3", DataFormat::Text).with_collections(["customers"]),
        ]);

        let selector = SourceSelector::Collection("customers".into());
        assert_eq!(store.list(&selector, 0, 10).await.unwrap(), vec!["/a", "/c"]);
        assert_eq!(store.list(&selector, 1, 10).await.unwrap(), vec!["/c"]);
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let store = MemoryStore::new();
        let doc = Document::new("/src", "x", DataFormat::Text);
        store.write("/dst", &doc).await.unwrap();

        assert_eq!(store.read("/dst").await.unwrap().uri, "/dst");
        assert!(matches!(store.read("/src").await, Err(StoreError::NotFound(_))));
        assert_eq!(store.write_count(), 1);
    }
}
