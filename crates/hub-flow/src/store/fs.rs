//! Directory-backed document store
//!
//! A URI maps to a path relative to the store root (`/customers/1.json` is
//! `<root>/customers/1.json`). The first path segment of a URI doubles as the
//! document's collection. Formats are inferred from file extensions.
//!
//! A missing or non-directory root, and I/O failures that affect every file
//! (permissions, a full or read-only filesystem) surface as
//! [`StoreError::Unavailable`]. Writes create a missing root on demand.

use async_trait::async_trait;
use hub_common::types::DataFormat;
use std::fmt::Display;
use std::io::{self, ErrorKind};
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;
use walkdir::WalkDir;

use super::{DocumentStore, StoreResult};
use crate::error::StoreError;
use crate::flow::SourceSelector;
use crate::types::Document;

pub struct FsStore {
    root: PathBuf,
    skipped: AtomicU64,
}

impl FsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            skipped: AtomicU64::new(0),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Writes skipped because the stored content was already identical
    pub fn skipped_writes(&self) -> u64 {
        self.skipped.load(Ordering::Relaxed)
    }

    /// Path of the file backing `uri`
    pub fn path_for(&self, uri: &str) -> StoreResult<PathBuf> {
        let relative = Path::new(uri.trim_start_matches('/'));
        let mut path = self.root.clone();
        let mut segments = 0;

        for component in relative.components() {
            match component {
                Component::Normal(segment) => {
                    path.push(segment);
                    segments += 1;
                }
                _ => return Err(StoreError::InvalidUri(uri.to_string())),
            }
        }

        if segments == 0 {
            return Err(StoreError::InvalidUri(uri.to_string()));
        }
        Ok(path)
    }

    fn unavailable(&self, reason: impl Display) -> StoreError {
        StoreError::Unavailable(format!("store root {}: {reason}", self.root.display()))
    }

    /// Fails unless the root is an existing directory
    async fn check_root(&self) -> StoreResult<()> {
        match tokio::fs::metadata(&self.root).await {
            Ok(meta) if meta.is_dir() => Ok(()),
            Ok(_) => Err(self.unavailable("not a directory")),
            Err(e) => Err(self.unavailable(e)),
        }
    }

    fn io_error(&self, e: io::Error) -> StoreError {
        if affects_whole_store(e.kind()) {
            self.unavailable(e)
        } else {
            e.into()
        }
    }

    async fn write_file(&self, path: &Path, staging: &Path, doc: &Document) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(staging, &doc.content).await?;
        if let Err(e) = tokio::fs::rename(staging, path).await {
            let _ = tokio::fs::remove_file(staging).await;
            return Err(e);
        }
        Ok(())
    }
}

fn affects_whole_store(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::PermissionDenied | ErrorKind::StorageFull | ErrorKind::ReadOnlyFilesystem
    )
}

/// Collection implied by a URI's first path segment
pub fn collection_of(uri: &str) -> Option<String> {
    let mut segments = uri.trim_start_matches('/').split('/');
    let first = segments.next()?;
    segments.next().map(|_| first.to_string())
}

fn format_of(path: &Path) -> DataFormat {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(DataFormat::from_extension)
        .unwrap_or(DataFormat::Binary)
}

fn is_hidden(entry: &walkdir::DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .map(|name| name.starts_with('.'))
            .unwrap_or(false)
}

fn list_uris(root: &Path, selector: &SourceSelector, offset: usize, limit: usize) -> io::Result<Vec<String>> {
    let mut uris = Vec::new();
    let mut matched = 0usize;

    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_hidden(e));

    for entry in walker {
        let entry = entry.map_err(io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }

        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };
        let Some(relative) = relative.to_str() else {
            continue;
        };
        let uri = format!("/{}", relative.replace(std::path::MAIN_SEPARATOR, "/"));
        let collections: Vec<String> = collection_of(&uri).into_iter().collect();

        if !selector.matches(&uri, &collections) {
            continue;
        }
        matched += 1;
        if matched <= offset {
            continue;
        }
        uris.push(uri);
        if uris.len() == limit {
            break;
        }
    }
    Ok(uris)
}

#[async_trait]
impl DocumentStore for FsStore {
    async fn read(&self, uri: &str) -> StoreResult<Document> {
        let path = self.path_for(uri)?;
        let content = match tokio::fs::read(&path).await {
            Ok(content) => content,
            Err(e) => {
                self.check_root().await?;
                return Err(match e.kind() {
                    ErrorKind::NotFound | ErrorKind::NotADirectory => StoreError::NotFound(uri.to_string()),
                    _ => self.io_error(e),
                });
            }
        };

        let mut doc = Document::new(uri, content, format_of(&path));
        doc.collections = collection_of(uri).into_iter().collect();
        Ok(doc)
    }

    async fn write(&self, uri: &str, doc: &Document) -> StoreResult<()> {
        let path = self.path_for(uri)?;

        if let Ok(existing) = tokio::fs::read(&path).await {
            let existing = Document::new(uri, existing, doc.format);
            if existing.checksum() == doc.checksum() {
                debug!(uri = %uri, "Content unchanged, skipping write");
                self.skipped.fetch_add(1, Ordering::Relaxed);
                return Ok(());
            }
        }

        // Stage next to the target so the rename stays on one filesystem
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| StoreError::InvalidUri(uri.to_string()))?;
        let staging = path.with_file_name(format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4()));

        if let Err(e) = self.write_file(&path, &staging, doc).await {
            self.check_root().await?;
            return Err(self.io_error(e));
        }
        Ok(())
    }

    async fn list(&self, selector: &SourceSelector, offset: usize, limit: usize) -> StoreResult<Vec<String>> {
        self.check_root().await?;

        let root = self.root.clone();
        let selector = selector.clone();
        tokio::task::spawn_blocking(move || list_uris(&root, &selector, offset, limit))
            .await
            .map_err(|e| StoreError::Unavailable(format!("listing task failed: {e}")))?
            .map_err(|e| self.io_error(e))
    }
}
