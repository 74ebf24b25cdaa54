//! Local filesystem page cache.
//!
//! Content files are written atomically (temp file, then rename) so readers
//! never observe a partial page. Index appends are serialized behind a single
//! lock, which is also where new ids are handed out.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::{AppError, Result};
use crate::storage::{CacheKey, PageStore};

/// Name of the index file inside the cache directory.
pub const INDEX_FILE: &str = "index";

/// Separates key and id on an index line.
pub const INDEX_SEPARATOR: &str = "::";

/// In-memory mirror of the index file.
#[derive(Debug, Default)]
struct CacheIndex {
    entries: HashMap<String, u64>,
    next_id: u64,
}

impl CacheIndex {
    fn parse(text: &str) -> Self {
        let mut index = Self {
            entries: HashMap::new(),
            next_id: 1,
        };

        for line in text.lines() {
            let Some((key, id)) = line.split_once(INDEX_SEPARATOR) else {
                log::warn!("Skipping malformed cache index line: {line:?}");
                continue;
            };
            let Ok(id) = id.trim().parse::<u64>() else {
                log::warn!("Skipping cache index line with bad id: {line:?}");
                continue;
            };

            // The first line for a key is authoritative.
            index.entries.entry(key.to_string()).or_insert(id);
            index.next_id = index.next_id.max(id + 1);
        }

        index
    }
}

/// Local filesystem cache backend.
pub struct LocalCache {
    root_dir: PathBuf,
    max_age: Duration,
    index: Mutex<CacheIndex>,
    tmp_seq: AtomicU64,
}

impl LocalCache {
    /// Open (or create) a cache rooted at the given directory.
    pub async fn open(root_dir: impl Into<PathBuf>, max_age: Duration) -> Result<Self> {
        let root_dir = root_dir.into();
        tokio::fs::create_dir_all(&root_dir).await?;

        let index = match tokio::fs::read_to_string(root_dir.join(INDEX_FILE)).await {
            Ok(text) => CacheIndex::parse(&text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => CacheIndex::parse(""),
            Err(e) => return Err(AppError::Io(e)),
        };

        log::debug!(
            "Opened cache at {} with {} entries",
            root_dir.display(),
            index.entries.len()
        );

        Ok(Self {
            root_dir,
            max_age,
            index: Mutex::new(index),
            tmp_seq: AtomicU64::new(0),
        })
    }

    /// Number of indexed keys.
    pub async fn len(&self) -> usize {
        self.index.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Content path for an indexed key.
    async fn entry_path(&self, key: &CacheKey) -> Option<PathBuf> {
        let index = self.index.lock().await;
        index
            .entries
            .get(key.as_str())
            .map(|id| self.root_dir.join(id.to_string()))
    }

    /// Id for a key, appending a new index line if the key is unknown.
    async fn ensure_entry(&self, key: &CacheKey) -> Result<u64> {
        let mut index = self.index.lock().await;
        if let Some(id) = index.entries.get(key.as_str()) {
            return Ok(*id);
        }

        let id = index.next_id;
        let line = format!("{}{}{}\n", key.as_str(), INDEX_SEPARATOR, id);

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.root_dir.join(INDEX_FILE))
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        index.entries.insert(key.as_str().to_string(), id);
        index.next_id = id + 1;
        Ok(id)
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        let seq = self.tmp_seq.fetch_add(1, Ordering::Relaxed);
        let tmp = path.with_extension(format!("{seq}.tmp"));

        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }
}

#[async_trait]
impl PageStore for LocalCache {
    async fn is_fresh(&self, key: &CacheKey) -> bool {
        let Some(path) = self.entry_path(key).await else {
            return false;
        };
        let Ok(meta) = tokio::fs::metadata(&path).await else {
            return false;
        };
        let Ok(modified) = meta.modified() else {
            return false;
        };

        let age = SystemTime::now()
            .duration_since(modified)
            .unwrap_or(Duration::ZERO);
        age < self.max_age
    }

    async fn lookup(&self, key: &CacheKey) -> Option<Vec<u8>> {
        if !self.is_fresh(key).await {
            return None;
        }
        let path = self.entry_path(key).await?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                log::debug!("Cache read failed for {}: {}", path.display(), e);
                None
            }
        }
    }

    async fn store(&self, key: &CacheKey, content: &[u8]) -> Result<()> {
        let id = self.ensure_entry(key).await?;
        self.write_bytes(&self.root_dir.join(id.to_string()), content)
            .await
    }
}
