// src/feed/store.rs
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::fs;

/// Persistence failures. Non-fatal to the pipeline: a failed commit means the
/// next cycle may re-emit items, never that items are lost.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt seen-id file: {0}")]
    Corrupt(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Durable set of feed-item ids already delivered as events.
///
/// `commit` is a full replace; the caller computes the union beforehand.
/// Committing a superset that includes ids the caller never emitted for is
/// safe and expected.
#[async_trait]
pub trait SeenStore: Send + Sync {
    async fn load(&self) -> StoreResult<HashSet<String>>;
    async fn commit(&self, ids: &HashSet<String>) -> StoreResult<()>;
    async fn reset(&self) -> StoreResult<()>;
}

/// JSON-file backed store: one sorted array of ids per watcher instance.
/// Writes go through a temp file + rename so a crash mid-write never leaves
/// a truncated id list behind.
pub struct JsonSeenStore {
    path: PathBuf,
}

impl JsonSeenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn tmp_path(&self) -> PathBuf {
        let mut p = self.path.clone().into_os_string();
        p.push(".tmp");
        PathBuf::from(p)
    }

    async fn write_ids(&self, ids: &HashSet<String>) -> StoreResult<()> {
        if let Some(dir) = self.path.parent().filter(|d| *d != Path::new("")) {
            fs::create_dir_all(dir).await?;
        }
        // Sorted output keeps the file diffable and the tests deterministic.
        let mut sorted: Vec<&String> = ids.iter().collect();
        sorted.sort();
        let body = serde_json::to_vec_pretty(&sorted)?;
        let tmp = self.tmp_path();
        fs::write(&tmp, body).await?;
        fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl SeenStore for JsonSeenStore {
    async fn load(&self) -> StoreResult<HashSet<String>> {
        match fs::read_to_string(&self.path).await {
            Ok(s) => Ok(serde_json::from_str::<Vec<String>>(&s)?
                .into_iter()
                .collect()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashSet::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn commit(&self, ids: &HashSet<String>) -> StoreResult<()> {
        self.write_ids(ids).await
    }

    async fn reset(&self) -> StoreResult<()> {
        self.write_ids(&HashSet::new()).await
    }
}

/// In-memory store for tests; the next load or commit can be flipped to fail
/// to exercise the abort and at-least-once paths.
#[derive(Default)]
pub struct MemorySeenStore {
    ids: Mutex<HashSet<String>>,
    pub fail_next_load: Mutex<bool>,
    pub fail_next_commit: Mutex<bool>,
}

impl MemorySeenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ids<I: IntoIterator<Item = String>>(ids: I) -> Self {
        Self {
            ids: Mutex::new(ids.into_iter().collect()),
            ..Self::default()
        }
    }

    pub fn snapshot(&self) -> HashSet<String> {
        self.ids.lock().unwrap().clone()
    }
}

#[async_trait]
impl SeenStore for MemorySeenStore {
    async fn load(&self) -> StoreResult<HashSet<String>> {
        let mut fail = self.fail_next_load.lock().unwrap();
        if *fail {
            *fail = false;
            return Err(StoreError::Io(std::io::Error::other("scripted load failure")));
        }
        Ok(self.ids.lock().unwrap().clone())
    }

    async fn commit(&self, ids: &HashSet<String>) -> StoreResult<()> {
        let mut fail = self.fail_next_commit.lock().unwrap();
        if *fail {
            *fail = false;
            return Err(StoreError::Io(std::io::Error::other("scripted commit failure")));
        }
        *self.ids.lock().unwrap() = ids.clone();
        Ok(())
    }

    async fn reset(&self) -> StoreResult<()> {
        self.ids.lock().unwrap().clear();
        Ok(())
    }
}
