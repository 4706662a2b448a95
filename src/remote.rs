// File: ./src/remote.rs
//! Remote key-value store holding one task table per user.
//!
//! The store is opaque: `fetch` returns whatever was last pushed for a user,
//! `push` replaces it. Failures are reported, never retried here.
use crate::storage::LocalStorage;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::future::Future;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteRecord {
    pub content: String,
    pub updated_at: DateTime<Utc>,
}

pub trait RemoteStore: Send + Sync {
    fn fetch(&self, user_id: &str) -> impl Future<Output = Result<Option<RemoteRecord>>> + Send;

    /// Stores `content` for `user_id` and returns the stored timestamp.
    fn push(&self, user_id: &str, content: &str)
    -> impl Future<Output = Result<DateTime<Utc>>> + Send;
}

/// One JSON record per user inside a directory (a shared folder, a mounted
/// drive, or a plain local directory).
#[derive(Debug, Clone)]
pub struct FileRemote {
    dir: PathBuf,
}

impl FileRemote {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create remote directory: {:?}", dir))?;
        Ok(Self { dir })
    }

    fn record_path(&self, user_id: &str) -> PathBuf {
        let safe: String = user_id
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("tasks_{}.json", safe))
    }
}

impl RemoteStore for FileRemote {
    async fn fetch(&self, user_id: &str) -> Result<Option<RemoteRecord>> {
        let path = self.record_path(user_id);
        LocalStorage::with_lock(&path, || match fs::read_to_string(&path) {
            Ok(json) => {
                let record: RemoteRecord = serde_json::from_str(&json)
                    .with_context(|| format!("Corrupt remote record {:?}", path))?;
                Ok(Some(record))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        })
    }

    async fn push(&self, user_id: &str, content: &str) -> Result<DateTime<Utc>> {
        let path = self.record_path(user_id);
        let record = RemoteRecord {
            content: content.to_string(),
            updated_at: Utc::now(),
        };
        LocalStorage::with_lock(&path, || {
            let json = serde_json::to_string_pretty(&record)?;
            LocalStorage::atomic_write(&path, json)?;
            Ok(())
        })?;
        log::debug!("Pushed {} bytes for {}", content.len(), user_id);
        Ok(record.updated_at)
    }
}

/// In-process store. Can be switched offline to exercise failure paths.
#[derive(Debug, Default)]
pub struct MemoryRemote {
    records: Mutex<HashMap<String, RemoteRecord>>,
    offline: AtomicBool,
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check_online(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(anyhow::anyhow!("Remote store unreachable"));
        }
        Ok(())
    }
}

impl RemoteStore for MemoryRemote {
    async fn fetch(&self, user_id: &str) -> Result<Option<RemoteRecord>> {
        self.check_online()?;
        Ok(self.records.lock().await.get(user_id).cloned())
    }

    async fn push(&self, user_id: &str, content: &str) -> Result<DateTime<Utc>> {
        self.check_online()?;
        let now = Utc::now();
        self.records.lock().await.insert(
            user_id.to_string(),
            RemoteRecord {
                content: content.to_string(),
                updated_at: now,
            },
        );
        Ok(now)
    }
}
