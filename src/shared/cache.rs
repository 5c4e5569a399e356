use std::{collections::HashMap, sync::Arc};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::{sync::RwLock, task::JoinHandle};

use crate::error::{CopilotError, Error, Result};

/// Cache entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub value: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub ttl: Option<i64>, // seconds
}

impl CacheEntry {
    pub fn new(key: impl Into<String>, value: serde_json::Value) -> Self {
        let now = Utc::now();
        Self {
            key: key.into(),
            value,
            created_at: now,
            updated_at: now,
            ttl: None,
        }
    }

    pub fn with_ttl(mut self, ttl_secs: i64) -> Self {
        self.ttl = Some(ttl_secs);
        self
    }

    pub fn is_expired(&self) -> bool {
        match self.ttl {
            Some(ttl) => (Utc::now() - self.updated_at).num_seconds() >= ttl,
            None => false,
        }
    }
}

/// Cache interface handed to components that memoise collaborator reads.
#[async_trait::async_trait]
pub trait SharedCache: Send + Sync {
    async fn get(&self, key: &str) -> Option<CacheEntry>;

    async fn set(&self, entry: CacheEntry) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<()>;

    async fn list_keys(&self) -> Vec<String>;

    async fn cleanup_expired(&self) -> usize;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub max_entries: usize,
    pub cleanup_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 1000,
            cleanup_interval_secs: 60,
        }
    }
}

/// In-process TTL cache. The periodic sweep is started by `start` and stopped
/// by `stop`, both driven by the owning context's lifecycle.
pub struct CacheService {
    entries: Arc<RwLock<HashMap<String, CacheEntry>>>,
    config: CacheConfig,
    sweeper: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl CacheService {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            config,
            sweeper: std::sync::Mutex::new(None),
        }
    }

    pub fn start(&self) {
        let mut sweeper = self.sweeper.lock().unwrap_or_else(|e| e.into_inner());
        if sweeper.is_some() {
            return;
        }

        let entries = self.entries.clone();
        let period = std::time::Duration::from_secs(self.config.cleanup_interval_secs.max(1));
        *sweeper = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                let cleaned = sweep(&entries).await;
                if cleaned > 0 {
                    tracing::debug!("Cleaned up {} expired cache entries", cleaned);
                }
            }
        }));
    }

    pub async fn stop(&self) {
        let handle = self
            .sweeper
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(handle) = handle {
            handle.abort();
        }
        self.entries.write().await.clear();
    }

    pub fn is_running(&self) -> bool {
        self.sweeper
            .lock()
            .map(|guard| guard.is_some())
            .unwrap_or(false)
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

impl Default for CacheService {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

async fn sweep(entries: &RwLock<HashMap<String, CacheEntry>>) -> usize {
    let mut entries = entries.write().await;
    let before = entries.len();
    entries.retain(|_, entry| !entry.is_expired());
    before - entries.len()
}

#[async_trait::async_trait]
impl SharedCache for CacheService {
    async fn get(&self, key: &str) -> Option<CacheEntry> {
        self.entries
            .read()
            .await
            .get(key)
            .cloned()
            .filter(|entry| !entry.is_expired())
    }

    async fn set(&self, entry: CacheEntry) -> Result<()> {
        let mut entries = self.entries.write().await;
        if entries.len() >= self.config.max_entries && !entries.contains_key(&entry.key) {
            return Err(Error::Copilot(CopilotError::InternalError(
                "cache is full".into(),
            )));
        }
        entries.insert(entry.key.clone(), entry);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn list_keys(&self) -> Vec<String> {
        self.entries.read().await.keys().cloned().collect()
    }

    async fn cleanup_expired(&self) -> usize {
        sweep(&self.entries).await
    }
}
