use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::{
    context::model::BusinessContext,
    error::Result,
    shared::cache::{CacheEntry, SharedCache},
};

const CONTEXT_CACHE_KEY: &str = "business_context";

/// Never-failing snapshot loader consumed by every component.
#[async_trait]
pub trait ContextProvider: Send + Sync {
    async fn load(&self) -> Arc<BusinessContext>;

    /// Drops any memoised snapshot. No-op for providers without a cache.
    async fn invalidate(&self) {}
}

/// Fallible backing source for snapshots (database, remote service).
#[async_trait]
pub trait ContextSource: Send + Sync {
    async fn fetch(&self) -> Result<BusinessContext>;
}

/// In-memory source whose snapshot can be swapped at runtime.
#[derive(Default)]
pub struct StaticContextSource {
    snapshot: RwLock<BusinessContext>,
}

impl StaticContextSource {
    pub fn new(snapshot: BusinessContext) -> Self {
        Self {
            snapshot: RwLock::new(snapshot),
        }
    }

    pub async fn replace(&self, snapshot: BusinessContext) {
        *self.snapshot.write().await = snapshot;
    }
}

#[async_trait]
impl ContextSource for StaticContextSource {
    async fn fetch(&self) -> Result<BusinessContext> {
        Ok(self.snapshot.read().await.clone())
    }
}

/// Loads snapshots from a source, memoising them in the shared cache.
///
/// A failing source yields the empty default snapshot; the failure is logged
/// and not cached, so the next call tries the source again.
pub struct CachedContextProvider {
    source: Arc<dyn ContextSource>,
    cache: Arc<dyn SharedCache>,
    ttl_secs: i64,
}

impl CachedContextProvider {
    pub fn new(source: Arc<dyn ContextSource>, cache: Arc<dyn SharedCache>, ttl_secs: i64) -> Self {
        Self {
            source,
            cache,
            ttl_secs,
        }
    }

    async fn cached(&self) -> Option<BusinessContext> {
        let entry = self.cache.get(CONTEXT_CACHE_KEY).await?;
        match serde_json::from_value(entry.value) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                warn!("discarding unreadable cached context: {}", e);
                None
            }
        }
    }
}

#[async_trait]
impl ContextProvider for CachedContextProvider {
    async fn load(&self) -> Arc<BusinessContext> {
        if let Some(snapshot) = self.cached().await {
            debug!("business context served from cache");
            return Arc::new(snapshot);
        }

        let snapshot = match self.source.fetch().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("failed to load business context, using empty snapshot: {}", e);
                return Arc::new(BusinessContext::default());
            }
        };

        if self.ttl_secs > 0 {
            match serde_json::to_value(&snapshot) {
                Ok(value) => {
                    let entry = CacheEntry::new(CONTEXT_CACHE_KEY, value).with_ttl(self.ttl_secs);
                    if let Err(e) = self.cache.set(entry).await {
                        warn!("failed to cache business context: {}", e);
                    }
                }
                Err(e) => warn!("failed to serialise business context: {}", e),
            }
        }

        Arc::new(snapshot)
    }

    async fn invalidate(&self) {
        if let Err(e) = self.cache.delete(CONTEXT_CACHE_KEY).await {
            warn!("failed to invalidate cached context: {}", e);
        }
    }
}

/// Fixed snapshot, handy for tests and embedding.
#[async_trait]
impl ContextProvider for BusinessContext {
    async fn load(&self) -> Arc<BusinessContext> {
        Arc::new(self.clone())
    }
}
