//! Goods-name catalog using moka
//!
//! Read-through cache from goods type id to display name. One catalog is
//! built per session and handed to whoever needs name resolution.

use crate::error::StoreError;
use crate::store::WorkflowStore;
use crate::types::GoodsTypeId;
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;

/// Statistics for cache monitoring
#[derive(Debug, Clone, Copy, Default)]
pub struct CatalogStats {
    /// Number of names held
    pub entry_count: u64,
}

/// Session-scoped goods name lookup
#[derive(Debug, Clone)]
pub struct GoodsCatalog {
    inner: Cache<GoodsTypeId, Arc<str>>,
}

impl GoodsCatalog {
    /// Create catalog with max capacity
    #[inline]
    #[must_use]
    pub fn new(max_capacity: u64) -> Self {
        Self {
            inner: Cache::new(max_capacity),
        }
    }

    /// Create catalog whose names expire after `ttl`
    #[inline]
    #[must_use]
    pub fn with_ttl(max_capacity: u64, ttl: Duration) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(ttl)
                .build(),
        }
    }

    /// Load every catalog entry; returns how many names were cached
    pub async fn preload<S>(&self, store: &S) -> Result<usize, StoreError>
    where
        S: WorkflowStore + ?Sized,
    {
        let goods = store.list_goods_types().await?;
        let count = goods.len();
        for g in goods {
            self.inner.insert(g.id, Arc::from(g.name)).await;
        }
        tracing::debug!(count, "goods catalog preloaded");
        Ok(count)
    }

    /// Cached name, if present
    #[inline]
    pub async fn cached(&self, id: &GoodsTypeId) -> Option<Arc<str>> {
        self.inner.get(id).await
    }

    /// Resolve a name, falling back to the store on a miss
    ///
    /// Goods types unknown to the store resolve to `None` and are not cached.
    pub async fn name_of<S>(
        &self,
        store: &S,
        id: GoodsTypeId,
    ) -> Result<Option<Arc<str>>, StoreError>
    where
        S: WorkflowStore + ?Sized,
    {
        if let Some(name) = self.cached(&id).await {
            return Ok(Some(name));
        }

        let Some(goods) = store.get_goods_type(id).await? else {
            return Ok(None);
        };
        let name: Arc<str> = Arc::from(goods.name);
        self.inner.insert(id, name.clone()).await;
        Ok(Some(name))
    }

    /// Drop one name, e.g. after the admin renames a goods type
    #[inline]
    pub async fn invalidate(&self, id: &GoodsTypeId) {
        self.inner.invalidate(id).await;
    }

    /// Drop every cached name
    #[inline]
    pub fn invalidate_all(&self) {
        self.inner.invalidate_all();
    }

    /// Get catalog statistics
    pub async fn stats(&self) -> CatalogStats {
        self.inner.run_pending_tasks().await;
        CatalogStats {
            entry_count: self.inner.entry_count(),
        }
    }
}

impl Default for GoodsCatalog {
    /// Create catalog with default capacity (10,000 entries)
    fn default() -> Self {
        Self::new(10_000)
    }
}
