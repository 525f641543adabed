//! Projection cache using moka
//!
//! Projection is pure, so views are cached by (template id, template
//! revision, pinned version, data fingerprint). Structural saves drop every
//! entry of the template via an invalidation predicate. The revision keeps a
//! render that read the template before such a save from re-inserting its
//! view under a key later readers would hit.

use std::sync::Arc;
use std::time::Duration;

use folio_model::{Fingerprint, Instance, Template, TemplateId};
use moka::future::Cache;

use crate::error::ProjectionError;
use crate::projector::{MaterializedView, Projector};

/// Statistics for cache monitoring
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Approximate number of entries
    pub entry_count: u64,
}

/// Cache key of one rendered view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProjectionKey {
    pub template: TemplateId,
    /// Stored template revision the view was projected from
    pub revision: u64,
    pub version: u32,
    pub data: Fingerprint,
}

impl ProjectionKey {
    /// Key for an instance's current data against a template read
    ///
    /// # Errors
    /// Returns error if the data cannot be fingerprinted
    pub fn for_view(template: &Template, instance: &Instance) -> Result<Self, ProjectionError> {
        Ok(Self {
            template: instance.template_id,
            revision: template.revision,
            version: instance.template_version,
            data: instance.data.fingerprint()?,
        })
    }
}

/// Concurrent cache of materialized views
#[derive(Debug, Clone)]
pub struct ProjectionCache {
    inner: Cache<ProjectionKey, Arc<MaterializedView>>,
}

impl ProjectionCache {
    /// Create cache with max capacity
    #[must_use]
    pub fn new(max_capacity: u64) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(max_capacity)
                .support_invalidation_closures()
                .build(),
        }
    }

    /// Create cache with time-based expiration
    #[must_use]
    pub fn with_ttl(max_capacity: u64, ttl: Duration) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(ttl)
                .support_invalidation_closures()
                .build(),
        }
    }

    /// Cached view for `instance`, projecting on miss
    ///
    /// # Errors
    /// Returns error if the instance data cannot be fingerprinted
    pub async fn get_or_project(
        &self,
        template: &Template,
        instance: &Instance,
        projector: &Projector,
    ) -> Result<Arc<MaterializedView>, ProjectionError> {
        let key = ProjectionKey::for_view(template, instance)?;
        let view = self
            .inner
            .get_with(key, async {
                Arc::new(projector.project(template, instance.template_version, &instance.data))
            })
            .await;
        Ok(view)
    }

    /// Cached view by key
    pub async fn get(&self, key: &ProjectionKey) -> Option<Arc<MaterializedView>> {
        self.inner.get(key).await
    }

    /// Drop every entry of a template
    ///
    /// # Errors
    /// Returns error if the cache rejects the predicate
    pub fn invalidate_template(&self, template: TemplateId) -> Result<(), ProjectionError> {
        self.inner
            .invalidate_entries_if(move |key, _| key.template == template)
            .map(|_| ())
            .map_err(|e| ProjectionError::Invalidation(e.to_string()))?;
        tracing::debug!(%template, "invalidated cached projections");
        Ok(())
    }

    /// Invalidate all entries
    #[inline]
    pub fn invalidate_all(&self) {
        self.inner.invalidate_all();
    }

    /// Flush pending maintenance so counts are current
    pub async fn sync(&self) {
        self.inner.run_pending_tasks().await;
    }

    /// Cache statistics
    #[inline]
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entry_count: self.inner.entry_count(),
        }
    }
}

impl Default for ProjectionCache {
    /// Cache with default capacity (10,000 entries)
    fn default() -> Self {
        Self::new(10_000)
    }
}
