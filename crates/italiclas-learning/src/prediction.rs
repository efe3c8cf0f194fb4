//! Single-text inference backed by an in-memory pipeline cache.
//!
//! The first prediction for a given path reads the pipeline from disk;
//! later ones reuse the same [`Arc`]. The cache is an explicit object so
//! the serving layer can share it and call [`PipelineCache::invalidate`]
//! once a retrain has written a new file.

use crate::error::Result;
use crate::model::FittedPipeline;
use italiclas_data::ArtifactStore;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Loaded pipelines keyed by artifact path.
#[derive(Debug, Default)]
pub struct PipelineCache {
    entries: RwLock<HashMap<PathBuf, Arc<FittedPipeline>>>,
}

impl PipelineCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached pipeline for `path`, loading it through `store` on first use.
    ///
    /// A failed load caches nothing, so the next call retries the disk.
    pub fn get_or_load(&self, store: &ArtifactStore, path: &Path) -> Result<Arc<FittedPipeline>> {
        if let Some(pipeline) = self.entries.read().get(path) {
            return Ok(Arc::clone(pipeline));
        }

        let mut entries = self.entries.write();
        // Another thread may have loaded it while we waited for the lock
        if let Some(pipeline) = entries.get(path) {
            return Ok(Arc::clone(pipeline));
        }
        info!("[ML] Load model pipeline from '{}'", path.display());
        let pipeline = Arc::new(store.load::<FittedPipeline>(path)?);
        entries.insert(path.to_path_buf(), Arc::clone(&pipeline));
        Ok(pipeline)
    }

    /// Drop the entry for `path`. Returns whether one was cached.
    pub fn invalidate(&self, path: &Path) -> bool {
        let removed = self.entries.write().remove(path).is_some();
        if removed {
            debug!("[ML] Invalidated cached pipeline '{}'", path.display());
        }
        removed
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

/// Classifies texts with the pipeline stored at a given path.
#[derive(Debug, Clone)]
pub struct Predictor {
    store: ArtifactStore,
    cache: Arc<PipelineCache>,
}

impl Predictor {
    pub fn new(store: ArtifactStore) -> Self {
        Self::with_cache(store, Arc::new(PipelineCache::new()))
    }

    pub fn with_cache(store: ArtifactStore, cache: Arc<PipelineCache>) -> Self {
        Self { store, cache }
    }

    pub fn cache(&self) -> &Arc<PipelineCache> {
        &self.cache
    }

    /// Whether `text` is in the positive language.
    ///
    /// # Errors
    ///
    /// Fails with a not-found artifact error (see
    /// [`LearningError::is_artifact_not_found`](crate::LearningError::is_artifact_not_found))
    /// when no pipeline exists at `pipeline_path`.
    pub fn predict(&self, text: &str, pipeline_path: &Path) -> Result<bool> {
        let pipeline = self.cache.get_or_load(&self.store, pipeline_path)?;
        Ok(pipeline.predict_one(text))
    }
}

static_assertions::assert_impl_all!(PipelineCache: Send, Sync);
static_assertions::assert_impl_all!(Predictor: Send, Sync);
