//! Tile feature store with a bounded per-tile cache.
//!
//! The store owns the shape annotations and lazily assembles [`TileData`]
//! per tile. Assembled tiles are cached in a `moka::sync::Cache` and the
//! whole cache is dropped whenever the annotation set changes.
//!
//! # Staleness
//!
//! Every mutation bumps a generation counter and clears the cache while
//! holding the annotation write lock. A tile is cached under the read lock
//! only if the generation it was assembled from is still current, so the
//! cache cannot hold data from an older shape set. A tile assembled while
//! a mutation was in flight is returned to its caller but never cached.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use moka::sync::Cache;
use parking_lot::RwLock;
use thiserror::Error;
use tracing::{debug, info};

use super::{AnnotationId, ShapeAnnotation, TileData};
use crate::coord::CanonicalTileId;
use crate::geometry::Shape;
use crate::tiler::TilerError;

/// Default number of assembled tiles kept in memory.
pub const DEFAULT_TILE_CACHE_CAPACITY: u64 = 512;

/// Errors from store mutations and queries.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StoreError {
    #[error("Annotation {0} already exists")]
    DuplicateAnnotation(AnnotationId),

    #[error("Annotation {0} not found")]
    UnknownAnnotation(AnnotationId),

    #[error("Tiler error: {0}")]
    Tiler(#[from] TilerError),
}

/// Store configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreConfig {
    /// Maximum number of cached tiles.
    pub tile_cache_capacity: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            tile_cache_capacity: DEFAULT_TILE_CACHE_CAPACITY,
        }
    }
}

/// Point-in-time store statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub hits: u64,
    pub misses: u64,
    pub cached_tiles: u64,
    pub annotations: usize,
    pub generation: u64,
}

/// Shape annotations plus a cache of assembled tiles.
pub struct TileFeatureStore {
    annotations: RwLock<BTreeMap<AnnotationId, Arc<ShapeAnnotation>>>,
    cache: Cache<CanonicalTileId, Arc<TileData>>,
    generation: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl TileFeatureStore {
    pub fn new(config: StoreConfig) -> Self {
        Self {
            annotations: RwLock::new(BTreeMap::new()),
            cache: Cache::new(config.tile_cache_capacity),
            generation: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Adds a single-shape annotation.
    pub fn add_shape(&self, id: AnnotationId, shape: Shape, max_zoom: u8) -> Result<(), StoreError> {
        self.add_annotation(ShapeAnnotation::new(id, shape, max_zoom)?)
    }

    /// Adds a prepared annotation. Ids must be unique.
    pub fn add_annotation(&self, annotation: ShapeAnnotation) -> Result<(), StoreError> {
        let id = annotation.id();
        let mut annotations = self.annotations.write();
        if annotations.contains_key(&id) {
            return Err(StoreError::DuplicateAnnotation(id));
        }
        annotations.insert(id, Arc::new(annotation));
        self.invalidate("add", id);
        Ok(())
    }

    /// Replaces the shape or max zoom of an existing annotation.
    pub fn update_shape(&self, id: AnnotationId, shape: Shape, max_zoom: u8) -> Result<(), StoreError> {
        let annotation = ShapeAnnotation::new(id, shape, max_zoom)?;
        let mut annotations = self.annotations.write();
        match annotations.get_mut(&id) {
            Some(slot) => *slot = Arc::new(annotation),
            None => return Err(StoreError::UnknownAnnotation(id)),
        }
        self.invalidate("update", id);
        Ok(())
    }

    /// Removes an annotation. Returns whether it existed.
    pub fn remove(&self, id: AnnotationId) -> bool {
        let mut annotations = self.annotations.write();
        let removed = annotations.remove(&id).is_some();
        if removed {
            self.invalidate("remove", id);
        }
        removed
    }

    /// Returns the data for `tile`, assembling it on a cache miss.
    ///
    /// Annotations whose max zoom is below `tile.z` contribute nothing.
    pub fn get_tile(&self, tile: CanonicalTileId) -> Result<Arc<TileData>, StoreError> {
        if let Some(data) = self.cache.get(&tile) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(data);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        let (generation, annotations) = {
            let annotations = self.annotations.read();
            let current: Vec<Arc<ShapeAnnotation>> = annotations
                .values()
                .filter(|a| a.max_zoom() >= tile.z)
                .cloned()
                .collect();
            (self.generation.load(Ordering::Acquire), current)
        };

        let mut data = TileData::new();
        for annotation in &annotations {
            annotation.update_tile_data(tile, &mut data)?;
        }
        let data = Arc::new(data);

        {
            let _annotations = self.annotations.read();
            if self.generation.load(Ordering::Acquire) == generation {
                self.cache.insert(tile, Arc::clone(&data));
            }
        }

        debug!(
            tile = %tile,
            layers = data.layer_count(),
            features = data.feature_count(),
            "Assembled tile"
        );
        Ok(data)
    }

    /// Current generation; bumps on every annotation change.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    pub fn annotation_count(&self) -> usize {
        self.annotations.read().len()
    }

    pub fn contains(&self, id: AnnotationId) -> bool {
        self.annotations.read().contains_key(&id)
    }

    pub fn stats(&self) -> StoreStats {
        self.cache.run_pending_tasks();
        StoreStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            cached_tiles: self.cache.entry_count(),
            annotations: self.annotation_count(),
            generation: self.generation(),
        }
    }

    /// Callers hold the annotation write lock.
    fn invalidate(&self, reason: &'static str, id: AnnotationId) {
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        self.cache.invalidate_all();
        info!(annotation = id, reason, generation, "Tile cache invalidated");
    }
}

impl Default for TileFeatureStore {
    fn default() -> Self {
        Self::new(StoreConfig::default())
    }
}
