// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Instanced batches for repeated geometry.

use canvasmind_core::engine::detach_and_dispose;
use canvasmind_core::{
    GeometryRef, NodeHandle, RenderEngine, ResourceKind, TrackedResource, Transform,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Minimum memory estimate of a batch, in megabytes.
pub const MIN_BATCH_MB: f64 = 8.0;

/// Triangles per estimated megabyte of a batch.
pub const TRIANGLES_PER_MB: f64 = 2500.0;

/// Estimated memory of a batch of geometry with `triangles` triangles.
pub fn batch_mb_estimate(triangles: u64) -> f64 {
    (triangles as f64 / TRIANGLES_PER_MB).round().max(MIN_BATCH_MB)
}

/// One instanced batch, keyed by its geometry.
#[derive(Debug)]
pub struct PoolEntry {
    key: String,
    node: NodeHandle,
    limit: usize,
    est_mb: f64,
    est_triangles: u64,
    transforms: Vec<Transform>,
    retired: Arc<AtomicBool>,
}

impl PoolEntry {
    /// The geometry key of the batch.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Engine node of the batch.
    pub fn node(&self) -> NodeHandle {
        self.node
    }

    /// Number of instances written so far.
    pub fn count(&self) -> usize {
        self.transforms.len()
    }

    /// Maximum number of instances.
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Estimated memory cost, in megabytes.
    pub fn est_mb(&self) -> f64 {
        self.est_mb
    }

    /// Estimated triangles of the prototype geometry.
    pub fn est_triangles(&self) -> u64 {
        self.est_triangles
    }

    /// Instance transforms in insertion order.
    pub fn transforms(&self) -> &[Transform] {
        &self.transforms
    }

    /// Returns `true` if no more instances fit.
    pub fn is_full(&self) -> bool {
        self.transforms.len() >= self.limit
    }

    /// Returns `true` once the batch node has been disposed.
    pub fn is_retired(&self) -> bool {
        self.retired.load(Ordering::SeqCst)
    }
}

/// Batches keyed by geometry, at most one live entry per key.
///
/// The batch node is disposed at most once: by eviction from the tracked set
/// (through [`InstancingPool::tracked_resource`]) or by
/// [`dispose_all`](InstancingPool::dispose_all), whichever comes first.
pub struct InstancingPool {
    engine: Arc<dyn RenderEngine>,
    entries: HashMap<String, PoolEntry>,
}

impl std::fmt::Debug for InstancingPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstancingPool")
            .field("entries", &self.entries)
            .finish_non_exhaustive()
    }
}

impl InstancingPool {
    /// Creates an empty pool drawing through `engine`.
    pub fn new(engine: Arc<dyn RenderEngine>) -> Self {
        Self {
            engine,
            entries: HashMap::new(),
        }
    }

    /// Returns the entry for `key`, creating and attaching a new batch if
    /// none exists yet.
    ///
    /// The flag is `true` when the entry was created by this call; the caller
    /// is then expected to track it.
    pub fn get_or_create(
        &mut self,
        key: &str,
        prototype: &GeometryRef,
        est_triangles: u64,
        count_hint: usize,
    ) -> (&mut PoolEntry, bool) {
        let created = !self.entries.contains_key(key);
        let engine = &self.engine;
        let entry = self.entries.entry(key.to_string()).or_insert_with(|| {
            let node = engine.create_instanced_batch(prototype, count_hint);
            engine.add(node);
            log::debug!("Created instanced batch '{key}' ({node}, limit {count_hint})");
            PoolEntry {
                key: key.to_string(),
                node,
                limit: count_hint,
                est_mb: batch_mb_estimate(est_triangles),
                est_triangles,
                transforms: Vec::with_capacity(count_hint.min(256)),
                retired: Arc::new(AtomicBool::new(false)),
            }
        });
        (entry, created)
    }

    /// Writes one more instance into the batch for `key`.
    ///
    /// Returns `false` if there is no such batch, it is full, or it has been
    /// retired; the caller falls back to an individual mesh.
    pub fn add_instance(&mut self, key: &str, transform: Transform) -> bool {
        let Some(entry) = self.entries.get_mut(key) else {
            return false;
        };
        if entry.is_full() || entry.is_retired() {
            return false;
        }
        let index = entry.transforms.len();
        self.engine.set_instance_transform(entry.node, index, &transform);
        entry.transforms.push(transform);
        true
    }

    /// A tracked-set registration for the batch under `key`.
    ///
    /// Its release detaches and disposes the batch node unless that already
    /// happened.
    pub fn tracked_resource(&self, key: &str) -> Option<TrackedResource> {
        let entry = self.entries.get(key)?;
        let retired = entry.retired.clone();
        let engine = self.engine.clone();
        let node = entry.node;
        let resource = TrackedResource::new(
            format!("instanced_{key}"),
            ResourceKind::InstancedBatch,
            entry.est_mb,
            node,
            move || {
                if retired.swap(true, Ordering::SeqCst) {
                    return Ok(());
                }
                detach_and_dispose(engine.as_ref(), node)
            },
        );
        Some(resource.with_triangles(entry.est_triangles))
    }

    /// Looks up the batch for `key`.
    pub fn get(&self, key: &str) -> Option<&PoolEntry> {
        self.entries.get(key)
    }

    /// Number of batches, retired ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the pool holds no batches.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Detaches and disposes every batch not yet retired, then empties the
    /// pool.
    ///
    /// Returns the number of batches disposed by this call.
    pub fn dispose_all(&mut self) -> usize {
        let mut disposed = 0;
        for (key, entry) in self.entries.drain() {
            if entry.retired.swap(true, Ordering::SeqCst) {
                continue;
            }
            if let Err(e) = detach_and_dispose(self.engine.as_ref(), entry.node) {
                log::warn!("Failed to dispose instanced batch '{key}': {e}");
            }
            disposed += 1;
        }
        disposed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::budget::TrackedResourceSet;
    use canvasmind_core::{BudgetCaps, HeadlessEngine};

    fn pool() -> (Arc<HeadlessEngine>, InstancingPool) {
        let engine = Arc::new(HeadlessEngine::new());
        let pool = InstancingPool::new(engine.clone());
        (engine, pool)
    }

    fn rock() -> GeometryRef {
        GeometryRef("rock.glb".into())
    }

    #[test]
    fn test_mb_estimate_has_floor() {
        assert_eq!(batch_mb_estimate(0), 8.0);
        assert_eq!(batch_mb_estimate(20_000), 8.0);
        assert_eq!(batch_mb_estimate(50_000), 20.0);
    }

    #[test]
    fn test_get_or_create_reuses_entry() {
        let (engine, mut pool) = pool();
        let (entry, created) = pool.get_or_create("rock", &rock(), 20_000, 10);
        let node = entry.node();
        assert!(created);
        assert!(engine.is_attached(node));

        let (again, created) = pool.get_or_create("rock", &rock(), 20_000, 10);
        assert!(!created);
        assert_eq!(again.node(), node);
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_add_instance_respects_limit() {
        let (engine, mut pool) = pool();
        pool.get_or_create("rock", &rock(), 20_000, 2);

        assert!(pool.add_instance("rock", Transform::from_translation(0.0, 0.0, 0.0)));
        assert!(pool.add_instance("rock", Transform::from_translation(1.0, 0.0, 0.0)));
        assert!(!pool.add_instance("rock", Transform::from_translation(2.0, 0.0, 0.0)));
        assert!(!pool.add_instance("unknown", Transform::IDENTITY));

        let entry = pool.get("rock").unwrap();
        assert_eq!(entry.count(), 2);
        assert!(entry.is_full());
        assert_eq!(entry.transforms()[1].translation(), [1.0, 0.0, 0.0]);
        assert_eq!(engine.instances_written(), 2);
    }

    #[test]
    fn test_eviction_retires_batch_once() {
        let (engine, mut pool) = pool();
        let mut set = TrackedResourceSet::new(BudgetCaps::new(10.0, 1_000_000, 10));
        let (entry, _) = pool.get_or_create("rock", &rock(), 20_000, 4);
        let node = entry.node();
        set.track(pool.tracked_resource("rock").unwrap());

        // A second 8 MB batch pushes the first one out.
        pool.get_or_create("tree", &GeometryRef("tree.glb".into()), 1_000, 4);
        set.track(pool.tracked_resource("tree").unwrap());

        assert!(pool.get("rock").unwrap().is_retired());
        assert!(!engine.is_attached(node));
        assert!(!pool.add_instance("rock", Transform::IDENTITY));

        // Only the still-live batch is disposed here.
        assert_eq!(pool.dispose_all(), 1);
        set.clear_all();
        assert_eq!(engine.disposed().len(), 2);
    }

    #[test]
    fn test_dispose_all_then_clear_is_idempotent() {
        let (engine, mut pool) = pool();
        let mut set = TrackedResourceSet::default();
        pool.get_or_create("rock", &rock(), 20_000, 4);
        set.track(pool.tracked_resource("rock").unwrap());

        assert_eq!(pool.dispose_all(), 1);
        assert!(pool.is_empty());
        set.clear_all();

        assert_eq!(engine.disposed().len(), 1);
        assert_eq!(engine.attached_count(), 0);
    }
}
