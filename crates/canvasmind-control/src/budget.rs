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

//! The tracked resource set: live resources, running totals, FIFO eviction.

use canvasmind_core::{BudgetCaps, BudgetStats, NodeHandle, QualityMode, TrackedResource};
use std::collections::VecDeque;

/// Registry of every live resource and the totals they consume.
///
/// Entries are kept in registration order. Whenever a total exceeds its cap
/// the oldest entries are released until the totals fit again. Nothing is
/// exempt, including the entry just registered: a resource that alone
/// overflows a cap is released by its own [`track`](Self::track) call and
/// leaves the set empty.
#[derive(Debug)]
pub struct TrackedResourceSet {
    caps: BudgetCaps,
    registry: VecDeque<TrackedResource>,
    total_mb: f64,
    total_triangles: u64,
    live_nodes: usize,
}

impl Default for TrackedResourceSet {
    fn default() -> Self {
        Self::new(BudgetCaps::default())
    }
}

impl TrackedResourceSet {
    /// Creates an empty set with the given caps.
    pub fn new(caps: BudgetCaps) -> Self {
        Self {
            caps,
            registry: VecDeque::new(),
            total_mb: 0.0,
            total_triangles: 0,
            live_nodes: 0,
        }
    }

    /// Creates an empty set using the caps of a quality preset.
    pub fn with_quality(mode: QualityMode) -> Self {
        Self::new(mode.caps())
    }

    /// The caps currently in force.
    pub fn caps(&self) -> BudgetCaps {
        self.caps
    }

    /// Replaces the caps and immediately evicts down to them.
    ///
    /// Returns the number of evicted resources.
    pub fn set_caps(&mut self, caps: BudgetCaps) -> usize {
        log::info!(
            "Budget caps set to {} MB / {} tris / {} nodes",
            caps.max_tex_mem_mb,
            caps.max_triangles,
            caps.max_live_nodes
        );
        self.caps = caps;
        self.evict()
    }

    /// Registers a resource, adds its cost to the totals, then evicts the
    /// oldest entries while any total is over its cap.
    ///
    /// Returns the number of evicted resources.
    pub fn track(&mut self, resource: TrackedResource) -> usize {
        self.total_mb += resource.est_mb;
        self.total_triangles += resource.est_triangles.unwrap_or(0);
        if resource.kind.counts_as_node() {
            self.live_nodes += 1;
        }
        log::debug!(
            "Tracking '{}' ({:?}, {:.1} MB, {} tris)",
            resource.id,
            resource.kind,
            resource.est_mb,
            resource.est_triangles.unwrap_or(0)
        );
        self.registry.push_back(resource);
        self.evict()
    }

    /// Removes and releases the first entry owning `node`.
    ///
    /// Returns `false` if no entry matches.
    pub fn untrack_by_node(&mut self, node: NodeHandle) -> bool {
        self.untrack_where(|r| r.node == node)
    }

    /// Removes and releases the first entry matching `predicate`.
    ///
    /// Returns `false` if no entry matches.
    pub fn untrack_where(&mut self, predicate: impl FnMut(&TrackedResource) -> bool) -> bool {
        match self.registry.iter().position(predicate) {
            Some(index) => {
                self.release_at(index);
                true
            }
            None => false,
        }
    }

    /// Releases every entry, oldest first, and resets the totals to zero.
    pub fn clear_all(&mut self) {
        let count = self.registry.len();
        while let Some(resource) = self.registry.pop_front() {
            release(resource);
        }
        self.total_mb = 0.0;
        self.total_triangles = 0;
        self.live_nodes = 0;
        if count > 0 {
            log::info!("Cleared {count} tracked resources");
        }
    }

    /// A snapshot of the totals and the caps in force.
    pub fn stats(&self) -> BudgetStats {
        BudgetStats {
            total_mb: self.total_mb,
            total_triangles: self.total_triangles,
            live_nodes: self.live_nodes,
            caps: self.caps,
        }
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.registry.len()
    }

    /// Returns `true` if nothing is tracked.
    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    /// Returns `true` if an entry with this id is live.
    pub fn contains(&self, id: &str) -> bool {
        self.registry.iter().any(|r| r.id == id)
    }

    /// Live entries, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &TrackedResource> {
        self.registry.iter()
    }

    fn over_budget(&self) -> bool {
        self.total_mb > self.caps.max_tex_mem_mb
            || self.total_triangles > self.caps.max_triangles
            || self.live_nodes > self.caps.max_live_nodes
    }

    /// Evicts from the front while over budget.
    fn evict(&mut self) -> usize {
        let mut evicted = 0;
        while self.over_budget() && !self.registry.is_empty() {
            let victim = self.registry.front().map(|r| r.id.clone()).unwrap_or_default();
            self.release_at(0);
            log::debug!("Evicted '{victim}' to fit the budget");
            evicted += 1;
        }
        evicted
    }

    fn release_at(&mut self, index: usize) {
        let Some(resource) = self.registry.remove(index) else {
            return;
        };
        self.total_mb -= resource.est_mb;
        self.total_triangles = self
            .total_triangles
            .saturating_sub(resource.est_triangles.unwrap_or(0));
        if resource.kind.counts_as_node() {
            self.live_nodes = self.live_nodes.saturating_sub(1);
        }
        if self.registry.is_empty() || self.total_mb < 0.0 {
            // Rounding can leave a residue once the last float is subtracted.
            self.total_mb = if self.registry.is_empty() {
                0.0
            } else {
                self.total_mb.max(0.0)
            };
        }
        release(resource);
    }
}

impl Drop for TrackedResourceSet {
    fn drop(&mut self) {
        if !self.registry.is_empty() {
            log::debug!(
                "Dropping tracked set with {} live resources without releasing them",
                self.registry.len()
            );
        }
    }
}

fn release(resource: TrackedResource) {
    let id = resource.id.clone();
    if let Err(e) = resource.release() {
        log::warn!("Release of '{id}' failed: {e}");
    }
}
