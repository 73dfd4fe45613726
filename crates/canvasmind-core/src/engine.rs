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

//! Contract of the rendering-engine collaborator.
//!
//! The core never mutates the scene graph directly. It asks the engine for
//! handles, and hands the engine's `remove`/`dispose` back to it through
//! release callbacks.

use crate::asset::AssetDescriptor;
use crate::resource::{NodeHandle, ReleaseError};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Opaque reference to prototype geometry inside the engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GeometryRef(pub String);

/// A column-major 4x4 affine transform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform(pub [f32; 16]);

impl Transform {
    /// The identity transform.
    pub const IDENTITY: Self = Self([
        1.0, 0.0, 0.0, 0.0, //
        0.0, 1.0, 0.0, 0.0, //
        0.0, 0.0, 1.0, 0.0, //
        0.0, 0.0, 0.0, 1.0,
    ]);

    /// A pure translation.
    pub fn from_translation(x: f32, y: f32, z: f32) -> Self {
        let mut m = Self::IDENTITY.0;
        m[12] = x;
        m[13] = y;
        m[14] = z;
        Self(m)
    }

    /// Returns the translation component.
    pub fn translation(&self) -> [f32; 3] {
        [self.0[12], self.0[13], self.0[14]]
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// The rendering engine as seen from the budget pipeline.
///
/// Implementations use interior mutability: handles are shared with release
/// callbacks that may run from any eviction site.
pub trait RenderEngine: Send + Sync {
    /// Materializes a fetched asset as a detached node.
    fn create_node(&self, asset: &AssetDescriptor) -> NodeHandle;

    /// Allocates an instanced batch able to hold `capacity` instances.
    fn create_instanced_batch(&self, geometry: &GeometryRef, capacity: usize) -> NodeHandle;

    /// Writes the transform of instance `index` of `batch`.
    fn set_instance_transform(&self, batch: NodeHandle, index: usize, transform: &Transform);

    /// Attaches a node to the scene.
    fn add(&self, node: NodeHandle);

    /// Detaches a node from the scene.
    fn remove(&self, node: NodeHandle);

    /// Frees the GPU resources owned by a node.
    fn dispose(&self, node: NodeHandle) -> Result<(), ReleaseError>;

    /// Number of draw calls issued by the last frame.
    fn draw_calls(&self) -> u64;
}

/// Detaches and disposes `node`, the usual body of a release callback.
pub fn detach_and_dispose(engine: &dyn RenderEngine, node: NodeHandle) -> Result<(), ReleaseError> {
    engine.remove(node);
    engine.dispose(node)
}

/// An engine with no GPU behind it.
///
/// It hands out sequential handles and records the scene membership, which
/// is all the budget pipeline can observe. Used by the command-line runtime
/// and by tests.
#[derive(Debug, Default)]
pub struct HeadlessEngine {
    next: AtomicU64,
    state: Mutex<HeadlessState>,
}

#[derive(Debug, Default)]
struct HeadlessState {
    attached: HashSet<NodeHandle>,
    disposed: Vec<NodeHandle>,
    instances_written: usize,
    failing: HashSet<NodeHandle>,
}

impl HeadlessEngine {
    /// Creates an empty headless engine.
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate(&self) -> NodeHandle {
        NodeHandle(self.next.fetch_add(1, Ordering::Relaxed) + 1)
    }

    fn state(&self) -> std::sync::MutexGuard<'_, HeadlessState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Makes every future `dispose` of `node` fail.
    pub fn fail_dispose_of(&self, node: NodeHandle) {
        self.state().failing.insert(node);
    }

    /// Returns `true` if `node` is attached to the scene.
    pub fn is_attached(&self, node: NodeHandle) -> bool {
        self.state().attached.contains(&node)
    }

    /// Number of nodes attached to the scene.
    pub fn attached_count(&self) -> usize {
        self.state().attached.len()
    }

    /// Handles disposed so far, in disposal order.
    pub fn disposed(&self) -> Vec<NodeHandle> {
        self.state().disposed.clone()
    }

    /// Total number of instance transforms written.
    pub fn instances_written(&self) -> usize {
        self.state().instances_written
    }
}

impl RenderEngine for HeadlessEngine {
    fn create_node(&self, asset: &AssetDescriptor) -> NodeHandle {
        let node = self.allocate();
        log::trace!("HeadlessEngine: created {node} for {}", asset.url());
        node
    }

    fn create_instanced_batch(&self, geometry: &GeometryRef, capacity: usize) -> NodeHandle {
        let node = self.allocate();
        log::trace!(
            "HeadlessEngine: created batch {node} for '{}' (capacity {capacity})",
            geometry.0
        );
        node
    }

    fn set_instance_transform(&self, _batch: NodeHandle, _index: usize, _transform: &Transform) {
        self.state().instances_written += 1;
    }

    fn add(&self, node: NodeHandle) {
        self.state().attached.insert(node);
    }

    fn remove(&self, node: NodeHandle) {
        self.state().attached.remove(&node);
    }

    fn dispose(&self, node: NodeHandle) -> Result<(), ReleaseError> {
        let mut state = self.state();
        if state.failing.contains(&node) {
            return Err(ReleaseError::new(node.to_string(), "dispose refused"));
        }
        state.disposed.push(node);
        Ok(())
    }

    fn draw_calls(&self) -> u64 {
        self.state().attached.len() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_translation_roundtrip() {
        let t = Transform::from_translation(1.0, 2.0, 3.0);
        assert_eq!(t.translation(), [1.0, 2.0, 3.0]);
        assert_eq!(Transform::default(), Transform::IDENTITY);
    }

    #[test]
    fn test_placement_translation_is_preserved() {
        let t = Transform::from_translation(-1.7, 0.0, 0.3);
        let [x, y, z] = t.translation();
        approx::assert_relative_eq!(x, -1.7);
        approx::assert_abs_diff_eq!(y, 0.0);
        approx::assert_relative_eq!(z, 0.3);
        approx::assert_relative_eq!(t.0[15], 1.0);
    }

    #[test]
    fn test_headless_engine_tracks_membership() {
        let engine = HeadlessEngine::new();
        let a = engine.create_instanced_batch(&GeometryRef("rock".into()), 4);
        let b = engine.create_instanced_batch(&GeometryRef("rock".into()), 4);
        assert_ne!(a, b);

        engine.add(a);
        assert!(engine.is_attached(a));
        assert_eq!(engine.draw_calls(), 1);

        detach_and_dispose(&engine, a).unwrap();
        assert!(!engine.is_attached(a));
        assert_eq!(engine.disposed(), vec![a]);
    }

    #[test]
    fn test_headless_engine_failing_dispose() {
        let engine = HeadlessEngine::new();
        let a = engine.create_instanced_batch(&GeometryRef("rock".into()), 1);
        engine.fail_dispose_of(a);
        assert!(engine.dispose(a).is_err());
        assert!(engine.disposed().is_empty());
    }
}
