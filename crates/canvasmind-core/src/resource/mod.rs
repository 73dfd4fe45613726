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

//! Tracked resources: anything whose cost counts against a scene budget.

mod budget;

pub use self::budget::{BudgetCaps, BudgetStats, QualityMode, UnknownQualityMode};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identity of a node owned by the rendering engine.
///
/// The core never dereferences it; it only compares handles for identity
/// and passes them back to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeHandle(pub u64);

impl fmt::Display for NodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

/// The category of a tracked resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    /// An environment map / skybox.
    Environment,
    /// An individually placed mesh. Only this kind counts as a live node.
    Mesh,
    /// A standalone texture.
    Texture,
    /// A batched, instanced draw of repeated geometry.
    InstancedBatch,
}

impl ResourceKind {
    /// Returns `true` if a resource of this kind occupies a live-node slot.
    pub fn counts_as_node(self) -> bool {
        matches!(self, ResourceKind::Mesh)
    }
}

/// Error returned by a release callback.
///
/// Release is best-effort: the tracked set logs and swallows this error.
#[derive(Debug, Clone, thiserror::Error)]
#[error("release of '{resource}' failed: {message}")]
pub struct ReleaseError {
    /// Id of the resource whose release failed.
    pub resource: String,
    /// Description reported by the collaborator.
    pub message: String,
}

impl ReleaseError {
    /// Creates a new release error.
    pub fn new(resource: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            message: message.into(),
        }
    }
}

/// A release callback supplied at registration time.
///
/// Being `FnOnce`, it can run at most once.
pub type Releaser = Box<dyn FnOnce() -> Result<(), ReleaseError> + Send>;

/// A handle to something consuming scene capacity.
///
/// Exclusively owned by the tracked set from registration until release.
pub struct TrackedResource {
    /// Unique id of the resource.
    pub id: String,
    /// Category of the resource.
    pub kind: ResourceKind,
    /// Estimated memory cost in megabytes (non-negative).
    pub est_mb: f64,
    /// Estimated triangle cost, when known.
    pub est_triangles: Option<u64>,
    /// The owned rendering-engine node.
    pub node: NodeHandle,
    release: Releaser,
}

impl TrackedResource {
    /// Creates a tracked resource with the given release callback.
    ///
    /// Negative or non-finite memory estimates are clamped to zero.
    pub fn new(
        id: impl Into<String>,
        kind: ResourceKind,
        est_mb: f64,
        node: NodeHandle,
        release: impl FnOnce() -> Result<(), ReleaseError> + Send + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            est_mb: if est_mb.is_finite() { est_mb.max(0.0) } else { 0.0 },
            est_triangles: None,
            node,
            release: Box::new(release),
        }
    }

    /// Sets the estimated triangle cost.
    pub fn with_triangles(mut self, triangles: u64) -> Self {
        self.est_triangles = Some(triangles);
        self
    }

    /// Consumes the resource and runs its release callback.
    pub fn release(self) -> Result<(), ReleaseError> {
        (self.release)()
    }
}

impl fmt::Debug for TrackedResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackedResource")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("est_mb", &self.est_mb)
            .field("est_triangles", &self.est_triangles)
            .field("node", &self.node)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_only_meshes_count_as_nodes() {
        assert!(ResourceKind::Mesh.counts_as_node());
        assert!(!ResourceKind::Environment.counts_as_node());
        assert!(!ResourceKind::Texture.counts_as_node());
        assert!(!ResourceKind::InstancedBatch.counts_as_node());
    }

    #[test]
    fn test_release_runs_callback() {
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        let res = TrackedResource::new("tex", ResourceKind::Texture, 4.0, NodeHandle(1), move || {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        assert!(res.release().is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_negative_cost_is_clamped() {
        let res = TrackedResource::new("x", ResourceKind::Mesh, -3.0, NodeHandle(1), || Ok(()));
        assert_eq!(res.est_mb, 0.0);
    }

    #[test]
    fn test_kind_serializes_kebab_case() {
        let json = serde_json::to_string(&ResourceKind::InstancedBatch).unwrap();
        assert_eq!(json, "\"instanced-batch\"");
    }
}
