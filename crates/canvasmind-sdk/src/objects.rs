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

//! Objects placed in the scene on behalf of the assistant.

use canvasmind_core::{AccessControlEntry, NodeHandle, Provenance, ResourceKind};
use serde::Serialize;

/// A scene object together with what is known about it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SceneObject {
    /// Object id, shared with its tracked resource.
    pub id: String,
    /// Category of the backing resource.
    pub kind: ResourceKind,
    /// Engine node.
    #[serde(skip)]
    pub node: NodeHandle,
    /// Free-form semantic tags, e.g. `mesh`.
    pub semantics: Vec<String>,
    /// Where the asset came from.
    pub provenance: Provenance,
    /// Who may do what with the object.
    pub access: AccessControlEntry,
}

impl SceneObject {
    /// An object generated for the assistant: the assistant may only move
    /// it, users and the system may do anything.
    pub fn generated(
        id: impl Into<String>,
        kind: ResourceKind,
        node: NodeHandle,
        semantics: &[&str],
        provenance: Provenance,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            node,
            semantics: semantics.iter().map(|s| s.to_string()).collect(),
            provenance,
            access: AccessControlEntry::generated_content(),
        }
    }
}
