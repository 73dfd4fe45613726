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

//! The normalized, engine-agnostic unit consumed by the admission pipeline.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A property value attached to a spawn request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropValue {
    /// A single number, e.g. `scale=2`.
    Number(f64),
    /// An inclusive numeric range, e.g. `scale=1..3`.
    Range([f64; 2]),
    /// A quoted string, e.g. `material="basalt"`.
    Text(String),
}

impl fmt::Display for PropValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropValue::Number(n) => write!(f, "{n}"),
            PropValue::Range([a, b]) => write!(f, "{a}..{b}"),
            PropValue::Text(s) => write!(f, "\"{s}\""),
        }
    }
}

/// Operation-specific payload of a [`CompiledAction`], tagged by `op`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op")]
pub enum ActionKind {
    /// Requests a generated skybox.
    #[serde(rename = "skybox.generate")]
    SkyboxGenerate {
        /// Text prompt sent to the generator.
        prompt: String,
        /// Generator seed.
        seed: u64,
        /// Requested edge resolution in pixels.
        resolution: u32,
    },
    /// Requests `count` objects of a kind.
    #[serde(rename = "spawn")]
    Spawn {
        /// The object kind, e.g. `rock`.
        kind: String,
        /// Cardinality of the request.
        count: u32,
        /// Free-form properties.
        props: BTreeMap<String, PropValue>,
    },
    /// Updates the water/world-field simulation.
    #[serde(rename = "worldfield.setParams")]
    WorldFieldSetParams {
        /// Wave intensity.
        intensity: f64,
    },
    /// Moves the sun.
    #[serde(rename = "lighting.set")]
    LightingSet {
        /// Sun elevation angle in degrees.
        #[serde(rename = "sunAngle")]
        sun_angle: f64,
    },
    /// Moves an existing object. Usually carries a `targetId`.
    #[serde(rename = "transform")]
    Transform {
        /// New translation of the target.
        translation: [f64; 3],
    },
}

impl ActionKind {
    /// Returns the operation name this payload is published under.
    pub fn op(&self) -> &'static str {
        match self {
            ActionKind::SkyboxGenerate { .. } => "skybox.generate",
            ActionKind::Spawn { .. } => "spawn",
            ActionKind::WorldFieldSetParams { .. } => "worldfield.setParams",
            ActionKind::LightingSet { .. } => "lighting.set",
            ActionKind::Transform { .. } => "transform",
        }
    }
}

/// One normalized scene-mutation request, serialized as `{ op, ...typed fields }`.
///
/// Besides its payload an action may name a target object (checked by the
/// policy pass) and declare estimated costs (checked by the budget pass).
/// Actions are immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledAction {
    /// The tagged payload.
    #[serde(flatten)]
    pub kind: ActionKind,
    /// Object the action applies to, if any.
    #[serde(rename = "targetId", default, skip_serializing_if = "Option::is_none")]
    pub target_id: Option<String>,
    /// Declared triangle cost, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tris: Option<u64>,
    /// Declared texture-memory cost in megabytes, if any.
    #[serde(rename = "texMemMB", default, skip_serializing_if = "Option::is_none")]
    pub tex_mem_mb: Option<f64>,
}

impl CompiledAction {
    /// Wraps a payload with no target and no declared cost.
    pub fn new(kind: ActionKind) -> Self {
        Self {
            kind,
            target_id: None,
            tris: None,
            tex_mem_mb: None,
        }
    }

    /// Returns the operation name.
    pub fn op(&self) -> &'static str {
        self.kind.op()
    }

    /// Sets the target object id.
    pub fn with_target(mut self, target_id: impl Into<String>) -> Self {
        self.target_id = Some(target_id.into());
        self
    }

    /// Declares a triangle cost.
    pub fn with_tris(mut self, tris: u64) -> Self {
        self.tris = Some(tris);
        self
    }

    /// Declares a texture-memory cost in megabytes.
    pub fn with_tex_mem_mb(mut self, mb: f64) -> Self {
        self.tex_mem_mb = Some(mb);
        self
    }
}

impl From<ActionKind> for CompiledAction {
    fn from(kind: ActionKind) -> Self {
        Self::new(kind)
    }
}
