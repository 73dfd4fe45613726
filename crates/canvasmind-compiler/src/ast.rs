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

//! The CanvasScript syntax tree.

use canvasmind_core::PropValue;
use serde::Serialize;
use std::collections::BTreeMap;

/// One statement of a script.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum AstNode {
    /// `scene { ... }`
    SceneBlock {
        /// Nested statements in document order.
        body: Vec<AstNode>,
    },
    /// `spawn <kind> [key=value]*`
    Spawn {
        /// Object kind.
        kind: String,
        /// Value of a bare integer `count=` key, if present.
        count: Option<u32>,
        /// Every other key.
        props: BTreeMap<String, PropValue>,
    },
    /// `sky "<label>"`
    Sky {
        /// Skybox prompt.
        label: String,
    },
    /// `water waves intensity=<number>`
    Water {
        /// Wave intensity.
        #[serde(rename = "wavesIntensity")]
        waves_intensity: f64,
    },
    /// `lighting sun angle=<number>`
    LightingSun {
        /// Sun angle.
        angle: f64,
    },
}
