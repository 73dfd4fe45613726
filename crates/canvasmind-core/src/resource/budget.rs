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

//! Budget ceilings, quality presets and usage snapshots.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Three independent ceilings on scene capacity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetCaps {
    /// Maximum texture memory, in megabytes.
    #[serde(rename = "maxTexMemMB")]
    pub max_tex_mem_mb: f64,
    /// Maximum number of triangles.
    pub max_triangles: u64,
    /// Maximum number of live mesh nodes.
    pub max_live_nodes: usize,
}

impl BudgetCaps {
    /// Creates a new set of caps.
    pub const fn new(max_tex_mem_mb: f64, max_triangles: u64, max_live_nodes: usize) -> Self {
        Self {
            max_tex_mem_mb,
            max_triangles,
            max_live_nodes,
        }
    }
}

impl Default for BudgetCaps {
    fn default() -> Self {
        QualityMode::Balanced.caps()
    }
}

/// Named quality presets that atomically replace [`BudgetCaps`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityMode {
    /// Smallest footprint.
    Performance,
    /// The default trade-off.
    #[default]
    Balanced,
    /// Largest footprint.
    Quality,
}

impl QualityMode {
    /// Returns the fixed caps associated with this preset.
    ///
    /// | Mode | Texture MB | Triangles | Nodes |
    /// |---|---|---|---|
    /// | performance | 256 | 800 000 | 80 |
    /// | balanced | 512 | 1 500 000 | 120 |
    /// | quality | 1024 | 3 000 000 | 200 |
    pub const fn caps(self) -> BudgetCaps {
        match self {
            QualityMode::Performance => BudgetCaps::new(256.0, 800_000, 80),
            QualityMode::Balanced => BudgetCaps::new(512.0, 1_500_000, 120),
            QualityMode::Quality => BudgetCaps::new(1024.0, 3_000_000, 200),
        }
    }

    /// Returns the lowercase name of the preset.
    pub const fn as_str(self) -> &'static str {
        match self {
            QualityMode::Performance => "performance",
            QualityMode::Balanced => "balanced",
            QualityMode::Quality => "quality",
        }
    }
}

impl fmt::Display for QualityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown quality preset name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown quality mode '{0}' (expected performance, balanced or quality)")]
pub struct UnknownQualityMode(pub String);

impl FromStr for QualityMode {
    type Err = UnknownQualityMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "performance" => Ok(QualityMode::Performance),
            "balanced" => Ok(QualityMode::Balanced),
            "quality" => Ok(QualityMode::Quality),
            other => Err(UnknownQualityMode(other.to_string())),
        }
    }
}

/// A point-in-time snapshot of the running totals against their caps.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetStats {
    /// Total estimated memory of live resources, in megabytes.
    #[serde(rename = "totalMB")]
    pub total_mb: f64,
    /// Total estimated triangles of live resources.
    pub total_triangles: u64,
    /// Number of live mesh nodes.
    pub live_nodes: usize,
    /// The caps in force when the snapshot was taken.
    pub caps: BudgetCaps,
}

impl BudgetStats {
    /// Returns `true` if every total is within its cap.
    pub fn within_caps(&self) -> bool {
        self.total_mb <= self.caps.max_tex_mem_mb
            && self.total_triangles <= self.caps.max_triangles
            && self.live_nodes <= self.caps.max_live_nodes
    }

    /// Returns `true` if live nodes or texture memory exceed 90% of their caps.
    pub fn is_crowded(&self) -> bool {
        self.live_nodes as f64 > self.caps.max_live_nodes as f64 * 0.9
            || self.total_mb > self.caps.max_tex_mem_mb * 0.9
    }

    /// Returns `true` if no further mesh node fits under the node cap.
    pub fn node_cap_reached(&self) -> bool {
        self.live_nodes >= self.caps.max_live_nodes
    }
}
