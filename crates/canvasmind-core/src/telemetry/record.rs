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

//! Append-only telemetry records.

use crate::resource::BudgetStats;
use serde::{Deserialize, Serialize};

/// The generator output a planner picked (or passed over).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateInfo {
    /// Asset type, e.g. `skybox` or `mesh`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Model reported by the generator.
    pub model: String,
    /// Generator seed.
    pub seed: u64,
    /// Extra fields, e.g. a ranking score.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// `{prompt, candidate, chosen, dwellTime}`, the preference signal of one
/// generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateRecord {
    /// The prompt that produced the candidate.
    pub prompt: String,
    /// The candidate itself.
    pub candidate: CandidateInfo,
    /// Whether the candidate was applied to the scene.
    pub chosen: bool,
    /// How long the candidate stayed visible, in seconds.
    #[serde(rename = "dwellTime")]
    pub dwell_time: f64,
}

/// A single fire-and-forget telemetry record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TelemetryRecord {
    /// Outcome of one admission.
    AdmissionDecision {
        /// Operation name of the action.
        op: String,
        /// Whether it passed both passes.
        allowed: bool,
        /// Rejection reason, if rejected.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    /// Budget usage at some point in time.
    ResourceSnapshot {
        /// The snapshot.
        stats: BudgetStats,
    },
    /// A generation candidate.
    Candidate(CandidateRecord),
    /// A skybox was applied.
    SkyboxApplied {
        /// Generator model.
        model: String,
        /// Generator seed.
        seed: u64,
        /// Estimated texture memory.
        tex_mb: f64,
    },
    /// A mesh was spawned.
    MeshSpawned {
        /// Generator model.
        model: String,
        /// Generator seed.
        seed: u64,
        /// Estimated triangles.
        tris: u64,
        /// Whether the mesh went into an instanced batch.
        instanced: bool,
    },
    /// A declared or observed cost exceeded a cap.
    BudgetViolation {
        /// Which quantity, e.g. `texMemMB`.
        kind: String,
        /// The offending value.
        value: f64,
        /// The cap in force.
        cap: f64,
    },
}

impl TelemetryRecord {
    /// Short name of the record type.
    pub fn type_name(&self) -> &'static str {
        match self {
            TelemetryRecord::AdmissionDecision { .. } => "admission_decision",
            TelemetryRecord::ResourceSnapshot { .. } => "resource_snapshot",
            TelemetryRecord::Candidate(_) => "candidate",
            TelemetryRecord::SkyboxApplied { .. } => "skybox_applied",
            TelemetryRecord::MeshSpawned { .. } => "mesh_spawned",
            TelemetryRecord::BudgetViolation { .. } => "budget_violation",
        }
    }
}
