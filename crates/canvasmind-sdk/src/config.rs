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

use canvasmind_agents::PlannerConfig;
use canvasmind_control::PacingSchedule;
use canvasmind_core::{BudgetCaps, QualityMode};
use canvasmind_telemetry::TelemetryConfig;
use serde::Deserialize;

/// Configuration of a [`SceneRuntime`](crate::SceneRuntime).
///
/// Every field has a default, so a partial JSON document is enough.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RuntimeConfig {
    /// Quality preset whose caps are in force at start.
    pub quality: QualityMode,
    /// Explicit caps overriding the preset.
    pub caps: Option<BudgetCaps>,
    /// Nominal number of concurrent spawn requests in a batch.
    pub max_in_flight: usize,
    /// Throttle curve applied on top of `max_in_flight`.
    pub pacing: PacingSchedule,
    /// Retry policy for generator calls.
    pub planner: PlannerConfig,
    /// Telemetry delivery.
    pub telemetry: TelemetryConfig,
    /// Edge resolution requested for skyboxes, in pixels.
    pub skybox_resolution: u32,
    /// Prompt sent with mesh requests.
    pub mesh_prompt: String,
    /// Candidates generated per mesh spawn; the best one is placed.
    pub mesh_candidates: usize,
    /// Capacity of each instanced batch.
    pub instance_capacity: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            quality: QualityMode::Balanced,
            caps: None,
            max_in_flight: 4,
            pacing: PacingSchedule::default(),
            planner: PlannerConfig::default(),
            telemetry: TelemetryConfig::default(),
            skybox_resolution: 2048,
            mesh_prompt: "basalt boulder with wet sheen".into(),
            mesh_candidates: 3,
            instance_capacity: 2000,
        }
    }
}

impl RuntimeConfig {
    /// The caps in force at start.
    pub fn initial_caps(&self) -> BudgetCaps {
        self.caps.unwrap_or_else(|| self.quality.caps())
    }

    /// Parses a JSON configuration document.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
