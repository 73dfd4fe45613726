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

//! The public-facing API of CanvasMind.
//!
//! [`SceneRuntime`] owns the budget, the instancing pool and the admission
//! pipeline, and exposes the handful of operations an application needs:
//! run a script, apply a generated skybox, spawn generated meshes, clear the
//! scene, switch quality, and report state.

#![warn(missing_docs)]

mod config;
mod error;
mod objects;
mod runtime;

pub use config::RuntimeConfig;
pub use error::RuntimeError;
pub use objects::SceneObject;
pub use runtime::{BatchReport, RuntimeState, SceneRuntime, SpawnOutcome};

/// Re-exports for applications embedding the runtime.
pub mod prelude {
    pub use canvasmind_agents::{MockAssetFetcher, ServerRegistry};
    pub use canvasmind_control::{AdmissionOutcome, AdmissionRecord};
    pub use canvasmind_core::{
        ActionKind, AssetFetcher, BudgetCaps, BudgetStats, CompiledAction, HeadlessEngine,
        QualityMode, RenderEngine,
    };
    pub use canvasmind_telemetry::{MemorySink, NullSink, TelemetrySink};

    pub use crate::{BatchReport, RuntimeConfig, RuntimeError, RuntimeState, SceneRuntime};
}
