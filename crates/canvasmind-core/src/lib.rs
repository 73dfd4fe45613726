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

//! # CanvasMind Core
//!
//! Foundational crate containing the shared types and interface contracts of
//! the resource budget and action-admission pipeline: tracked resources and
//! their caps, compiled actions, access-control entries, the scene-mutation
//! bus, and the traits implemented by external collaborators (rendering
//! engine, asset-fetch service).

#![warn(missing_docs)]

pub mod action;
pub mod asset;
pub mod engine;
pub mod event;
pub mod policy;
pub mod resource;
pub mod telemetry;

pub use action::{ActionKind, CompiledAction, PropValue};
pub use asset::{
    AssetDescriptor, AssetFetcher, CostEstimate, FetchError, FetchRequest, FetchResponse,
    Provenance,
};
pub use engine::{GeometryRef, HeadlessEngine, RenderEngine, Transform};
pub use event::SceneBus;
pub use policy::{AccessControlEntry, AccessControlTable, Role};
pub use telemetry::{TelemetryObserver, TelemetryRecord};
pub use resource::{
    BudgetCaps, BudgetStats, NodeHandle, QualityMode, ReleaseError, Releaser, ResourceKind,
    TrackedResource,
};
