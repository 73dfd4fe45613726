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

//! # CanvasMind Control
//!
//! The resource budget and action-admission pipeline:
//!
//! - [`TrackedResourceSet`]: live resources, running totals, and FIFO
//!   eviction across texture memory, triangles and live nodes.
//! - [`InstancingPool`]: batches repeated geometry under a per-key limit.
//! - [`AdmissionPipeline`]: policy pass, then budget pass, then publication
//!   on the scene bus.
//! - [`pacing`]: the deterministic throttle curve for batch issuance.
//! - [`PlannerStats`]: rolling quality statistics of upstream generators.

#![warn(missing_docs)]

pub mod admission;
pub mod budget;
pub mod instancing;
pub mod pacing;
pub mod planner_stats;

pub use admission::{
    AdmissionContext, AdmissionError, AdmissionOutcome, AdmissionPass, AdmissionPipeline,
    AdmissionRecord, BudgetPass, BudgetQuantity, PolicyPass,
};
pub use budget::TrackedResourceSet;
pub use instancing::{InstancingPool, PoolEntry};
pub use pacing::{cosine_warm_restarts, in_flight_limit, scale_to_range, PacingSchedule};
pub use planner_stats::{PlannerStat, PlannerStats, Sample, StatKey};
