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

//! # CanvasMind Agents
//!
//! The planner side of generation: which upstream server to call for a
//! given kind of asset, how to call it with bounded retries, and the
//! statistics that inform the next choice.

#![warn(missing_docs)]

pub mod guardrails;
pub mod mock;
pub mod planner;
pub mod registry;

pub use guardrails::{is_allowed_endpoint, sanitize_prompt, MAX_PROMPT_CHARS};
pub use mock::MockAssetFetcher;
pub use planner::{Planner, PlannerConfig};
pub use registry::{ServerEntry, ServerRegistry};
