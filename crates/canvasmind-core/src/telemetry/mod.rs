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

//! Record types observed by the telemetry emitter.

pub mod record;

pub use self::record::{CandidateInfo, CandidateRecord, TelemetryRecord};

/// Anything that accepts telemetry records.
///
/// Implementations must not block: recording is fire-and-forget and happens
/// on the admission hot path.
pub trait TelemetryObserver: Send + Sync {
    /// Hands a record over for best-effort delivery.
    fn observe(&self, record: TelemetryRecord);
}
