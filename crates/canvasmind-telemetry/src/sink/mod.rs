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

//! Destinations for telemetry records.

mod json_lines;
mod memory;

pub use self::json_lines::JsonLinesSink;
pub use self::memory::MemorySink;

use canvasmind_core::TelemetryRecord;
use std::fmt::Debug;

/// Where the emitter's worker writes records.
pub trait TelemetrySink: Send + Sync + Debug + 'static {
    /// Persists one record.
    fn write(&self, record: &TelemetryRecord) -> anyhow::Result<()>;

    /// Pushes buffered records to their destination.
    fn flush(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Discards every record.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl TelemetrySink for NullSink {
    fn write(&self, _record: &TelemetryRecord) -> anyhow::Result<()> {
        Ok(())
    }
}
