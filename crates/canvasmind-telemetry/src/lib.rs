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

//! Fire-and-forget telemetry for the admission pipeline, plus the logging
//! setup shared by every binary.

#![warn(missing_docs)]

pub mod emitter;
pub mod sink;

pub use emitter::{DeliveryCallback, TelemetryConfig, TelemetryEmitter};
pub use sink::{JsonLinesSink, MemorySink, NullSink, TelemetrySink};

/// Initializes the global logger from `RUST_LOG`, falling back to
/// `default_filter`.
///
/// Returns `false` if a logger was already installed.
pub fn init_logging(default_filter: &str) -> bool {
    use env_logger::{Builder, Env};

    Builder::from_env(Env::default().default_filter_or(default_filter))
        .format_timestamp_millis()
        .try_init()
        .is_ok()
}
