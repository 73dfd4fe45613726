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

//! Deterministic pacing for batch issuance.
//!
//! A cosine curve with warm restarts: each cycle starts at 1.0 and decays
//! towards a floor, and each new cycle is `growth` times longer than the
//! previous one. Callers multiply their concurrency limit by the curve.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Throttle multiplier at `tick`, in `[floor, 1]`.
///
/// - `base_cycle_length <= 0` disables pacing and always yields `1.0`.
/// - A negative or non-finite `tick` is treated as `0`.
/// - A `cycle_growth_factor` below `1` is treated as `1`.
/// - `floor` is clamped to `[0, 1]`.
pub fn cosine_warm_restarts(
    tick: f64,
    base_cycle_length: f64,
    cycle_growth_factor: f64,
    floor: f64,
) -> f64 {
    if !base_cycle_length.is_finite() || base_cycle_length <= 0.0 {
        return 1.0;
    }
    let growth = if cycle_growth_factor.is_finite() {
        cycle_growth_factor.max(1.0)
    } else {
        1.0
    };
    let floor = if floor.is_nan() { 0.0 } else { floor.clamp(0.0, 1.0) };
    let mut t = if tick.is_finite() { tick.max(0.0) } else { 0.0 };

    let mut cycle = base_cycle_length;
    if growth == 1.0 {
        t %= cycle;
    } else {
        while t >= cycle {
            t -= cycle;
            cycle = (cycle * growth).max(base_cycle_length);
        }
    }

    let x = t / cycle;
    floor + (1.0 - floor) * 0.5 * (1.0 + (PI * x).cos())
}

/// Linearly maps a multiplier in `[0, 1]` onto `[min, max]`.
pub fn scale_to_range(multiplier: f64, min: f64, max: f64) -> f64 {
    min + (max - min) * multiplier
}

/// Number of requests allowed in flight for a pacing multiplier.
///
/// Always at least one, so a paced batch can make progress.
pub fn in_flight_limit(max_in_flight: usize, multiplier: f64) -> usize {
    let scaled = (max_in_flight as f64 * multiplier).ceil();
    if scaled.is_finite() && scaled > 1.0 {
        scaled as usize
    } else {
        1
    }
}

/// A configured pacing curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PacingSchedule {
    /// Length of the first cycle, in ticks.
    pub base_cycle_length: f64,
    /// Growth of each subsequent cycle.
    pub cycle_growth_factor: f64,
    /// Lowest multiplier the curve reaches.
    pub floor: f64,
}

impl Default for PacingSchedule {
    fn default() -> Self {
        Self {
            base_cycle_length: 8.0,
            cycle_growth_factor: 2.0,
            floor: 0.25,
        }
    }
}

impl PacingSchedule {
    /// A schedule that never throttles.
    pub const UNPACED: Self = Self {
        base_cycle_length: 0.0,
        cycle_growth_factor: 1.0,
        floor: 1.0,
    };

    /// Multiplier at `tick`.
    pub fn multiplier(&self, tick: u64) -> f64 {
        cosine_warm_restarts(
            tick as f64,
            self.base_cycle_length,
            self.cycle_growth_factor,
            self.floor,
        )
    }

    /// Concurrency allowed at `tick` for a nominal `max_in_flight`.
    pub fn in_flight(&self, tick: u64, max_in_flight: usize) -> usize {
        in_flight_limit(max_in_flight, self.multiplier(tick))
    }
}
