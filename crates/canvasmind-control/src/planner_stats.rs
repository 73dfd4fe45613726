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

//! Rolling statistics about upstream generation endpoints.

use canvasmind_core::BudgetCaps;
use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, SystemTime};

/// Weight of a new sample in every moving average.
pub const EMA_ALPHA: f64 = 0.2;

/// Latency at which the latency bonus reaches zero, in milliseconds.
pub const LATENCY_CEILING_MS: f64 = 1500.0;

/// Identifies one endpoint of one generation server.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StatKey {
    /// Server id.
    pub server: String,
    /// Endpoint name.
    pub endpoint: String,
}

impl StatKey {
    /// Creates a key.
    pub fn new(server: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            endpoint: endpoint.into(),
        }
    }
}

impl fmt::Display for StatKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.server, self.endpoint)
    }
}

/// The observation of one call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// Whether the call succeeded.
    pub ok: bool,
    /// Wall-clock duration of the call.
    pub latency: Duration,
    /// Texture memory of the returned asset, if estimated.
    pub tex_mem_mb: Option<f64>,
    /// Triangles of the returned asset, if estimated.
    pub tris: Option<u64>,
}

/// Statistics of one endpoint.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlannerStat {
    /// Total calls observed.
    pub samples: u64,
    /// Successful calls.
    pub successes: u64,
    /// Failed calls.
    pub failures: u64,
    /// Moving average of success (1) and failure (0).
    pub success_rate: Option<f64>,
    /// Moving average latency, in milliseconds.
    pub latency_avg_ms: Option<f64>,
    /// Moving average texture memory, in megabytes.
    pub tex_mem_avg_mb: Option<f64>,
    /// Moving average triangle count.
    pub tris_avg: Option<f64>,
    /// When the last failure was observed.
    pub last_error_at: Option<SystemTime>,
}

fn ema(previous: Option<f64>, sample: f64) -> f64 {
    match previous {
        Some(avg) => avg * (1.0 - EMA_ALPHA) + sample * EMA_ALPHA,
        None => sample,
    }
}

impl PlannerStat {
    fn record(&mut self, sample: &Sample) {
        self.samples += 1;
        if sample.ok {
            self.successes += 1;
        } else {
            self.failures += 1;
            self.last_error_at = Some(SystemTime::now());
        }
        self.success_rate = Some(ema(self.success_rate, if sample.ok { 1.0 } else { 0.0 }));
        self.latency_avg_ms = Some(ema(self.latency_avg_ms, sample.latency.as_secs_f64() * 1000.0));
        if let Some(mb) = sample.tex_mem_mb {
            self.tex_mem_avg_mb = Some(ema(self.tex_mem_avg_mb, mb));
        }
        if let Some(tris) = sample.tris {
            self.tris_avg = Some(ema(self.tris_avg, tris as f64));
        }
    }

    /// Desirability of the endpoint under the given soft caps. Higher is better.
    ///
    /// `1 + 2 * success + latency bonus - budget penalties`, where the
    /// latency bonus falls linearly from 1 at 0 ms to 0 at 1500 ms and each
    /// penalty is how far the average cost exceeds half its cap, as a
    /// fraction of the cap.
    pub fn score(&self, soft: &BudgetCaps) -> f64 {
        let success = self.success_rate.unwrap_or(0.0);
        let latency = self.latency_avg_ms.unwrap_or(1000.0);
        let latency_bonus = (1.0 - (latency / LATENCY_CEILING_MS).min(1.0)).max(0.0);

        let penalty = |avg: Option<f64>, cap: f64| match avg {
            Some(avg) if cap > 0.0 => (avg / cap - 0.5).max(0.0),
            _ => 0.0,
        };
        let tex_penalty = penalty(self.tex_mem_avg_mb, soft.max_tex_mem_mb);
        let tris_penalty = penalty(self.tris_avg, soft.max_triangles as f64);

        1.0 + 2.0 * success + latency_bonus - tex_penalty - tris_penalty
    }
}

/// Process-scoped statistics for every endpoint the planner has called.
///
/// Never reset implicitly; owned by whoever drives the planner.
#[derive(Debug, Default)]
pub struct PlannerStats {
    stats: HashMap<StatKey, PlannerStat>,
}

impl PlannerStats {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one observation into the statistics of `key`.
    pub fn record(&mut self, key: StatKey, sample: Sample) {
        log::trace!("Planner sample for {key}: {sample:?}");
        self.stats.entry(key).or_default().record(&sample);
    }

    /// Statistics of `key`, if any call was observed.
    pub fn get(&self, key: &StatKey) -> Option<&PlannerStat> {
        self.stats.get(key)
    }

    /// Score of `key`; endpoints never called score a neutral 1.
    pub fn score(&self, key: &StatKey, soft: &BudgetCaps) -> f64 {
        self.stats.get(key).map_or(1.0, |s| s.score(soft))
    }

    /// Number of endpoints with statistics.
    pub fn len(&self) -> usize {
        self.stats.len()
    }

    /// Returns `true` if nothing was recorded yet.
    pub fn is_empty(&self) -> bool {
        self.stats.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sample(ok: bool, ms: u64) -> Sample {
        Sample {
            ok,
            latency: Duration::from_millis(ms),
            tex_mem_mb: None,
            tris: None,
        }
    }

    #[test]
    fn test_unknown_endpoint_scores_neutral() {
        let stats = PlannerStats::new();
        assert_eq!(stats.score(&StatKey::new("a", "b"), &BudgetCaps::default()), 1.0);
    }

    #[test]
    fn test_first_sample_seeds_averages() {
        let mut stats = PlannerStats::new();
        let key = StatKey::new("nebula-skybox", "generate_skybox");
        stats.record(key.clone(), sample(true, 300));

        let stat = stats.get(&key).unwrap();
        assert_eq!(stat.samples, 1);
        assert_eq!(stat.success_rate, Some(1.0));
        assert_relative_eq!(stat.latency_avg_ms.unwrap(), 300.0);
        assert!(stat.last_error_at.is_none());
    }

    #[test]
    fn test_moving_average_weights() {
        let mut stats = PlannerStats::new();
        let key = StatKey::new("s", "e");
        stats.record(key.clone(), sample(true, 100));
        stats.record(key.clone(), sample(false, 600));

        let stat = stats.get(&key).unwrap();
        assert_relative_eq!(stat.latency_avg_ms.unwrap(), 200.0, epsilon = 1e-9);
        assert_relative_eq!(stat.success_rate.unwrap(), 0.8, epsilon = 1e-12);
        assert_eq!(stat.failures, 1);
        assert!(stat.last_error_at.is_some());
    }

    #[test]
    fn test_score_formula() {
        let mut stats = PlannerStats::new();
        let key = StatKey::new("s", "e");
        stats.record(
            key.clone(),
            Sample {
                ok: true,
                latency: Duration::from_millis(750),
                tex_mem_mb: Some(192.0),
                tris: None,
            },
        );
        let soft = BudgetCaps::new(256.0, 800_000, 80);

        // 1 + 2 + 0.5 - (0.75 - 0.5)
        assert_relative_eq!(stats.score(&key, &soft), 3.25, epsilon = 1e-9);
    }

    #[test]
    fn test_reliable_endpoint_outscores_failing_one() {
        let mut stats = PlannerStats::new();
        let good = StatKey::new("good", "e");
        let bad = StatKey::new("bad", "e");
        for _ in 0..5 {
            stats.record(good.clone(), sample(true, 400));
            stats.record(bad.clone(), sample(false, 400));
        }
        let caps = BudgetCaps::default();
        assert!(stats.score(&good, &caps) > stats.score(&bad, &caps));
        assert!(stats.score(&bad, &caps) < 1.0 + 1.0);
    }
}
