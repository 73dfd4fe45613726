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

use canvasmind_agents::{MockAssetFetcher, Planner, PlannerConfig, ServerRegistry};
use canvasmind_control::{PlannerStats, StatKey};
use canvasmind_core::FetchError;
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

fn setup() -> (Planner, ServerRegistry) {
    let stats = Arc::new(Mutex::new(PlannerStats::new()));
    (Planner::new(PlannerConfig::default(), stats), ServerRegistry::mock())
}

#[tokio::test]
async fn test_transient_failures_are_retried_with_linear_backoff() {
    tokio::time::pause();

    // --- ARRANGE ---
    let (planner, registry) = setup();
    let fetcher = MockAssetFetcher::new().failing_first(2);
    let server = registry.get("mesh-boulder").unwrap();
    let started = Instant::now();

    // --- ACT ---
    let out = planner
        .fetch(&fetcher, server, "generate_mesh", json!({ "seed": 9 }))
        .await
        .unwrap();

    // --- ASSERT ---
    assert_eq!(out.provenance.seed, 9);
    assert_eq!(fetcher.calls(), 3);
    // 200 ms after the first failure, 400 ms after the second.
    assert!(started.elapsed() >= Duration::from_millis(600));

    let stats = planner.stats();
    let stat = stats.get(&StatKey::new("mesh-boulder", "generate_mesh")).unwrap();
    assert_eq!(stat.samples, 3);
    assert_eq!(stat.failures, 2);
    assert_eq!(stat.tris_avg, Some(20_000.0));
}

#[tokio::test]
async fn test_exhausted_retries_surface_last_error() {
    tokio::time::pause();

    // --- ARRANGE ---
    let (planner, registry) = setup();
    let fetcher = MockAssetFetcher::new().failing_first(10);
    let server = registry.get("nebula-skybox").unwrap();

    // --- ACT ---
    let result = planner
        .fetch(&fetcher, server, "generate_skybox", json!({ "prompt": "nebula" }))
        .await;

    // --- ASSERT ---
    assert!(matches!(result, Err(FetchError::Network(_))));
    assert_eq!(fetcher.calls(), 3);
    let stats = planner.stats();
    assert_eq!(
        stats
            .get(&StatKey::new("nebula-skybox", "generate_skybox"))
            .unwrap()
            .successes,
        0
    );
}

#[tokio::test]
async fn test_zero_retries_makes_one_attempt() {
    tokio::time::pause();

    let config = PlannerConfig {
        retries: 0,
        ..Default::default()
    };
    let planner = Planner::new(config, Arc::default());
    let fetcher = MockAssetFetcher::new().failing_first(1);
    let registry = ServerRegistry::mock();

    let result = planner
        .fetch(&fetcher, registry.get("mesh-boulder").unwrap(), "generate_mesh", json!({}))
        .await;

    assert!(result.is_err());
    assert_eq!(fetcher.calls(), 1);
}

#[tokio::test]
async fn test_failing_server_loses_the_next_choice() {
    tokio::time::pause();

    // --- ARRANGE ---
    let (planner, mut registry) = setup();
    let mut backup = registry.get("mesh-boulder").unwrap().clone();
    backup.id = "mesh-backup".into();
    registry.register(backup);
    let broken = MockAssetFetcher::new().failing_first(100);
    let healthy = MockAssetFetcher::new();

    // --- ACT ---
    let primary = registry.get("mesh-boulder").unwrap();
    let _ = planner.fetch(&broken, primary, "generate_mesh", json!({})).await;
    let backup = registry.get("mesh-backup").unwrap();
    planner
        .fetch(&healthy, backup, "generate_mesh", json!({}))
        .await
        .unwrap();

    // --- ASSERT ---
    let chosen = planner
        .choose_server(&registry, "mesh", "generate_mesh", &Default::default())
        .unwrap();
    assert_eq!(chosen.id, "mesh-backup");
}

#[tokio::test]
async fn test_server_outside_allow_list_is_never_called() {
    // --- ARRANGE ---
    let config = PlannerConfig {
        allowed_endpoints: vec!["https://gen.example/".into()],
        ..Default::default()
    };
    let planner = Planner::new(config, Arc::new(Mutex::new(PlannerStats::new())));
    let registry = ServerRegistry::mock();
    let fetcher = MockAssetFetcher::new();
    let server = registry.get("mesh-boulder").unwrap();

    // --- ACT ---
    let result = planner
        .fetch(&fetcher, server, "generate_mesh", json!({ "seed": 1 }))
        .await;

    // --- ASSERT ---
    assert_eq!(result.unwrap_err(), FetchError::Blocked("/mcp/mesh".into()));
    assert_eq!(fetcher.calls(), 0);
    assert!(planner.stats().is_empty());
}

#[tokio::test]
async fn test_server_on_allow_list_is_called() {
    let config = PlannerConfig {
        allowed_endpoints: vec!["/mcp/".into()],
        ..Default::default()
    };
    let planner = Planner::new(config, Arc::new(Mutex::new(PlannerStats::new())));
    let registry = ServerRegistry::mock();
    let fetcher = MockAssetFetcher::new();

    let out = planner
        .fetch(&fetcher, registry.get("mesh-boulder").unwrap(), "generate_mesh", json!({}))
        .await
        .unwrap();

    assert_eq!(out.provenance.model, "mesh-mock-v1");
    assert_eq!(fetcher.calls(), 1);
}
