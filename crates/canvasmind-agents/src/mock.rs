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

//! A deterministic stand-in for the generation servers.

use async_trait::async_trait;
use canvasmind_core::{
    AssetDescriptor, AssetFetcher, CostEstimate, FetchError, FetchRequest, FetchResponse,
    Provenance,
};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Texture memory reported for every mock skybox, in megabytes.
pub const MOCK_SKYBOX_MB: f64 = 32.0;

/// Triangles reported for every mock mesh.
pub const MOCK_MESH_TRIANGLES: u64 = 20_000;

/// Serves `generate_skybox` and `generate_mesh` without any network.
///
/// Optionally fails its first calls and waits before answering, which is
/// all the planner's retry logic needs to be exercised.
#[derive(Debug, Default)]
pub struct MockAssetFetcher {
    latency: Duration,
    failures_left: AtomicU32,
    calls: AtomicU64,
}

impl MockAssetFetcher {
    /// A fetcher that answers immediately and never fails.
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits `latency` before every answer.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Fails the next `count` calls with a network error.
    pub fn failing_first(self, count: u32) -> Self {
        self.failures_left.store(count, Ordering::SeqCst);
        self
    }

    /// Number of calls received, failed ones included.
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[async_trait]
impl AssetFetcher for MockAssetFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(FetchError::Network(format!(
                "{} unreachable",
                request.server_url
            )));
        }

        let prompt = request
            .body
            .get("prompt")
            .and_then(|p| p.as_str())
            .map(str::to_string);
        let seed = request.body.get("seed").and_then(|s| s.as_u64());

        match request.endpoint.as_str() {
            "generate_skybox" => Ok(FetchResponse {
                asset: AssetDescriptor::TextureEquirect {
                    urls: vec![format!("{}/assets/nebula.jpg", request.server_url)],
                    mime: "image/jpeg".into(),
                },
                provenance: Provenance {
                    server: request.server_url.clone(),
                    model: "nebula-mock-v1".into(),
                    prompt,
                    seed: seed.unwrap_or(42),
                    timestamp: now_millis(),
                },
                estimated_cost: CostEstimate {
                    tex_mem_mb: Some(MOCK_SKYBOX_MB),
                    tris: None,
                },
            }),
            "generate_mesh" => Ok(FetchResponse {
                asset: AssetDescriptor::ModelGltf {
                    url: format!("{}/assets/boulder.gltf", request.server_url),
                },
                provenance: Provenance {
                    server: request.server_url.clone(),
                    model: "mesh-mock-v1".into(),
                    prompt,
                    seed: seed.unwrap_or(1337),
                    timestamp: now_millis(),
                },
                estimated_cost: CostEstimate {
                    tex_mem_mb: None,
                    tris: Some(MOCK_MESH_TRIANGLES),
                },
            }),
            other => Err(FetchError::UnknownEndpoint {
                server: request.server_url.clone(),
                endpoint: other.to_string(),
            }),
        }
    }
}
