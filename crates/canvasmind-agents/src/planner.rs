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

//! Server ranking and retried calls.

use crate::guardrails::is_allowed_endpoint;
use crate::registry::{ServerEntry, ServerRegistry};
use canvasmind_control::{PlannerStats, Sample, StatKey};
use canvasmind_core::{AssetFetcher, BudgetCaps, FetchError, FetchRequest, FetchResponse};
use serde::Deserialize;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;

/// Retry policy of the planner.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PlannerConfig {
    /// Extra attempts after the first one fails.
    pub retries: u32,
    /// Delay unit of the linear backoff, in milliseconds.
    pub backoff_step_ms: u64,
    /// URL prefixes servers must match to be called. Empty allows any.
    pub allowed_endpoints: Vec<String>,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            retries: 2,
            backoff_step_ms: 200,
            allowed_endpoints: Vec::new(),
        }
    }
}

impl PlannerConfig {
    /// Delay after failed attempt `attempt` (zero-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.backoff_step_ms.saturating_mul(u64::from(attempt) + 1))
    }
}

/// Chooses servers and calls them with bounded retries.
///
/// Every attempt is recorded into the shared [`PlannerStats`], which in turn
/// ranks servers for the next choice.
#[derive(Debug, Clone)]
pub struct Planner {
    config: PlannerConfig,
    stats: Arc<Mutex<PlannerStats>>,
}

impl Planner {
    /// Creates a planner over a shared statistics store.
    pub fn new(config: PlannerConfig, stats: Arc<Mutex<PlannerStats>>) -> Self {
        Self { config, stats }
    }

    /// The retry policy.
    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// The shared statistics store.
    pub fn stats(&self) -> MutexGuard<'_, PlannerStats> {
        self.stats.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// The best-scoring server carrying `tag` for `endpoint`.
    ///
    /// Ties go to the server registered first, so with no statistics the
    /// first matching server wins.
    pub fn choose_server<'a>(
        &self,
        registry: &'a ServerRegistry,
        tag: &str,
        endpoint: &str,
        soft_caps: &BudgetCaps,
    ) -> Option<&'a ServerEntry> {
        let stats = self.stats();
        let mut best: Option<(&ServerEntry, f64)> = None;
        for server in registry.iter().filter(|s| s.has_tag(tag)) {
            let score = stats.score(&StatKey::new(&server.id, endpoint), soft_caps);
            if best.map_or(true, |(_, top)| score > top) {
                best = Some((server, score));
            }
        }
        if let Some((server, score)) = best {
            log::debug!("Planner chose '{}' for {tag} (score {score:.3})", server.id);
        }
        best.map(|(server, _)| server)
    }

    /// Runs `call` up to `retries + 1` times, sleeping linearly longer after
    /// each failure. The last error is returned once attempts run out.
    pub async fn guarded_call<T, F, Fut>(&self, mut call: F) -> Result<T, FetchError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        let mut attempt = 0;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.config.retries => {
                    let delay = self.config.backoff(attempt);
                    log::warn!("Attempt {} failed: {e}; retrying in {delay:?}", attempt + 1);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    log::warn!("Giving up after {} attempts: {e}", attempt + 1);
                    return Err(e);
                }
            }
        }
    }

    /// Calls `endpoint` on `server` through [`guarded_call`](Self::guarded_call),
    /// recording every attempt.
    ///
    /// A server outside `allowed_endpoints` is never called and fails with
    /// [`FetchError::Blocked`].
    pub async fn fetch(
        &self,
        fetcher: &dyn AssetFetcher,
        server: &ServerEntry,
        endpoint: &str,
        body: serde_json::Value,
    ) -> Result<FetchResponse, FetchError> {
        let allowed = &self.config.allowed_endpoints;
        if !allowed.is_empty() && !is_allowed_endpoint(&server.server_url, allowed) {
            log::warn!("Refusing to call {} ({})", server.id, server.server_url);
            return Err(FetchError::Blocked(server.server_url.clone()));
        }
        let request = FetchRequest {
            server_url: server.server_url.clone(),
            endpoint: endpoint.to_string(),
            body,
        };
        let key = StatKey::new(&server.id, endpoint);
        log::info!("Calling {}/{endpoint}", server.id);

        let request = &request;
        let key = &key;
        self.guarded_call(move || async move {
            let started = Instant::now();
            let result = fetcher.fetch(request).await;
            let sample = Sample {
                ok: result.is_ok(),
                latency: started.elapsed(),
                tex_mem_mb: result.as_ref().ok().and_then(|r| r.estimated_cost.tex_mem_mb),
                tris: result.as_ref().ok().and_then(|r| r.estimated_cost.tris),
            };
            self.stats().record(key.clone(), sample);
            result
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn planner() -> Planner {
        Planner::new(PlannerConfig::default(), Arc::default())
    }

    #[test]
    fn test_backoff_is_linear() {
        let config = PlannerConfig::default();
        assert_eq!(config.backoff(0), Duration::from_millis(200));
        assert_eq!(config.backoff(1), Duration::from_millis(400));
    }

    #[test]
    fn test_choose_first_without_stats() {
        let mut registry = ServerRegistry::mock();
        let mut second = registry.get("mesh-boulder").unwrap().clone();
        second.id = "mesh-2".into();
        registry.register(second);

        let chosen = planner()
            .choose_server(&registry, "mesh", "generate_mesh", &BudgetCaps::default())
            .unwrap();
        assert_eq!(chosen.id, "mesh-boulder");
    }

    #[test]
    fn test_choose_prefers_reliable_server() {
        let mut registry = ServerRegistry::mock();
        let mut second = registry.get("mesh-boulder").unwrap().clone();
        second.id = "mesh-2".into();
        registry.register(second);
        let planner = planner();
        let sample = |ok| Sample {
            ok,
            latency: Duration::from_millis(900),
            tex_mem_mb: None,
            tris: None,
        };
        planner
            .stats()
            .record(StatKey::new("mesh-boulder", "generate_mesh"), sample(false));
        planner
            .stats()
            .record(StatKey::new("mesh-2", "generate_mesh"), sample(true));

        let chosen = planner
            .choose_server(&registry, "mesh", "generate_mesh", &BudgetCaps::default())
            .unwrap();
        assert_eq!(chosen.id, "mesh-2");
    }

    #[test]
    fn test_chosen_server_outlives_the_tag() {
        let registry = ServerRegistry::mock();
        let planner = planner();

        let chosen = {
            let tag = String::from("skybox");
            planner.choose_server(&registry, &tag, "generate_skybox", &BudgetCaps::default())
        };

        assert_eq!(chosen.map(|s| s.id.as_str()), Some("nebula-skybox"));
    }

    #[test]
    fn test_choose_none_for_unknown_tag() {
        let registry = ServerRegistry::mock();
        assert!(planner()
            .choose_server(&registry, "audio", "generate_audio", &BudgetCaps::default())
            .is_none());
    }

    #[test]
    fn test_config_from_json() {
        let config: PlannerConfig = serde_json::from_str(r#"{"retries": 5}"#).unwrap();
        assert_eq!(config.retries, 5);
        assert_eq!(config.backoff_step_ms, 200);
    }
}
