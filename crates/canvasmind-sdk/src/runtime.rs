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

//! The scene runtime.

use crate::config::RuntimeConfig;
use crate::error::RuntimeError;
use crate::objects::SceneObject;
use canvasmind_agents::{sanitize_prompt, MockAssetFetcher, Planner, ServerEntry, ServerRegistry};
use canvasmind_control::{
    AdmissionContext, AdmissionOutcome, AdmissionPipeline, AdmissionRecord, InstancingPool,
    PlannerStats, TrackedResourceSet,
};
use canvasmind_core::engine::detach_and_dispose;
use canvasmind_core::telemetry::CandidateInfo;
use canvasmind_core::{
    AccessControlTable, ActionKind, AssetFetcher, BudgetCaps, BudgetStats, CompiledAction,
    GeometryRef, HeadlessEngine, QualityMode, RenderEngine, ResourceKind, SceneBus,
    TelemetryObserver, TelemetryRecord, TrackedResource, Transform,
};
use canvasmind_telemetry::{NullSink, TelemetryEmitter, TelemetrySink};
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::task::JoinSet;

/// Seed of the first mesh request; later requests count up from it.
pub const MESH_SEED_BASE: u64 = 1337;

/// Seed of every skybox request.
pub const SKYBOX_SEED: u64 = 42;

/// Texture memory assumed for a skybox without a cost hint, in megabytes.
pub const DEFAULT_SKYBOX_MB: f64 = 32.0;

/// Triangles assumed for a mesh without a cost hint.
pub const DEFAULT_MESH_TRIANGLES: u64 = 20_000;

/// Memory estimate of an individually placed mesh.
fn mesh_mb_estimate(triangles: u64) -> f64 {
    (triangles as f64 / 2000.0).round().max(8.0)
}

/// Ranks a mesh candidate by the share of the triangle cap it leaves free.
fn candidate_score(triangles: u64, caps: &BudgetCaps) -> f64 {
    if caps.max_triangles == 0 {
        return 0.0;
    }
    1.0 - (triangles as f64 / caps.max_triangles as f64).min(1.0)
}

/// Index of the highest score; the first one wins ties.
fn best_candidate(scores: &[f64]) -> usize {
    let mut best = 0;
    for (i, score) in scores.iter().enumerate() {
        if *score > scores[best] {
            best = i;
        }
    }
    best
}

/// Deterministic placement on the ground plane within `[-2, 2]`.
fn placement(seed: u64) -> Transform {
    let mut h = seed.wrapping_mul(0x9E37_79B9_7F4A_7C15);
    h ^= h >> 29;
    let x = (h & 0xFFFF) as f32 / 65535.0 * 4.0 - 2.0;
    let z = ((h >> 16) & 0xFFFF) as f32 / 65535.0 * 4.0 - 2.0;
    Transform::from_translation(x, 0.0, z)
}

/// Result of one successful spawn.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpawnOutcome {
    /// Id of the tracked resource holding the mesh.
    pub id: String,
    /// Whether the mesh went into an instanced batch.
    pub instanced: bool,
    /// Generator seed.
    pub seed: u64,
}

/// Summary of a [`SceneRuntime::batch_spawn`] run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    /// Spawns asked for.
    pub requested: usize,
    /// Spawns actually started.
    pub issued: usize,
    /// Spawns that placed a mesh.
    pub spawned: usize,
    /// Of those, how many were instanced.
    pub instanced: usize,
    /// Spawns refused by backpressure or admission.
    pub refused: usize,
    /// Spawns whose generation failed.
    pub failed: usize,
    /// Largest number of spawns in flight at once.
    pub peak_in_flight: usize,
    /// Whether issuing stopped early because the node cap was reached.
    pub stopped_at_node_cap: bool,
}

/// Point-in-time report of the runtime.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeState {
    /// Registered scene objects.
    pub assets: usize,
    /// Draw calls reported by the engine.
    pub draw_calls: u64,
    /// Budget usage.
    pub budget: BudgetStats,
    /// Whether nodes or texture memory are above 90% of their caps.
    pub crowded: bool,
    /// Telemetry records dropped so far.
    pub telemetry_dropped: u64,
}

struct SceneState {
    budget: TrackedResourceSet,
    pool: InstancingPool,
    pipeline: AdmissionPipeline,
    acl: AccessControlTable,
    objects: BTreeMap<String, SceneObject>,
    mesh_requests: u64,
}

impl SceneState {
    fn admit(&mut self, action: CompiledAction) -> AdmissionOutcome {
        let ctx = AdmissionContext::for_ai(&self.acl, self.budget.caps());
        self.pipeline.admit(action, &ctx)
    }

    /// Tracks a resource and returns whether it survived its own eviction.
    fn track(&mut self, resource: TrackedResource) -> bool {
        let id = resource.id.clone();
        if self.budget.track(resource) > 0 {
            self.prune_objects();
        }
        self.budget.contains(&id)
    }

    fn register(&mut self, object: SceneObject) {
        self.acl.insert(object.id.clone(), object.access.clone());
        self.objects.insert(object.id.clone(), object);
    }

    /// Forgets objects whose resource is no longer tracked.
    fn prune_objects(&mut self) {
        let budget = &self.budget;
        let acl = &mut self.acl;
        self.objects.retain(|id, _| {
            let live = budget.contains(id);
            if !live {
                acl.remove(id);
            }
            live
        });
    }
}

fn rejected(op: &str, outcome: AdmissionOutcome) -> RuntimeError {
    RuntimeError::Rejected {
        op: op.to_string(),
        reason: outcome.reason.unwrap_or_default(),
    }
}

/// Owns the scene budget and everything that mutates it.
///
/// All mutation happens under one lock, held only between suspension
/// points: a request's admission, eviction and registration are atomic with
/// respect to every other request.
pub struct SceneRuntime {
    config: RuntimeConfig,
    engine: Arc<dyn RenderEngine>,
    fetcher: Arc<dyn AssetFetcher>,
    registry: ServerRegistry,
    planner: Planner,
    bus: Arc<SceneBus>,
    telemetry: Arc<TelemetryEmitter>,
    state: Mutex<SceneState>,
}

impl std::fmt::Debug for SceneRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SceneRuntime")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl SceneRuntime {
    /// Creates a runtime over the given collaborators.
    pub fn new(
        config: RuntimeConfig,
        engine: Arc<dyn RenderEngine>,
        fetcher: Arc<dyn AssetFetcher>,
        registry: ServerRegistry,
        sink: Arc<dyn TelemetrySink>,
    ) -> Self {
        let bus = Arc::new(SceneBus::new());
        let telemetry = Arc::new(TelemetryEmitter::new(config.telemetry.clone(), sink));
        let observer: Arc<dyn TelemetryObserver> = telemetry.clone();
        let pipeline = AdmissionPipeline::new(Arc::clone(&bus)).with_observer(observer);
        let planner = Planner::new(
            config.planner.clone(),
            Arc::new(Mutex::new(PlannerStats::new())),
        );

        log::info!(
            "SceneRuntime started ({} quality, {} servers)",
            config.quality,
            registry.len()
        );

        let state = SceneState {
            budget: TrackedResourceSet::new(config.initial_caps()),
            pool: InstancingPool::new(Arc::clone(&engine)),
            pipeline,
            acl: AccessControlTable::new(),
            objects: BTreeMap::new(),
            mesh_requests: 0,
        };

        Self {
            config,
            engine,
            fetcher,
            registry,
            planner,
            bus,
            telemetry,
            state: Mutex::new(state),
        }
    }

    /// A runtime with no GPU, mock generators and no telemetry output.
    pub fn headless(config: RuntimeConfig) -> Self {
        Self::new(
            config,
            Arc::new(HeadlessEngine::new()),
            Arc::new(MockAssetFetcher::new()),
            ServerRegistry::mock(),
            Arc::new(NullSink),
        )
    }

    fn lock(&self) -> MutexGuard<'_, SceneState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn choose(
        &self,
        tag: &str,
        endpoint: &str,
        caps: &BudgetCaps,
    ) -> Result<&ServerEntry, RuntimeError> {
        self.planner
            .choose_server(&self.registry, tag, endpoint, caps)
            .ok_or_else(|| RuntimeError::NoServer { tag: tag.to_string() })
    }

    fn snapshot(&self, stats: BudgetStats) {
        self.telemetry.emit(TelemetryRecord::ResourceSnapshot { stats });
    }

    /// Compiles a script and admits its actions in document order.
    ///
    /// ## Returns
    /// One record per compiled action. A syntax error admits nothing.
    pub fn apply_script(&self, src: &str) -> Result<Vec<AdmissionRecord>, RuntimeError> {
        let actions = canvasmind_compiler::compile(src)?;
        let mut state = self.lock();
        let SceneState {
            budget,
            pipeline,
            acl,
            ..
        } = &mut *state;
        let ctx = AdmissionContext::for_ai(acl, budget.caps());
        Ok(pipeline.admit_all(actions, &ctx))
    }

    /// Asks the assistant's permission to move an object.
    pub fn transform(&self, target: &str, translation: [f64; 3]) -> AdmissionOutcome {
        let action = CompiledAction::new(ActionKind::Transform { translation }).with_target(target);
        self.lock().admit(action)
    }

    /// Generates a skybox and makes it the scene environment, releasing the
    /// previous one.
    ///
    /// ## Returns
    /// The id of the tracked environment.
    pub async fn apply_skybox(&self, prompt: &str) -> Result<String, RuntimeError> {
        let caps = self.lock().budget.caps();
        let server = self.choose("skybox", "generate_skybox", &caps)?;
        let prompt = sanitize_prompt(prompt);
        let body = json!({
            "prompt": prompt,
            "seed": SKYBOX_SEED,
            "format": "equirect",
            "resolution": self.config.skybox_resolution,
        });
        let out = self
            .planner
            .fetch(self.fetcher.as_ref(), server, "generate_skybox", body)
            .await?;

        let est_mb = out.estimated_cost.tex_mem_mb.unwrap_or(DEFAULT_SKYBOX_MB);
        let seed = out.provenance.seed;
        let id = format!("skybox_{seed}");
        let action = CompiledAction::new(ActionKind::SkyboxGenerate {
            prompt: prompt.clone(),
            seed,
            resolution: self.config.skybox_resolution,
        })
        .with_tex_mem_mb(est_mb);

        let stats = {
            let mut state = self.lock();
            let outcome = state.admit(action);
            if !outcome.allowed {
                return Err(rejected("skybox.generate", outcome));
            }
            if state.budget.untrack_where(|r| r.kind == ResourceKind::Environment) {
                log::debug!("Released previous environment");
                state.prune_objects();
            }

            let node = self.engine.create_node(&out.asset);
            self.engine.add(node);
            let engine = Arc::clone(&self.engine);
            let live = state.track(TrackedResource::new(
                id.clone(),
                ResourceKind::Environment,
                est_mb,
                node,
                move || detach_and_dispose(engine.as_ref(), node),
            ));
            if live {
                state.register(SceneObject::generated(
                    &id,
                    ResourceKind::Environment,
                    node,
                    &["skybox"],
                    out.provenance.clone(),
                ));
            }
            state.budget.stats()
        };

        log::info!("Skybox applied ({} seed {seed})", out.provenance.model);
        self.telemetry.emit(TelemetryRecord::SkyboxApplied {
            model: out.provenance.model.clone(),
            seed,
            tex_mb: est_mb,
        });
        self.snapshot(stats);
        Ok(id)
    }

    /// Generates mesh candidates, places the best one, instanced when its
    /// geometry already has a batch with room.
    ///
    /// `mesh_candidates` candidates are requested with consecutive seeds and
    /// ranked by the share of the triangle cap they leave free; ties go to the
    /// lowest seed. Every candidate is reported to telemetry, only the placed
    /// one as chosen.
    ///
    /// Refused up front with [`RuntimeError::NodeCapReached`] when no node
    /// slot is free.
    pub async fn spawn_mesh(&self) -> Result<SpawnOutcome, RuntimeError> {
        let k = self.config.mesh_candidates.max(1);
        let (caps, first_seed) = {
            let mut state = self.lock();
            if state.budget.stats().node_cap_reached() {
                log::info!("Spawn refused (node cap reached).");
                return Err(RuntimeError::NodeCapReached);
            }
            let seed = MESH_SEED_BASE + state.mesh_requests;
            state.mesh_requests += k as u64;
            (state.budget.caps(), seed)
        };

        let server = self.choose("mesh", "generate_mesh", &caps)?;
        let prompt = sanitize_prompt(&self.config.mesh_prompt);
        let mut candidates = Vec::with_capacity(k);
        for seed in first_seed..first_seed + k as u64 {
            let body = json!({ "prompt": prompt, "seed": seed });
            let out = self
                .planner
                .fetch(self.fetcher.as_ref(), server, "generate_mesh", body)
                .await?;
            let tris = out.estimated_cost.tris.unwrap_or(DEFAULT_MESH_TRIANGLES);
            candidates.push((out, candidate_score(tris, &caps)));
        }
        let scores: Vec<f64> = candidates.iter().map(|(_, score)| *score).collect();
        let best = best_candidate(&scores);
        for (i, (candidate, score)) in candidates.iter().enumerate() {
            let mut extra = serde_json::Map::new();
            extra.insert("score".into(), json!(score));
            self.telemetry.log_candidate(
                candidate.provenance.prompt.clone().unwrap_or_default(),
                CandidateInfo {
                    kind: "mesh".into(),
                    model: candidate.provenance.model.clone(),
                    seed: candidate.provenance.seed,
                    extra,
                },
                i == best,
                0.0,
            );
        }
        let (out, score) = candidates.swap_remove(best);
        let seed = out.provenance.seed;

        let tris = out.estimated_cost.tris.unwrap_or(DEFAULT_MESH_TRIANGLES);
        let url = out.asset.url().to_string();
        let action = CompiledAction::new(ActionKind::Spawn {
            kind: "mesh".into(),
            count: 1,
            props: BTreeMap::new(),
        })
        .with_tris(tris);

        let (spawned, stats) = {
            let mut state = self.lock();
            let outcome = state.admit(action);
            if !outcome.allowed {
                return Err(rejected("spawn", outcome));
            }

            let mut instanced = false;
            if self.config.instance_capacity > 0 {
                let (_, created) = state.pool.get_or_create(
                    &url,
                    &GeometryRef(url.clone()),
                    tris,
                    self.config.instance_capacity,
                );
                if created {
                    if let Some(batch) = state.pool.tracked_resource(&url) {
                        state.track(batch);
                    }
                }
                instanced = state.pool.add_instance(&url, placement(seed));
            }

            let spawned = if instanced {
                SpawnOutcome {
                    id: format!("instanced_{url}"),
                    instanced: true,
                    seed,
                }
            } else {
                let node = self.engine.create_node(&out.asset);
                self.engine.add(node);
                let id = format!("mesh_{seed}");
                let engine = Arc::clone(&self.engine);
                let live = state.track(
                    TrackedResource::new(
                        id.clone(),
                        ResourceKind::Mesh,
                        mesh_mb_estimate(tris),
                        node,
                        move || detach_and_dispose(engine.as_ref(), node),
                    )
                    .with_triangles(tris),
                );
                if live {
                    state.register(SceneObject::generated(
                        &id,
                        ResourceKind::Mesh,
                        node,
                        &["mesh"],
                        out.provenance.clone(),
                    ));
                }
                SpawnOutcome {
                    id,
                    instanced: false,
                    seed,
                }
            };
            (spawned, state.budget.stats())
        };

        log::info!(
            "{} spawn (score={score:.3}) model={} seed={seed}",
            if spawned.instanced { "Instanced" } else { "Mesh" },
            out.provenance.model
        );
        self.telemetry.emit(TelemetryRecord::MeshSpawned {
            model: out.provenance.model,
            seed,
            tris,
            instanced: spawned.instanced,
        });
        self.snapshot(stats);
        Ok(spawned)
    }

    /// Spawns up to `count` meshes concurrently.
    ///
    /// The number of spawns in flight follows the pacing curve, where the
    /// tick is the number of spawns issued so far. Issuing stops once the
    /// node cap is reached. Spawns already in flight are then drained, so
    /// every issued task is joined and counted in the report.
    pub async fn batch_spawn(self: &Arc<Self>, count: usize) -> BatchReport {
        let mut report = BatchReport {
            requested: count,
            ..Default::default()
        };
        let mut tasks = JoinSet::new();

        loop {
            let limit = self
                .config
                .pacing
                .in_flight(report.issued as u64, self.config.max_in_flight);
            while tasks.len() < limit && report.issued < count && !report.stopped_at_node_cap {
                if self.lock().budget.stats().node_cap_reached() {
                    log::info!("Batch stopped at the node cap after {} spawns", report.issued);
                    report.stopped_at_node_cap = true;
                    break;
                }
                let runtime = Arc::clone(self);
                tasks.spawn(async move { runtime.spawn_mesh().await });
                report.issued += 1;
            }
            report.peak_in_flight = report.peak_in_flight.max(tasks.len());

            match tasks.join_next().await {
                Some(Ok(Ok(outcome))) => {
                    report.spawned += 1;
                    if outcome.instanced {
                        report.instanced += 1;
                    }
                }
                Some(Ok(Err(RuntimeError::NodeCapReached | RuntimeError::Rejected { .. }))) => {
                    report.refused += 1;
                }
                Some(Ok(Err(e))) => {
                    log::warn!("Spawn failed: {e}");
                    report.failed += 1;
                }
                Some(Err(e)) => {
                    log::error!("Spawn task aborted: {e}");
                    report.failed += 1;
                }
                None => break,
            }
        }

        log::info!(
            "Batch done: {}/{} spawned ({} instanced)",
            report.spawned,
            report.requested,
            report.instanced
        );
        report
    }

    /// Releases every resource and forgets every object.
    pub fn clear_scene(&self) {
        let stats = {
            let mut state = self.lock();
            state.pool.dispose_all();
            state.budget.clear_all();
            state.objects.clear();
            state.acl.clear();
            state.budget.stats()
        };
        log::info!("Scene cleared.");
        self.snapshot(stats);
    }

    /// Switches the caps to a quality preset and evicts down to them.
    ///
    /// Returns the number of evicted resources.
    pub fn set_quality(&self, mode: QualityMode) -> usize {
        let (evicted, stats) = {
            let mut state = self.lock();
            let evicted = state.budget.set_caps(mode.caps());
            state.prune_objects();
            (evicted, state.budget.stats())
        };
        log::info!("Quality set to {mode} ({evicted} evicted)");
        self.snapshot(stats);
        evicted
    }

    /// Current budget usage.
    pub fn budget_stats(&self) -> BudgetStats {
        self.lock().budget.stats()
    }

    /// A report of objects, draw calls and budget usage.
    pub fn state(&self) -> RuntimeState {
        let (assets, budget) = {
            let state = self.lock();
            (state.objects.len(), state.budget.stats())
        };
        RuntimeState {
            assets,
            draw_calls: self.engine.draw_calls(),
            budget,
            crowded: budget.is_crowded(),
            telemetry_dropped: self.telemetry.dropped_count(),
        }
    }

    /// Registered scene objects, ordered by id.
    pub fn objects(&self) -> Vec<SceneObject> {
        self.lock().objects.values().cloned().collect()
    }

    /// Subscribes to admitted actions of operation `op`.
    pub fn subscribe(&self, op: &str) -> flume::Receiver<CompiledAction> {
        self.bus.subscribe(op)
    }

    /// Every admission decision so far, in order.
    pub fn admission_log(&self) -> Vec<AdmissionRecord> {
        self.lock().pipeline.log().to_vec()
    }

    /// The planner and its statistics.
    pub fn planner(&self) -> &Planner {
        &self.planner
    }

    /// The telemetry emitter.
    pub fn telemetry(&self) -> &TelemetryEmitter {
        &self.telemetry
    }

    /// The configuration in force.
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mesh_estimate_floor() {
        assert_eq!(mesh_mb_estimate(20_000), 10.0);
        assert_eq!(mesh_mb_estimate(1_000), 8.0);
    }

    #[test]
    fn test_candidate_ranking() {
        let caps = BudgetCaps::new(512.0, 100_000, 120);
        assert_eq!(candidate_score(0, &caps), 1.0);
        assert_eq!(candidate_score(25_000, &caps), 0.75);
        assert_eq!(candidate_score(500_000, &caps), 0.0);

        assert_eq!(best_candidate(&[0.2, 0.9, 0.4]), 1);
        assert_eq!(best_candidate(&[0.5, 0.5, 0.5]), 0);
        assert_eq!(best_candidate(&[0.7]), 0);
    }

    #[test]
    fn test_placement_stays_on_ground_tile() {
        for seed in 0..200 {
            let [x, y, z] = placement(seed).translation();
            assert!((-2.0..=2.0).contains(&x));
            assert_eq!(y, 0.0);
            assert!((-2.0..=2.0).contains(&z));
        }
    }

    #[test]
    fn test_apply_script_records_every_action() {
        let runtime = SceneRuntime::headless(RuntimeConfig::default());
        let records = runtime
            .apply_script("scene { sky \"dusk\" lighting sun angle=20 }")
            .unwrap();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.outcome.allowed));
        assert_eq!(runtime.admission_log().len(), 2);
    }

    #[test]
    fn test_syntax_error_admits_nothing() {
        let runtime = SceneRuntime::headless(RuntimeConfig::default());
        let err = runtime.apply_script("scene { spawn }").unwrap_err();
        assert!(matches!(err, RuntimeError::Compile(_)));
        assert!(runtime.admission_log().is_empty());
    }
}
