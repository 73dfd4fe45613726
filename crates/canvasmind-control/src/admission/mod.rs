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

//! The two-stage admission gate in front of the scene-mutation bus.
//!
//! Every action runs through the [`PolicyPass`] and then the [`BudgetPass`].
//! Only an action approved by both is published on the [`SceneBus`], exactly
//! once. Every decision, approved or not, is appended to the pipeline's
//! result log in input order.

mod budget;
mod policy;

pub use self::budget::BudgetPass;
pub use self::policy::PolicyPass;

use canvasmind_core::{
    AccessControlTable, BudgetCaps, CompiledAction, Role, SceneBus, TelemetryObserver,
    TelemetryRecord,
};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// A budgeted quantity an action may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BudgetQuantity {
    /// Triangle count.
    Triangles,
    /// Texture memory, in megabytes.
    TextureMemory,
}

impl BudgetQuantity {
    /// Wire name of the declared field.
    pub fn field(self) -> &'static str {
        match self {
            BudgetQuantity::Triangles => "tris",
            BudgetQuantity::TextureMemory => "texMemMB",
        }
    }

    fn phrase(self) -> &'static str {
        match self {
            BudgetQuantity::Triangles => "Triangles exceed",
            BudgetQuantity::TextureMemory => "Texture mem exceeds",
        }
    }

    fn unit(self) -> &'static str {
        match self {
            BudgetQuantity::Triangles => "",
            BudgetQuantity::TextureMemory => "MB",
        }
    }
}

impl fmt::Display for BudgetQuantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.field())
    }
}

/// Why an action was not admitted. Always per-action and non-fatal.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AdmissionError {
    /// The target's access-control entry does not grant the operation.
    #[error("Policy denied: {op} on {target}")]
    PolicyDenied {
        /// Operation name of the action.
        op: String,
        /// Target object id.
        target: String,
    },
    /// A declared cost exceeds its cap.
    #[error(
        "{} budget ({value}{unit} > {limit}{unit})",
        .quantity.phrase(),
        unit = .quantity.unit()
    )]
    BudgetExceeded {
        /// The exceeded quantity.
        quantity: BudgetQuantity,
        /// The declared cost.
        value: f64,
        /// The cap in force.
        limit: f64,
    },
}

/// Everything a pass may consult besides the action itself.
#[derive(Debug, Clone, Copy)]
pub struct AdmissionContext<'a> {
    /// Per-object access control.
    pub acl: &'a AccessControlTable,
    /// The caps in force at the time of admission.
    pub caps: BudgetCaps,
    /// Role the action is evaluated as.
    pub role: Role,
}

impl<'a> AdmissionContext<'a> {
    /// Context for actions issued by the assistant.
    pub fn for_ai(acl: &'a AccessControlTable, caps: BudgetCaps) -> Self {
        Self {
            acl,
            caps,
            role: Role::Ai,
        }
    }
}

/// One stage of the admission gate.
pub trait AdmissionPass: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Approves or rejects an action.
    fn check(&self, action: &CompiledAction, ctx: &AdmissionContext<'_>)
        -> Result<(), AdmissionError>;
}

/// Outcome of a single admission.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdmissionOutcome {
    /// Whether both passes approved.
    pub allowed: bool,
    /// Human-readable rejection reason.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl From<&Result<(), AdmissionError>> for AdmissionOutcome {
    fn from(result: &Result<(), AdmissionError>) -> Self {
        match result {
            Ok(()) => Self {
                allowed: true,
                reason: None,
            },
            Err(e) => Self {
                allowed: false,
                reason: Some(e.to_string()),
            },
        }
    }
}

/// One entry of the result log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdmissionRecord {
    /// The action as submitted.
    pub action: CompiledAction,
    /// The decision.
    #[serde(flatten)]
    pub outcome: AdmissionOutcome,
}

/// Policy pass, then budget pass, then the bus.
pub struct AdmissionPipeline {
    passes: Vec<Box<dyn AdmissionPass>>,
    bus: Arc<SceneBus>,
    observer: Option<Arc<dyn TelemetryObserver>>,
    log: Vec<AdmissionRecord>,
}

impl fmt::Debug for AdmissionPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdmissionPipeline")
            .field("passes", &self.passes.iter().map(|p| p.name()).collect::<Vec<_>>())
            .field("log", &self.log.len())
            .finish_non_exhaustive()
    }
}

impl AdmissionPipeline {
    /// Creates the standard two-pass pipeline publishing on `bus`.
    pub fn new(bus: Arc<SceneBus>) -> Self {
        Self {
            passes: vec![Box::new(PolicyPass), Box::new(BudgetPass)],
            bus,
            observer: None,
            log: Vec::new(),
        }
    }

    /// Reports every decision to `observer`.
    pub fn with_observer(mut self, observer: Arc<dyn TelemetryObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// The bus approved actions are published on.
    pub fn bus(&self) -> &Arc<SceneBus> {
        &self.bus
    }

    /// Runs one action through the passes.
    ///
    /// The first rejecting pass decides; later passes are skipped. An
    /// approved action is published before this returns.
    pub fn admit(
        &mut self,
        action: CompiledAction,
        ctx: &AdmissionContext<'_>,
    ) -> AdmissionOutcome {
        let result = self
            .passes
            .iter()
            .try_for_each(|pass| pass.check(&action, ctx));

        match &result {
            Ok(()) => {
                let delivered = self.bus.publish(&action);
                log::debug!("Admitted '{}' ({delivered} subscribers)", action.op());
            }
            Err(e) => log::info!("Rejected '{}': {e}", action.op()),
        }

        let outcome = AdmissionOutcome::from(&result);
        if let Some(observer) = &self.observer {
            if let Err(AdmissionError::BudgetExceeded {
                quantity,
                value,
                limit,
            }) = &result
            {
                observer.observe(TelemetryRecord::BudgetViolation {
                    kind: quantity.field().to_string(),
                    value: *value,
                    cap: *limit,
                });
            }
            observer.observe(TelemetryRecord::AdmissionDecision {
                op: action.op().to_string(),
                allowed: outcome.allowed,
                reason: outcome.reason.clone(),
            });
        }

        self.log.push(AdmissionRecord {
            action,
            outcome: outcome.clone(),
        });
        outcome
    }

    /// Admits a batch in order.
    ///
    /// ## Returns
    /// One record per input action, in input order. The same records are
    /// appended to the result log.
    pub fn admit_all(
        &mut self,
        actions: impl IntoIterator<Item = CompiledAction>,
        ctx: &AdmissionContext<'_>,
    ) -> Vec<AdmissionRecord> {
        let start = self.log.len();
        for action in actions {
            self.admit(action, ctx);
        }
        self.log[start..].to_vec()
    }

    /// Every decision so far, in admission order.
    pub fn log(&self) -> &[AdmissionRecord] {
        &self.log
    }

    /// Takes the result log, leaving it empty.
    pub fn take_log(&mut self) -> Vec<AdmissionRecord> {
        std::mem::take(&mut self.log)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use canvasmind_core::{AccessControlEntry, ActionKind};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<TelemetryRecord>>);

    impl TelemetryObserver for Recorder {
        fn observe(&self, record: TelemetryRecord) {
            self.0.lock().unwrap().push(record);
        }
    }

    fn lighting() -> CompiledAction {
        CompiledAction::new(ActionKind::LightingSet { sun_angle: 30.0 })
    }

    fn transform(target: &str) -> CompiledAction {
        CompiledAction::new(ActionKind::Transform {
            translation: [0.0, 1.0, 0.0],
        })
        .with_target(target)
    }

    #[test]
    fn test_admitted_action_is_published_once() {
        let bus = Arc::new(SceneBus::new());
        let rx = bus.subscribe("lighting.set");
        let mut pipeline = AdmissionPipeline::new(bus.clone());
        let acl = AccessControlTable::new();

        let ctx = AdmissionContext::for_ai(&acl, BudgetCaps::default());
        let outcome = pipeline.admit(lighting(), &ctx);

        assert!(outcome.allowed);
        assert_eq!(rx.try_iter().count(), 1);
        assert_eq!(bus.publish_count(), 1);
    }

    #[test]
    fn test_texture_budget_rejection_never_reaches_bus() {
        let bus = Arc::new(SceneBus::new());
        let rx = bus.subscribe("skybox.generate");
        let mut pipeline = AdmissionPipeline::new(bus.clone());
        let acl = AccessControlTable::new();
        let caps = BudgetCaps::new(128.0, 1_500_000, 120);
        let action = CompiledAction::new(ActionKind::SkyboxGenerate {
            prompt: "nebula".into(),
            seed: 42,
            resolution: 2048,
        })
        .with_tex_mem_mb(300.0);

        let outcome = pipeline.admit(action, &AdmissionContext::for_ai(&acl, caps));

        assert!(!outcome.allowed);
        let reason = outcome.reason.unwrap();
        assert!(reason.contains("300"), "{reason}");
        assert!(reason.contains("128"), "{reason}");
        assert_eq!(bus.publish_count(), 0);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_policy_runs_before_budget() {
        let bus = Arc::new(SceneBus::new());
        let mut pipeline = AdmissionPipeline::new(bus);
        let mut acl = AccessControlTable::new();
        acl.insert("statue", AccessControlEntry::new().restrict(Role::Ai));
        let action = transform("statue").with_tris(10_000_000);

        let ctx = AdmissionContext::for_ai(&acl, BudgetCaps::default());
        let outcome = pipeline.admit(action, &ctx);

        assert_eq!(outcome.reason.as_deref(), Some("Policy denied: transform on statue"));
    }

    #[test]
    fn test_batch_log_preserves_order() {
        let bus = Arc::new(SceneBus::new());
        let mut pipeline = AdmissionPipeline::new(bus.clone());
        let mut acl = AccessControlTable::new();
        acl.insert("locked", AccessControlEntry::new().restrict(Role::Ai));
        let caps = BudgetCaps::new(512.0, 1_000, 120);
        let batch = vec![
            lighting(),
            transform("locked"),
            lighting().with_tris(5_000),
            transform("free"),
        ];

        let records = pipeline.admit_all(batch, &AdmissionContext::for_ai(&acl, caps));

        let allowed: Vec<bool> = records.iter().map(|r| r.outcome.allowed).collect();
        assert_eq!(allowed, vec![true, false, false, true]);
        assert_eq!(
            records[2].outcome.reason.as_deref(),
            Some("Triangles exceed budget (5000 > 1000)")
        );
        assert_eq!(pipeline.log().len(), 4);
        assert_eq!(bus.publish_count(), 2);
    }

    #[test]
    fn test_observer_sees_every_decision() {
        let recorder = Arc::new(Recorder::default());
        let mut pipeline =
            AdmissionPipeline::new(Arc::new(SceneBus::new())).with_observer(recorder.clone());
        let acl = AccessControlTable::new();
        let caps = BudgetCaps::new(64.0, 1_000, 10);

        pipeline.admit(lighting(), &AdmissionContext::for_ai(&acl, caps));
        pipeline.admit(lighting().with_tex_mem_mb(65.0), &AdmissionContext::for_ai(&acl, caps));

        let records = recorder.0.lock().unwrap();
        let types: Vec<&str> = records.iter().map(|r| r.type_name()).collect();
        assert_eq!(
            types,
            vec!["admission_decision", "budget_violation", "admission_decision"]
        );
    }

    #[test]
    fn test_record_serializes_flat_outcome() {
        let mut pipeline = AdmissionPipeline::new(Arc::new(SceneBus::new()));
        let acl = AccessControlTable::new();
        pipeline.admit(lighting(), &AdmissionContext::for_ai(&acl, BudgetCaps::default()));

        let json = serde_json::to_value(&pipeline.take_log()[0]).unwrap();
        assert_eq!(json["allowed"], true);
        assert_eq!(json["action"]["op"], "lighting.set");
        assert!(json.get("reason").is_none());
        assert!(pipeline.log().is_empty());
    }
}
