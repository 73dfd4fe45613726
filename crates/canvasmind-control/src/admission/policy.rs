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

use super::{AdmissionContext, AdmissionError, AdmissionPass};
use canvasmind_core::CompiledAction;

/// Object-level access control.
///
/// An action without a target, or whose target has no entry, passes.
#[derive(Debug, Clone, Copy, Default)]
pub struct PolicyPass;

impl AdmissionPass for PolicyPass {
    fn name(&self) -> &'static str {
        "policy"
    }

    fn check(
        &self,
        action: &CompiledAction,
        ctx: &AdmissionContext<'_>,
    ) -> Result<(), AdmissionError> {
        let Some(target) = action.target_id.as_deref() else {
            return Ok(());
        };
        if ctx.acl.permits(target, ctx.role, action.op()) {
            Ok(())
        } else {
            Err(AdmissionError::PolicyDenied {
                op: action.op().to_string(),
                target: target.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use canvasmind_core::{AccessControlEntry, AccessControlTable, ActionKind, BudgetCaps, Role};

    fn transform_on(target: &str) -> CompiledAction {
        CompiledAction::new(ActionKind::Transform {
            translation: [1.0, 0.0, 0.0],
        })
        .with_target(target)
    }

    #[test]
    fn test_missing_entry_allows() {
        let acl = AccessControlTable::new();
        let ctx = AdmissionContext::for_ai(&acl, BudgetCaps::default());
        assert!(PolicyPass.check(&transform_on("anything"), &ctx).is_ok());
    }

    #[test]
    fn test_entry_without_grant_denies_ai() {
        let mut acl = AccessControlTable::new();
        acl.insert("statue", AccessControlEntry::new().allow(Role::Ai, "lighting.set"));
        let ctx = AdmissionContext::for_ai(&acl, BudgetCaps::default());

        let err = PolicyPass.check(&transform_on("statue"), &ctx).unwrap_err();
        assert_eq!(
            err,
            AdmissionError::PolicyDenied {
                op: "transform".into(),
                target: "statue".into()
            }
        );
    }

    #[test]
    fn test_entry_without_ai_list_allows_ai() {
        let mut acl = AccessControlTable::new();
        acl.insert("statue", AccessControlEntry::new().allow(Role::User, "all"));
        let ctx = AdmissionContext::for_ai(&acl, BudgetCaps::default());

        assert!(PolicyPass.check(&transform_on("statue"), &ctx).is_ok());
    }

    #[test]
    fn test_empty_ai_list_denies_ai() {
        let mut acl = AccessControlTable::new();
        acl.insert("statue", AccessControlEntry::new().restrict(Role::Ai));
        let ctx = AdmissionContext::for_ai(&acl, BudgetCaps::default());

        assert!(PolicyPass.check(&transform_on("statue"), &ctx).is_err());
    }

    #[test]
    fn test_wildcard_and_exact_grants() {
        let mut acl = AccessControlTable::new();
        acl.insert("a", AccessControlEntry::new().allow(Role::Ai, "all"));
        acl.insert("b", AccessControlEntry::generated_content());
        let ctx = AdmissionContext::for_ai(&acl, BudgetCaps::default());

        assert!(PolicyPass.check(&transform_on("a"), &ctx).is_ok());
        assert!(PolicyPass.check(&transform_on("b"), &ctx).is_ok());
    }

    #[test]
    fn test_user_role_is_not_restricted() {
        let mut acl = AccessControlTable::new();
        acl.insert("statue", AccessControlEntry::new().restrict(Role::Ai));
        let ctx = AdmissionContext {
            acl: &acl,
            caps: BudgetCaps::default(),
            role: Role::User,
        };
        assert!(PolicyPass.check(&transform_on("statue"), &ctx).is_ok());
    }

    #[test]
    fn test_untargeted_action_passes() {
        let mut acl = AccessControlTable::new();
        acl.insert("statue", AccessControlEntry::new().restrict(Role::Ai));
        let ctx = AdmissionContext::for_ai(&acl, BudgetCaps::default());
        let action = CompiledAction::new(ActionKind::LightingSet { sun_angle: 10.0 });
        assert!(PolicyPass.check(&action, &ctx).is_ok());
    }
}
