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

use super::{AdmissionContext, AdmissionError, AdmissionPass, BudgetQuantity};
use canvasmind_core::CompiledAction;

/// Rejects actions whose declared cost alone exceeds a cap.
///
/// Undeclared costs pass; the tracked set evicts regardless once the
/// resource is registered.
#[derive(Debug, Clone, Copy, Default)]
pub struct BudgetPass;

impl AdmissionPass for BudgetPass {
    fn name(&self) -> &'static str {
        "budget"
    }

    fn check(
        &self,
        action: &CompiledAction,
        ctx: &AdmissionContext<'_>,
    ) -> Result<(), AdmissionError> {
        if let Some(tris) = action.tris {
            if tris > ctx.caps.max_triangles {
                return Err(AdmissionError::BudgetExceeded {
                    quantity: BudgetQuantity::Triangles,
                    value: tris as f64,
                    limit: ctx.caps.max_triangles as f64,
                });
            }
        }
        if let Some(mb) = action.tex_mem_mb {
            if mb > ctx.caps.max_tex_mem_mb {
                return Err(AdmissionError::BudgetExceeded {
                    quantity: BudgetQuantity::TextureMemory,
                    value: mb,
                    limit: ctx.caps.max_tex_mem_mb,
                });
            }
        }
        Ok(())
    }
}
