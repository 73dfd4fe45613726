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

//! Lowering of the AST into normalized actions.

use crate::ast::AstNode;
use canvasmind_core::{ActionKind, CompiledAction};

/// Seed attached to every `sky` request.
pub const SKY_SEED: u64 = 42;

/// Resolution attached to every `sky` request.
pub const SKY_RESOLUTION: u32 = 2048;

/// Flattens `ast` into actions, preserving document order.
///
/// Scene blocks expand into their children; every other node becomes
/// exactly one action.
pub fn lower(ast: &[AstNode]) -> Vec<CompiledAction> {
    let mut out = Vec::with_capacity(ast.len());
    for node in ast {
        emit(node, &mut out);
    }
    out
}

fn emit(node: &AstNode, out: &mut Vec<CompiledAction>) {
    let kind = match node {
        AstNode::SceneBlock { body } => {
            for child in body {
                emit(child, out);
            }
            return;
        }
        AstNode::Sky { label } => ActionKind::SkyboxGenerate {
            prompt: label.clone(),
            seed: SKY_SEED,
            resolution: SKY_RESOLUTION,
        },
        AstNode::Spawn { kind, count, props } => ActionKind::Spawn {
            kind: kind.clone(),
            count: count.unwrap_or(1),
            props: props.clone(),
        },
        AstNode::Water { waves_intensity } => ActionKind::WorldFieldSetParams {
            intensity: *waves_intensity,
        },
        AstNode::LightingSun { angle } => ActionKind::LightingSet { sun_angle: *angle },
    };
    out.push(CompiledAction::new(kind));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use serde_json::json;

    #[test]
    fn test_spawn_lowering_shape() {
        let actions = lower(&parse("spawn rock count=2").unwrap());
        assert_eq!(actions.len(), 1);
        assert_eq!(
            serde_json::to_value(&actions[0]).unwrap(),
            json!({ "op": "spawn", "kind": "rock", "count": 2, "props": {} })
        );
    }

    #[test]
    fn test_spawn_count_defaults_to_one() {
        let actions = lower(&parse("spawn tree").unwrap());
        assert!(matches!(actions[0].kind, ActionKind::Spawn { count: 1, .. }));
    }

    #[test]
    fn test_every_statement_kind() {
        let src = r#"
            sky "aurora"
            water waves intensity=0.7
            lighting sun angle=12.5
        "#;
        let json: Vec<_> = lower(&parse(src).unwrap())
            .iter()
            .map(|a| serde_json::to_value(a).unwrap())
            .collect();
        assert_eq!(
            json,
            vec![
                json!({
                    "op": "skybox.generate",
                    "prompt": "aurora",
                    "seed": 42,
                    "resolution": 2048
                }),
                json!({ "op": "worldfield.setParams", "intensity": 0.7 }),
                json!({ "op": "lighting.set", "sunAngle": 12.5 }),
            ]
        );
    }

    #[test]
    fn test_scene_blocks_flatten_in_document_order() {
        let src = "scene { spawn a scene { spawn b spawn c } spawn d } spawn e";
        let kinds: Vec<String> = lower(&parse(src).unwrap())
            .into_iter()
            .map(|a| match a.kind {
                ActionKind::Spawn { kind, .. } => kind,
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(kinds, ["a", "b", "c", "d", "e"]);
    }

    #[test]
    fn test_empty_scene_emits_nothing() {
        assert!(lower(&parse("scene { }").unwrap()).is_empty());
    }
}
