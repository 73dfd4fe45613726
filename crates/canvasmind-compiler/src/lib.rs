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

//! # CanvasScript
//!
//! A small textual scene description language:
//!
//! ```text
//! // comments run to the end of the line
//! scene {
//!     sky "nebula at dusk"
//!     spawn rock count=12 scale=0.5..2 material="basalt"
//!     water waves intensity=0.4
//!     lighting sun angle=35
//! }
//! ```
//!
//! [`parse`] turns a script into an ordered AST, [`lower`] flattens the AST
//! into [`CompiledAction`]s in document order, and [`compile`] does both.

#![warn(missing_docs)]

pub mod ast;
pub mod error;
pub mod lower;
pub mod parser;

pub use ast::AstNode;
pub use error::CompileError;
pub use lower::{lower, SKY_RESOLUTION, SKY_SEED};
pub use parser::parse;

use canvasmind_core::CompiledAction;

/// Parses and lowers a script.
///
/// A syntax error aborts the whole script: no actions are produced.
pub fn compile(src: &str) -> Result<Vec<CompiledAction>, CompileError> {
    let ast = parse(src)?;
    let actions = lower(&ast);
    log::debug!(
        "CanvasScript: compiled {} statement(s) into {} action(s).",
        ast.len(),
        actions.len()
    );
    Ok(actions)
}
