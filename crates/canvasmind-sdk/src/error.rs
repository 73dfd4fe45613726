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

use canvasmind_compiler::CompileError;
use canvasmind_core::FetchError;

/// Failure of a runtime operation. Scene state is unchanged when one is
/// returned.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RuntimeError {
    /// The script did not parse.
    #[error(transparent)]
    Compile(#[from] CompileError),
    /// The generator could not be reached, even after retries.
    #[error("generation failed: {0}")]
    Fetch(#[from] FetchError),
    /// No registered server produces this kind of asset.
    #[error("no server tagged '{tag}'")]
    NoServer {
        /// The requested tag.
        tag: String,
    },
    /// The live-node cap is reached; nothing new is requested.
    #[error("spawn refused: node cap reached")]
    NodeCapReached,
    /// The admission pipeline rejected the resulting action.
    #[error("'{op}' rejected: {reason}")]
    Rejected {
        /// Operation name of the rejected action.
        op: String,
        /// Rejection reason.
        reason: String,
    },
}
