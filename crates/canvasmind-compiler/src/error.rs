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

//! Compilation errors.

/// An error raised while compiling CanvasScript.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CompileError {
    /// An expected token was absent.
    #[error("CanvasScript: {message} at {offset}")]
    Syntax {
        /// What the parser expected.
        message: String,
        /// Character offset into the source where the parser stopped.
        offset: usize,
    },
}

impl CompileError {
    /// Builds a syntax error.
    pub fn syntax(message: impl Into<String>, offset: usize) -> Self {
        CompileError::Syntax {
            message: message.into(),
            offset,
        }
    }

    /// Character offset of the error.
    pub fn offset(&self) -> usize {
        match self {
            CompileError::Syntax { offset, .. } => *offset,
        }
    }

    /// One-based `(line, column)` of the error within `src`.
    pub fn line_col(&self, src: &str) -> (usize, usize) {
        let mut line = 1;
        let mut column = 1;
        for c in src.chars().take(self.offset()) {
            if c == '\n' {
                line += 1;
                column = 1;
            } else {
                column += 1;
            }
        }
        (line, column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_carries_offset() {
        let err = CompileError::syntax("expected '='", 17);
        assert_eq!(err.to_string(), "CanvasScript: expected '=' at 17");
    }

    #[test]
    fn test_line_col() {
        let err = CompileError::syntax("expected statement", 6);
        assert_eq!(err.line_col("abc\nde?"), (2, 3));
    }
}
