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

//! Single-pass CanvasScript parser.
//!
//! There is no separate tokenizer: the parser scans characters left to right
//! and looks ahead by saving and restoring its scan position.

use crate::ast::AstNode;
use crate::error::CompileError;
use canvasmind_core::PropValue;
use std::collections::BTreeMap;

const MAX_SCENE_DEPTH: usize = 64;

/// Parses a script into its ordered list of top-level statements.
pub fn parse(src: &str) -> Result<Vec<AstNode>, CompileError> {
    let mut parser = Parser::new(src);
    let mut out = Vec::new();
    loop {
        parser.skip_ws();
        if parser.at_end() {
            break;
        }
        out.push(parser.statement(0)?);
    }
    Ok(out)
}

/// Replaces `//` comments with spaces so that offsets still index the
/// original source.
fn strip_comments(src: &str) -> Vec<char> {
    let mut out: Vec<char> = src.chars().collect();
    let mut i = 0;
    while i + 1 < out.len() {
        if out[i] == '/' && out[i + 1] == '/' {
            while i < out.len() && out[i] != '\n' {
                out[i] = ' ';
                i += 1;
            }
        } else {
            i += 1;
        }
    }
    out
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

/// A bare integer `count=` is the cardinality of a spawn, not a prop.
fn cardinality(key: &str, value: &PropValue) -> Option<u32> {
    match value {
        PropValue::Number(n)
            if key == "count" && n.fract() == 0.0 && *n >= 0.0 && *n <= f64::from(u32::MAX) =>
        {
            Some(*n as u32)
        }
        _ => None,
    }
}

struct Parser {
    src: Vec<char>,
    pos: usize,
}

impl Parser {
    fn new(src: &str) -> Self {
        Self {
            src: strip_comments(src),
            pos: 0,
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn peek(&self) -> Option<char> {
        self.src.get(self.pos).copied()
    }

    fn error(&self, message: impl Into<String>) -> CompileError {
        CompileError::syntax(message, self.pos)
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn starts_with(&self, tok: &str) -> bool {
        let mut i = self.pos;
        for c in tok.chars() {
            if self.src.get(i) != Some(&c) {
                return false;
            }
            i += 1;
        }
        true
    }

    /// Consumes `tok` if it comes next.
    fn match_token(&mut self, tok: &str) -> bool {
        self.skip_ws();
        if self.starts_with(tok) {
            self.pos += tok.chars().count();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, tok: &str) -> Result<(), CompileError> {
        if self.match_token(tok) {
            Ok(())
        } else {
            Err(self.error(format!("expected '{tok}'")))
        }
    }

    /// Returns `true` if the keyword `kw` comes next as a whole word.
    fn at_keyword(&self, kw: &str) -> bool {
        self.starts_with(kw)
            && !self
                .src
                .get(self.pos + kw.chars().count())
                .is_some_and(|&c| is_ident_continue(c))
    }

    fn expect_keyword(&mut self, kw: &str) -> Result<(), CompileError> {
        self.skip_ws();
        if self.at_keyword(kw) {
            self.pos += kw.chars().count();
            Ok(())
        } else {
            Err(self.error(format!("expected '{kw}'")))
        }
    }

    fn ident(&mut self) -> Result<String, CompileError> {
        self.skip_ws();
        if !self.peek().is_some_and(is_ident_start) {
            return Err(self.error("expected identifier"));
        }
        let start = self.pos;
        while self.peek().is_some_and(is_ident_continue) {
            self.pos += 1;
        }
        Ok(self.src[start..self.pos].iter().collect())
    }

    /// `[0-9]+(\.[0-9]+)?`
    fn number(&mut self) -> Result<f64, CompileError> {
        self.skip_ws();
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        if self.pos == start {
            return Err(self.error("expected number"));
        }
        if self.peek() == Some('.')
            && self
                .src
                .get(self.pos + 1)
                .is_some_and(|c| c.is_ascii_digit())
        {
            self.pos += 1;
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.pos += 1;
            }
        }
        let text: String = self.src[start..self.pos].iter().collect();
        text.parse::<f64>()
            .map_err(|_| CompileError::syntax("expected number", start))
    }

    fn quoted(&mut self) -> Result<String, CompileError> {
        self.skip_ws();
        if self.peek() != Some('"') {
            return Err(self.error("expected string"));
        }
        let open = self.pos;
        self.pos += 1;
        let start = self.pos;
        while self.peek().is_some_and(|c| c != '"') {
            self.pos += 1;
        }
        if self.at_end() {
            return Err(CompileError::syntax("unterminated string", open));
        }
        let out = self.src[start..self.pos].iter().collect();
        self.pos += 1;
        Ok(out)
    }

    /// `key=value`, where value is a number, a `number..number` range or a
    /// quoted string.
    ///
    /// Returns `Ok(None)` without consuming input if the next tokens are not
    /// `ident =`. Once the `=` is consumed, a malformed value is an error.
    fn kv_pair(&mut self) -> Result<Option<(String, PropValue)>, CompileError> {
        let save = self.pos;
        let Ok(key) = self.ident() else {
            self.pos = save;
            return Ok(None);
        };
        if !self.match_token("=") {
            self.pos = save;
            return Ok(None);
        }

        let value_start = self.pos;
        if let Ok(a) = self.number() {
            if self.match_token("..") {
                let b = self.number()?;
                return Ok(Some((key, PropValue::Range([a, b]))));
            }
            return Ok(Some((key, PropValue::Number(a))));
        }
        self.pos = value_start;
        let text = self.quoted()?;
        Ok(Some((key, PropValue::Text(text))))
    }

    fn spawn(&mut self) -> Result<AstNode, CompileError> {
        self.expect_keyword("spawn")?;
        let kind = self.ident()?;
        let mut count = None;
        let mut props = BTreeMap::new();
        while let Some((key, value)) = self.kv_pair()? {
            match cardinality(&key, &value) {
                Some(n) => count = Some(n),
                None => {
                    props.insert(key, value);
                }
            }
        }
        Ok(AstNode::Spawn { kind, count, props })
    }

    fn sky(&mut self) -> Result<AstNode, CompileError> {
        self.expect_keyword("sky")?;
        let label = self.quoted()?;
        Ok(AstNode::Sky { label })
    }

    fn water(&mut self) -> Result<AstNode, CompileError> {
        self.expect_keyword("water")?;
        self.expect_keyword("waves")?;
        self.expect_keyword("intensity")?;
        self.expect("=")?;
        let waves_intensity = self.number()?;
        Ok(AstNode::Water { waves_intensity })
    }

    fn lighting(&mut self) -> Result<AstNode, CompileError> {
        self.expect_keyword("lighting")?;
        self.expect_keyword("sun")?;
        self.expect_keyword("angle")?;
        self.expect("=")?;
        let angle = self.number()?;
        Ok(AstNode::LightingSun { angle })
    }

    fn scene(&mut self, depth: usize) -> Result<AstNode, CompileError> {
        if depth >= MAX_SCENE_DEPTH {
            return Err(self.error("scene blocks nested too deeply"));
        }
        self.expect_keyword("scene")?;
        self.expect("{")?;
        let mut body = Vec::new();
        loop {
            self.skip_ws();
            if self.at_end() {
                return Err(self.error("expected '}'"));
            }
            if self.match_token("}") {
                break;
            }
            body.push(self.statement(depth + 1)?);
        }
        Ok(AstNode::SceneBlock { body })
    }

    fn statement(&mut self, depth: usize) -> Result<AstNode, CompileError> {
        self.skip_ws();
        if self.at_keyword("scene") {
            self.scene(depth)
        } else if self.at_keyword("spawn") {
            self.spawn()
        } else if self.at_keyword("sky") {
            self.sky()
        } else if self.at_keyword("water") {
            self.water()
        } else if self.at_keyword("lighting") {
            self.lighting()
        } else {
            Err(self.error("expected statement"))
        }
    }
}
