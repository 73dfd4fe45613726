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

//! Checks applied before anything leaves the runtime.

/// Longest prompt forwarded to a generator, in characters.
pub const MAX_PROMPT_CHARS: usize = 500;

const FORBIDDEN: &[char] = &['{', '}', '<', '>', '$', ';'];

/// Strips template and shell metacharacters and truncates to
/// [`MAX_PROMPT_CHARS`].
pub fn sanitize_prompt(prompt: &str) -> String {
    prompt
        .chars()
        .filter(|c| !FORBIDDEN.contains(c))
        .take(MAX_PROMPT_CHARS)
        .collect()
}

/// Returns `true` if `url` starts with one of the allowed prefixes.
pub fn is_allowed_endpoint<S: AsRef<str>>(url: &str, allowlist: &[S]) -> bool {
    allowlist.iter().any(|prefix| url.starts_with(prefix.as_ref()))
}
