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

//! Object-level access control on generated content.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// The wildcard operation name granting every operation.
pub const WILDCARD_OP: &str = "all";

/// The party on whose behalf an operation is requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// An automated planner. Restricted only by an explicit grant list.
    Ai,
    /// A human user. Implicitly allowed everything.
    User,
    /// The runtime itself. Implicitly allowed everything.
    System,
}

/// Allowed operations per role for a single object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessControlEntry {
    roles: HashMap<Role, BTreeSet<String>>,
}

impl AccessControlEntry {
    /// Creates an entry with no explicit grants.
    pub fn new() -> Self {
        Self::default()
    }

    /// The entry attached to freshly generated content: the planner may only
    /// transform it, users and the system may do anything.
    pub fn generated_content() -> Self {
        Self::new()
            .allow(Role::Ai, "transform")
            .allow(Role::User, WILDCARD_OP)
            .allow(Role::System, WILDCARD_OP)
    }

    /// Gives `role` an explicit, empty grant list, denying it everything
    /// until [`allow`](Self::allow) adds operations.
    pub fn restrict(mut self, role: Role) -> Self {
        self.roles.entry(role).or_default();
        self
    }

    /// Grants `op` to `role`.
    pub fn allow(mut self, role: Role, op: impl Into<String>) -> Self {
        self.roles.entry(role).or_default().insert(op.into());
        self
    }

    /// Returns the explicit grants of `role`, if any.
    pub fn grants(&self, role: Role) -> Option<&BTreeSet<String>> {
        self.roles.get(&role)
    }

    /// Returns `true` if `role` may perform `op` on the object.
    ///
    /// An entry without a grant list for the AI role leaves it unrestricted;
    /// once a list exists only its operations (or the wildcard) pass.
    pub fn allows(&self, role: Role, op: &str) -> bool {
        match role {
            Role::User | Role::System => true,
            Role::Ai => self
                .roles
                .get(&Role::Ai)
                .map_or(true, |ops| ops.contains(op) || ops.contains(WILDCARD_OP)),
        }
    }
}

/// Maps object ids to their access-control entries.
///
/// Objects without an entry are unrestricted.
#[derive(Debug, Clone, Default)]
pub struct AccessControlTable {
    entries: HashMap<String, AccessControlEntry>,
}

impl AccessControlTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the entry of `object_id`.
    pub fn insert(&mut self, object_id: impl Into<String>, entry: AccessControlEntry) {
        self.entries.insert(object_id.into(), entry);
    }

    /// Removes the entry of `object_id`.
    pub fn remove(&mut self, object_id: &str) -> Option<AccessControlEntry> {
        self.entries.remove(object_id)
    }

    /// Returns the entry of `object_id`, if any.
    pub fn get(&self, object_id: &str) -> Option<&AccessControlEntry> {
        self.entries.get(object_id)
    }

    /// Returns `true` if `role` may perform `op` on `object_id`.
    pub fn permits(&self, object_id: &str, role: Role, op: &str) -> bool {
        self.entries
            .get(object_id)
            .map_or(true, |entry| entry.allows(role, op))
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the table holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Removes every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ai_without_grant_list_is_unrestricted() {
        let entry = AccessControlEntry::new().allow(Role::User, WILDCARD_OP);
        assert!(entry.allows(Role::Ai, "transform"));
        assert!(entry.grants(Role::Ai).is_none());
    }

    #[test]
    fn test_empty_ai_grant_list_denies() {
        let entry = AccessControlEntry::new().restrict(Role::Ai);
        assert!(!entry.allows(Role::Ai, "transform"));
        assert!(entry.allows(Role::User, "transform"));
        assert!(entry.allows(Role::System, "spawn"));
        assert!(entry.grants(Role::Ai).is_some_and(|ops| ops.is_empty()));
    }

    #[test]
    fn test_generated_content_grants() {
        let entry = AccessControlEntry::generated_content();
        assert!(entry.allows(Role::Ai, "transform"));
        assert!(!entry.allows(Role::Ai, "lighting.set"));
        assert!(entry.grants(Role::User).unwrap().contains(WILDCARD_OP));
    }

    #[test]
    fn test_wildcard_grants_everything_to_ai() {
        let entry = AccessControlEntry::new().allow(Role::Ai, WILDCARD_OP);
        assert!(entry.allows(Role::Ai, "skybox.generate"));
    }

    #[test]
    fn test_table_absent_entry_permits() {
        let mut table = AccessControlTable::new();
        assert!(table.permits("ghost", Role::Ai, "transform"));
        table.insert("rock_1", AccessControlEntry::new().restrict(Role::Ai));
        assert!(!table.permits("rock_1", Role::Ai, "transform"));
        table.remove("rock_1");
        assert!(table.is_empty());
    }
}
