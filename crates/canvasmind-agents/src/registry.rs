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

//! The set of upstream generator servers.

use serde::{Deserialize, Serialize};

/// One generator server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerEntry {
    /// Stable id, used in statistics keys.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Base URL requests are sent to.
    pub server_url: String,
    /// What the server produces, e.g. `skybox` or `mesh`.
    pub tags: Vec<String>,
    /// Endpoints the server serves.
    pub capabilities: Vec<String>,
}

impl ServerEntry {
    /// Returns `true` if the server carries `tag`.
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// Returns `true` if the server serves `endpoint`.
    pub fn serves(&self, endpoint: &str) -> bool {
        self.capabilities.iter().any(|c| c == endpoint)
    }
}

/// Known servers, in registration order.
///
/// Process-scoped: created once and handed to the planner by reference.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServerRegistry {
    servers: Vec<ServerEntry>,
}

impl ServerRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in mock servers used when no registry is configured.
    pub fn mock() -> Self {
        let mut registry = Self::new();
        registry.register(ServerEntry {
            id: "nebula-skybox".into(),
            name: "Mock Nebula Skybox".into(),
            server_url: "/mcp/nebula".into(),
            tags: vec!["skybox".into(), "texture".into()],
            capabilities: vec!["generate_skybox".into()],
        });
        registry.register(ServerEntry {
            id: "mesh-boulder".into(),
            name: "Mock Boulder Mesh".into(),
            server_url: "/mcp/mesh".into(),
            tags: vec!["mesh".into(), "glb".into()],
            capabilities: vec!["generate_mesh".into()],
        });
        registry
    }

    /// Parses a JSON array of server entries.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        Ok(Self {
            servers: serde_json::from_str(json)?,
        })
    }

    /// Adds a server, replacing any entry with the same id.
    pub fn register(&mut self, entry: ServerEntry) {
        match self.servers.iter_mut().find(|s| s.id == entry.id) {
            Some(existing) => *existing = entry,
            None => self.servers.push(entry),
        }
    }

    /// Looks a server up by id.
    pub fn get(&self, id: &str) -> Option<&ServerEntry> {
        self.servers.iter().find(|s| s.id == id)
    }

    /// Servers carrying `tag`, in registration order.
    pub fn with_tag<'a, 'b>(&'a self, tag: &'b str) -> impl Iterator<Item = &'a ServerEntry> + 'b
    where
        'a: 'b,
    {
        self.servers.iter().filter(move |s| s.has_tag(tag))
    }

    /// All servers.
    pub fn iter(&self) -> impl Iterator<Item = &ServerEntry> {
        self.servers.iter()
    }

    /// Number of servers.
    pub fn len(&self) -> usize {
        self.servers.len()
    }

    /// Returns `true` if no server is known.
    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_registry_tags() {
        let registry = ServerRegistry::mock();
        let skybox: Vec<_> = registry.with_tag("skybox").map(|s| s.id.as_str()).collect();
        let glb: Vec<_> = registry.with_tag("glb").map(|s| s.id.as_str()).collect();
        assert_eq!(skybox, vec!["nebula-skybox"]);
        assert_eq!(glb, vec!["mesh-boulder"]);
        assert!(registry.get("mesh-boulder").unwrap().serves("generate_mesh"));
        assert_eq!(registry.with_tag("audio").count(), 0);
    }

    #[test]
    fn test_register_replaces_same_id() {
        let mut registry = ServerRegistry::mock();
        let mut entry = registry.get("mesh-boulder").unwrap().clone();
        entry.server_url = "/mcp/mesh-v2".into();
        registry.register(entry);

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get("mesh-boulder").unwrap().server_url, "/mcp/mesh-v2");
    }

    #[test]
    fn test_from_json() {
        let registry = ServerRegistry::from_json(
            r#"[{"id":"a","name":"A","server_url":"/a",
                "tags":["mesh"],"capabilities":["generate_mesh"]}]"#,
        )
        .unwrap();
        assert_eq!(registry.with_tag("mesh").count(), 1);
        assert!(ServerRegistry::from_json("{").is_err());
    }
}
