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

//! Contract of the asset-fetch collaborator.
//!
//! The fetch service turns a generation request into a concrete asset plus a
//! cost estimate. Its network protocol is not ours to design; only the
//! request/response shapes are fixed here.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A generation request sent to an upstream generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchRequest {
    /// Base URL of the generator server.
    pub server_url: String,
    /// Endpoint name, e.g. `generate_skybox`.
    pub endpoint: String,
    /// JSON request body.
    pub body: serde_json::Value,
}

/// A concrete, loadable asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum AssetDescriptor {
    /// An equirectangular environment texture.
    #[serde(rename = "texture.equirect")]
    TextureEquirect {
        /// Image URLs, first one is the primary.
        urls: Vec<String>,
        /// MIME type of the images.
        mime: String,
    },
    /// A glTF model.
    #[serde(rename = "model.gltf")]
    ModelGltf {
        /// Model URL.
        url: String,
    },
}

impl AssetDescriptor {
    /// The primary URL of the asset, used as its identity.
    pub fn url(&self) -> &str {
        match self {
            AssetDescriptor::TextureEquirect { urls, .. } => {
                urls.first().map(String::as_str).unwrap_or_default()
            }
            AssetDescriptor::ModelGltf { url } => url,
        }
    }
}

/// Where a generated asset came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    /// Server that produced the asset.
    pub server: String,
    /// Model name reported by the server.
    pub model: String,
    /// Prompt the asset was generated from, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    /// Generator seed.
    pub seed: u64,
    /// Generation time, milliseconds since the Unix epoch.
    #[serde(rename = "ts")]
    pub timestamp: u64,
}

/// Cost hint returned alongside an asset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CostEstimate {
    /// Estimated texture memory in megabytes.
    #[serde(rename = "tex_mem_mb_est", default, skip_serializing_if = "Option::is_none")]
    pub tex_mem_mb: Option<f64>,
    /// Estimated triangle count.
    #[serde(rename = "tris_est", default, skip_serializing_if = "Option::is_none")]
    pub tris: Option<u64>,
}

/// A successful generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchResponse {
    /// The produced asset.
    pub asset: AssetDescriptor,
    /// Where it came from.
    pub provenance: Provenance,
    /// Cost hint.
    #[serde(rename = "budget_hint", default)]
    pub estimated_cost: CostEstimate,
}

/// A failed generation. Always considered transient by the planner.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FetchError {
    /// Transport-level failure.
    #[error("network error: {0}")]
    Network(String),
    /// The server did not answer in time.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    /// The server does not serve the requested endpoint.
    #[error("unknown endpoint {server}/{endpoint}")]
    UnknownEndpoint {
        /// Server URL.
        server: String,
        /// Endpoint name.
        endpoint: String,
    },
    /// The response could not be interpreted.
    #[error("malformed response: {0}")]
    Malformed(String),
    /// The server URL is not on the configured allow-list.
    #[error("server {0} is not on the endpoint allow-list")]
    Blocked(String),
}

/// The asset-fetch service.
#[async_trait]
pub trait AssetFetcher: Send + Sync {
    /// Performs one generation request. No retries happen here.
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, FetchError>;
}
