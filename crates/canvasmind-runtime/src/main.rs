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

//! Headless scene runtime.
//!
//! Runs a script, optionally followed by a generated skybox and a batch of
//! generated meshes, against a headless engine and the mock generators, then
//! prints the admission log and final scene state as JSON.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use canvasmind_agents::{MockAssetFetcher, ServerRegistry};
use canvasmind_core::{HeadlessEngine, QualityMode};
use canvasmind_sdk::prelude::AdmissionRecord;
use canvasmind_sdk::{BatchReport, RuntimeConfig, RuntimeState, SceneObject, SceneRuntime};
use canvasmind_telemetry::{JsonLinesSink, NullSink, TelemetrySink};
use clap::Parser;
use serde::Serialize;

/// Run a scene script against the headless runtime.
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Run a scene script against the headless runtime",
    long_about = None
)]
struct Cli {
    /// Script to compile and apply.
    #[arg(value_name = "SCRIPT")]
    script: Option<PathBuf>,

    /// Runtime configuration as JSON.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Quality preset (performance, balanced, quality).
    #[arg(long)]
    quality: Option<QualityMode>,

    /// Server registry as JSON; the built-in mock registry is used otherwise.
    #[arg(long, value_name = "FILE")]
    registry: Option<PathBuf>,

    /// Generate a skybox from this prompt after the script.
    #[arg(long, value_name = "PROMPT")]
    skybox: Option<String>,

    /// Number of meshes to spawn after the script.
    #[arg(long, default_value_t = 0)]
    spawn: usize,

    /// Append telemetry records to this file as JSON lines.
    #[arg(long, value_name = "FILE")]
    telemetry_log: Option<PathBuf>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Report {
    admissions: Vec<AdmissionRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    skybox: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    batch: Option<BatchReport>,
    state: RuntimeState,
    objects: Vec<SceneObject>,
}

fn read_file(path: &Path, what: &str) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read {what} {path:?}"))
}

fn load_config(cli: &Cli) -> Result<RuntimeConfig> {
    let mut config = match &cli.config {
        Some(path) => RuntimeConfig::from_json(&read_file(path, "config")?)
            .with_context(|| format!("invalid config {path:?}"))?,
        None => RuntimeConfig::default(),
    };
    if let Some(quality) = cli.quality {
        config.quality = quality;
    }
    Ok(config)
}

fn load_registry(cli: &Cli) -> Result<ServerRegistry> {
    match &cli.registry {
        Some(path) => ServerRegistry::from_json(&read_file(path, "registry")?)
            .with_context(|| format!("invalid registry {path:?}")),
        None => Ok(ServerRegistry::mock()),
    }
}

fn telemetry_sink(cli: &Cli) -> Result<Arc<dyn TelemetrySink>> {
    let sink: Arc<dyn TelemetrySink> = match &cli.telemetry_log {
        Some(path) => Arc::new(JsonLinesSink::append_to(path)?),
        None => Arc::new(NullSink),
    };
    Ok(sink)
}

#[tokio::main]
async fn main() -> Result<()> {
    canvasmind_telemetry::init_logging("info");
    let cli = Cli::parse();

    let runtime = Arc::new(SceneRuntime::new(
        load_config(&cli)?,
        Arc::new(HeadlessEngine::new()),
        Arc::new(MockAssetFetcher::new()),
        load_registry(&cli)?,
        telemetry_sink(&cli)?,
    ));

    if let Some(path) = &cli.script {
        let src = read_file(path, "script")?;
        let records = runtime
            .apply_script(&src)
            .with_context(|| format!("failed to compile {path:?}"))?;
        let denied = records.iter().filter(|r| !r.outcome.allowed).count();
        log::info!("Script applied: {} actions, {denied} denied", records.len());
    }

    let skybox = match &cli.skybox {
        Some(prompt) => match runtime.apply_skybox(prompt).await {
            Ok(id) => Some(id),
            Err(e) => {
                log::error!("Skybox failed: {e}");
                None
            }
        },
        None => None,
    };

    let batch = if cli.spawn > 0 {
        Some(runtime.batch_spawn(cli.spawn).await)
    } else {
        None
    };

    runtime.telemetry().flush();

    let report = Report {
        admissions: runtime.admission_log(),
        skybox,
        batch,
        state: runtime.state(),
        objects: runtime.objects(),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
