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

use super::TelemetrySink;
use canvasmind_core::TelemetryRecord;
use std::sync::RwLock;

/// Keeps every record in memory, in arrival order.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: RwLock<Vec<TelemetryRecord>>,
}

impl MemorySink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy of everything received so far.
    pub fn records(&self) -> Vec<TelemetryRecord> {
        self.records.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Records whose type name is `type_name`.
    pub fn records_of_type(&self, type_name: &str) -> Vec<TelemetryRecord> {
        self.records
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|r| r.type_name() == type_name)
            .cloned()
            .collect()
    }

    /// Number of records received.
    pub fn len(&self) -> usize {
        self.records.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Returns `true` if nothing was received.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forgets everything received.
    pub fn clear(&self) {
        self.records.write().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

impl TelemetrySink for MemorySink {
    fn write(&self, record: &TelemetryRecord) -> anyhow::Result<()> {
        self.records
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_sink_filters_by_type() {
        let sink = MemorySink::new();
        sink.write(&TelemetryRecord::AdmissionDecision {
            op: "spawn".into(),
            allowed: true,
            reason: None,
        })
        .unwrap();
        sink.write(&TelemetryRecord::BudgetViolation {
            kind: "tris".into(),
            value: 10.0,
            cap: 5.0,
        })
        .unwrap();

        assert_eq!(sink.len(), 2);
        assert_eq!(sink.records_of_type("budget_violation").len(), 1);
        sink.clear();
        assert!(sink.is_empty());
    }
}
