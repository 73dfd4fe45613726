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

//! Background delivery of telemetry records.

use crate::sink::TelemetrySink;
use canvasmind_core::telemetry::{CandidateInfo, CandidateRecord};
use canvasmind_core::{TelemetryObserver, TelemetryRecord};
use crossbeam_channel::{Receiver, Sender, TrySendError};
use serde::Deserialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

/// Configuration of the telemetry emitter.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TelemetryConfig {
    /// Whether records are delivered at all.
    pub enabled: bool,
    /// Maximum number of records waiting for the worker.
    /// If the buffer is full, new records are dropped.
    pub buffer_size: usize,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            buffer_size: 1000,
        }
    }
}

/// Called once with the outcome of delivering a single record.
pub type DeliveryCallback = Box<dyn FnOnce(anyhow::Result<()>) + Send>;

enum Message {
    Record(TelemetryRecord, Option<DeliveryCallback>),
    Flush(Sender<()>),
}

/// Hands records to a worker thread that writes them to a sink.
///
/// Emission never blocks: when the buffer is full the record is dropped and
/// counted. Sink errors are logged and never reach the emitting code.
#[derive(Debug)]
pub struct TelemetryEmitter {
    enabled: bool,
    tx: Option<Sender<Message>>,
    written: Arc<AtomicU64>,
    dropped: AtomicU64,
    handle: Option<thread::JoinHandle<()>>,
}

impl TelemetryEmitter {
    /// Starts the worker thread.
    pub fn new(config: TelemetryConfig, sink: Arc<dyn TelemetrySink>) -> Self {
        let (tx, rx) = crossbeam_channel::bounded(config.buffer_size.max(1));
        let written = Arc::new(AtomicU64::new(0));
        let worker_written = Arc::clone(&written);

        let handle = thread::Builder::new()
            .name("canvasmind-telemetry".into())
            .spawn(move || run_worker(rx, sink, worker_written));
        let handle = match handle {
            Ok(handle) => Some(handle),
            Err(e) => {
                log::error!("Failed to start telemetry worker: {e}");
                None
            }
        };

        Self {
            enabled: config.enabled && handle.is_some(),
            tx: Some(tx),
            written,
            dropped: AtomicU64::new(0),
            handle,
        }
    }

    /// An emitter that drops everything without counting it.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            tx: None,
            written: Arc::new(AtomicU64::new(0)),
            dropped: AtomicU64::new(0),
            handle: None,
        }
    }

    /// Queues a record for delivery.
    ///
    /// Returns `false` if the record was dropped.
    pub fn emit(&self, record: TelemetryRecord) -> bool {
        self.enqueue(record, None)
    }

    /// Queues a record and calls `on_delivered` once its fate is known.
    ///
    /// The callback runs on the worker thread with the sink's result, or on
    /// the calling thread with an error if the record was never queued. It
    /// runs exactly once either way; emission still never blocks.
    pub fn emit_with_ack<F>(&self, record: TelemetryRecord, on_delivered: F) -> bool
    where
        F: FnOnce(anyhow::Result<()>) + Send + 'static,
    {
        self.enqueue(record, Some(Box::new(on_delivered)))
    }

    fn enqueue(&self, record: TelemetryRecord, ack: Option<DeliveryCallback>) -> bool {
        let tx = match &self.tx {
            Some(tx) if self.enabled => tx,
            _ => {
                if let Some(ack) = ack {
                    ack(Err(anyhow::anyhow!("telemetry is disabled")));
                }
                return false;
            }
        };
        match tx.try_send(Message::Record(record, ack)) {
            Ok(()) => true,
            Err(TrySendError::Full(message)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                log::trace!("Telemetry buffer full, {dropped} records dropped so far");
                reject(message, "telemetry buffer is full");
                false
            }
            Err(TrySendError::Disconnected(message)) => {
                reject(message, "telemetry worker has stopped");
                false
            }
        }
    }

    /// Queues a generation-candidate record.
    pub fn log_candidate(
        &self,
        prompt: impl Into<String>,
        candidate: CandidateInfo,
        chosen: bool,
        dwell_time: f64,
    ) -> bool {
        self.emit(TelemetryRecord::Candidate(CandidateRecord {
            prompt: prompt.into(),
            candidate,
            chosen,
            dwell_time,
        }))
    }

    /// Blocks until every record queued before this call has been written
    /// and the sink flushed.
    pub fn flush(&self) {
        let (Some(tx), true) = (&self.tx, self.handle.is_some()) else {
            return;
        };
        let (ack_tx, ack_rx) = crossbeam_channel::bounded(1);
        if tx.send(Message::Flush(ack_tx)).is_ok() {
            let _ = ack_rx.recv();
        }
    }

    /// Records written to the sink so far.
    pub fn written_count(&self) -> u64 {
        self.written.load(Ordering::Relaxed)
    }

    /// Records dropped because the buffer was full.
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl TelemetryObserver for TelemetryEmitter {
    fn observe(&self, record: TelemetryRecord) {
        self.emit(record);
    }
}

impl Drop for TelemetryEmitter {
    fn drop(&mut self) {
        // Closing the channel lets the worker drain and exit.
        self.tx.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("Telemetry worker panicked");
            }
        }
    }
}

fn reject(message: Message, reason: &'static str) {
    if let Message::Record(_, Some(ack)) = message {
        ack(Err(anyhow::anyhow!(reason)));
    }
}

fn run_worker(rx: Receiver<Message>, sink: Arc<dyn TelemetrySink>, written: Arc<AtomicU64>) {
    log::debug!("Telemetry worker started.");
    for message in rx.iter() {
        match message {
            Message::Record(record, ack) => {
                let result = sink.write(&record);
                match &result {
                    Ok(()) => {
                        written.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(e) => {
                        log::warn!("Telemetry sink rejected '{}': {e:#}", record.type_name())
                    }
                }
                if let Some(ack) = ack {
                    ack(result);
                }
            }
            Message::Flush(ack) => {
                if let Err(e) = sink.flush() {
                    log::warn!("Telemetry sink flush failed: {e:#}");
                }
                let _ = ack.send(());
            }
        }
    }
    if let Err(e) = sink.flush() {
        log::warn!("Telemetry sink flush failed: {e:#}");
    }
    log::debug!("Telemetry worker stopped.");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;
    use std::sync::Barrier;

    fn decision(op: &str) -> TelemetryRecord {
        TelemetryRecord::AdmissionDecision {
            op: op.into(),
            allowed: true,
            reason: None,
        }
    }

    #[test]
    fn test_records_arrive_in_order() {
        let sink = Arc::new(MemorySink::new());
        let emitter = TelemetryEmitter::new(TelemetryConfig::default(), sink.clone());

        assert!(emitter.emit(decision("a")));
        assert!(emitter.emit(decision("b")));
        emitter.flush();

        assert_eq!(sink.records(), vec![decision("a"), decision("b")]);
        assert_eq!(emitter.written_count(), 2);
        assert_eq!(emitter.dropped_count(), 0);
    }

    #[test]
    fn test_disabled_emitter_drops_silently() {
        let sink = Arc::new(MemorySink::new());
        let config = TelemetryConfig {
            enabled: false,
            ..Default::default()
        };
        let emitter = TelemetryEmitter::new(config, sink.clone());

        assert!(!emitter.emit(decision("a")));
        emitter.flush();
        assert!(sink.is_empty());
        assert!(!TelemetryEmitter::disabled().emit(decision("a")));
    }

    #[derive(Debug)]
    struct BlockingSink {
        gate: Barrier,
        inner: MemorySink,
    }

    impl TelemetrySink for BlockingSink {
        fn write(&self, record: &TelemetryRecord) -> anyhow::Result<()> {
            if self.inner.is_empty() {
                self.gate.wait();
            }
            self.inner.write(record)
        }
    }

    #[test]
    fn test_full_buffer_drops_and_counts() {
        let sink = Arc::new(BlockingSink {
            gate: Barrier::new(2),
            inner: MemorySink::new(),
        });
        let config = TelemetryConfig {
            enabled: true,
            buffer_size: 1,
        };
        let emitter = TelemetryEmitter::new(config, sink.clone());

        // The first record parks the worker inside the sink.
        assert!(emitter.emit(decision("first")));
        let mut accepted = 0;
        for i in 0..10 {
            if emitter.emit(decision(&format!("r{i}"))) {
                accepted += 1;
            }
        }
        sink.gate.wait();
        emitter.flush();

        assert!(accepted <= 2, "accepted {accepted}");
        assert_eq!(emitter.dropped_count(), 10 - accepted);
        assert_eq!(sink.inner.len() as u64, 1 + accepted);
    }

    #[test]
    fn test_sink_errors_are_swallowed() {
        #[derive(Debug)]
        struct FailingSink;
        impl TelemetrySink for FailingSink {
            fn write(&self, _record: &TelemetryRecord) -> anyhow::Result<()> {
                anyhow::bail!("disk full")
            }
        }

        let emitter = TelemetryEmitter::new(TelemetryConfig::default(), Arc::new(FailingSink));
        assert!(emitter.emit(decision("a")));
        emitter.flush();
        assert_eq!(emitter.written_count(), 0);
    }

    fn acked(emitter: &TelemetryEmitter, op: &str) -> (bool, Result<(), String>) {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let queued = emitter.emit_with_ack(decision(op), move |result| {
            let _ = tx.send(result.map_err(|e| e.to_string()));
        });
        let result = rx
            .recv_timeout(std::time::Duration::from_secs(5))
            .expect("delivery callback never ran");
        (queued, result)
    }

    #[test]
    fn test_ack_reports_successful_write() {
        let sink = Arc::new(MemorySink::new());
        let emitter = TelemetryEmitter::new(TelemetryConfig::default(), sink.clone());

        let (queued, result) = acked(&emitter, "a");

        assert!(queued);
        assert_eq!(result, Ok(()));
        assert_eq!(sink.records(), vec![decision("a")]);
    }

    #[test]
    fn test_ack_reports_sink_failure() {
        #[derive(Debug)]
        struct FailingSink;
        impl TelemetrySink for FailingSink {
            fn write(&self, _record: &TelemetryRecord) -> anyhow::Result<()> {
                anyhow::bail!("disk full")
            }
        }
        let emitter = TelemetryEmitter::new(TelemetryConfig::default(), Arc::new(FailingSink));

        let (queued, result) = acked(&emitter, "a");

        assert!(queued);
        assert_eq!(result, Err("disk full".to_string()));
        assert_eq!(emitter.written_count(), 0);
    }

    #[test]
    fn test_ack_runs_when_disabled() {
        let (queued, result) = acked(&TelemetryEmitter::disabled(), "a");

        assert!(!queued);
        assert!(result.is_err());
    }

    #[test]
    fn test_config_deserializes_partial() {
        let config: TelemetryConfig = serde_json::from_str(r#"{"bufferSize": 8}"#).unwrap();
        assert!(config.enabled);
        assert_eq!(config.buffer_size, 8);
    }
}
