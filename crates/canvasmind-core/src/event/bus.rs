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

use crate::action::CompiledAction;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

/// A publish/subscribe bus keyed by operation name.
///
/// Each subscription is an unbounded flume channel, so publishing never
/// blocks and subscribers can drain on their own thread. Subscribers whose
/// receiver was dropped are pruned on the next publish of their operation.
#[derive(Debug, Default)]
pub struct SceneBus {
    subscribers: Mutex<HashMap<String, Vec<flume::Sender<CompiledAction>>>>,
    published: AtomicU64,
}

impl SceneBus {
    /// Creates a bus with no subscribers.
    pub fn new() -> Self {
        log::info!("SceneBus initialized.");
        Self::default()
    }

    /// Subscribes to every action published under `op`.
    ///
    /// ## Returns
    /// The receiving end of the subscription. Dropping it unsubscribes.
    pub fn subscribe(&self, op: impl Into<String>) -> flume::Receiver<CompiledAction> {
        let (sender, receiver) = flume::unbounded();
        let op = op.into();
        log::debug!("SceneBus: new subscriber for '{op}'.");
        self.lock().entry(op).or_default().push(sender);
        receiver
    }

    /// Publishes an action under its operation name.
    ///
    /// ## Returns
    /// The number of subscribers the action was delivered to.
    pub fn publish(&self, action: &CompiledAction) -> usize {
        self.published.fetch_add(1, Ordering::Relaxed);
        log::trace!("Publishing '{}'.", action.op());

        let mut subscribers = self.lock();
        let Some(senders) = subscribers.get_mut(action.op()) else {
            return 0;
        };
        senders.retain(|sender| sender.send(action.clone()).is_ok());
        senders.len()
    }

    /// Total number of publish calls since creation.
    pub fn publish_count(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    /// Number of registered subscribers of `op`, including ones not yet pruned.
    pub fn subscriber_count(&self, op: &str) -> usize {
        self.lock().get(op).map_or(0, Vec::len)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Vec<flume::Sender<CompiledAction>>>> {
        self.subscribers.lock().unwrap_or_else(|e| e.into_inner())
    }
}
