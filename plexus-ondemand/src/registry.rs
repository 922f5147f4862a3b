// Copyright 2025 Plexus (https://github.com/plexus-net)
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

//! Capture registry contract.
//!
//! The durable registry (etcd-backed in production) is an external
//! collaborator; this module defines the watch contract the orchestrator
//! consumes plus an in-memory implementation for tests and
//! single-process deployments. Events are FIFO per capture but carry no
//! ordering guarantee across captures.

use crate::capture::Capture;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tokio::sync::mpsc;

/// Registry mutation kinds. `Init` replays resources that already
/// existed when the watch was opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WatchAction {
    Init,
    Create,
    Set,
    Update,
    Expire,
    Delete,
}

impl fmt::Display for WatchAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WatchAction::Init => "init",
            WatchAction::Create => "create",
            WatchAction::Set => "set",
            WatchAction::Update => "update",
            WatchAction::Expire => "expire",
            WatchAction::Delete => "delete",
        };
        f.write_str(name)
    }
}

/// One registry mutation delivered to a watcher.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureEvent {
    pub action: WatchAction,
    pub id: String,
    pub capture: Capture,
}

/// Read and watch access to the capture registry.
pub trait CaptureRegistry: Send + Sync {
    /// Snapshot of the current resource set.
    fn index(&self) -> Vec<Capture>;

    /// Open a watch. Existing resources are replayed as `Init` events
    /// before any live mutation is delivered.
    fn watch(&self) -> mpsc::UnboundedReceiver<CaptureEvent>;
}

/// In-memory capture registry.
#[derive(Default)]
pub struct MemoryCaptureRegistry {
    captures: Mutex<BTreeMap<String, Capture>>,
    watchers: Mutex<Vec<mpsc::UnboundedSender<CaptureEvent>>>,
}

impl MemoryCaptureRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a capture, assigning a UUID when it has none. Emits
    /// `Create` for new resources and `Update` otherwise.
    pub fn create(&self, mut capture: Capture) -> Capture {
        if capture.uuid.is_empty() {
            capture = Capture {
                uuid: uuid::Uuid::new_v4().to_string(),
                ..capture
            };
        }
        let action = {
            let mut captures = self.captures.lock();
            let action = if captures.contains_key(&capture.uuid) {
                WatchAction::Update
            } else {
                WatchAction::Create
            };
            captures.insert(capture.uuid.clone(), capture.clone());
            action
        };
        self.emit(CaptureEvent {
            action,
            id: capture.uuid.clone(),
            capture: capture.clone(),
        });
        capture
    }

    /// Remove a capture, emitting `Delete` when it existed.
    pub fn delete(&self, uuid: &str) -> Option<Capture> {
        let capture = self.captures.lock().remove(uuid)?;
        self.emit(CaptureEvent {
            action: WatchAction::Delete,
            id: uuid.to_string(),
            capture: capture.clone(),
        });
        Some(capture)
    }

    pub fn get(&self, uuid: &str) -> Option<Capture> {
        self.captures.lock().get(uuid).cloned()
    }

    fn emit(&self, event: CaptureEvent) {
        self.watchers
            .lock()
            .retain(|watcher| watcher.send(event.clone()).is_ok());
    }
}

impl CaptureRegistry for MemoryCaptureRegistry {
    fn index(&self) -> Vec<Capture> {
        self.captures.lock().values().cloned().collect()
    }

    fn watch(&self) -> mpsc::UnboundedReceiver<CaptureEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        // Hold both locks so the init replay and live events cannot
        // interleave.
        let captures = self.captures.lock();
        let mut watchers = self.watchers.lock();
        for (id, capture) in captures.iter() {
            let _ = tx.send(CaptureEvent {
                action: WatchAction::Init,
                id: id.clone(),
                capture: capture.clone(),
            });
        }
        watchers.push(tx);
        rx
    }
}
