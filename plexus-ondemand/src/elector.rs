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

//! Leader election contract.
//!
//! Consensus-backed election lives outside this crate; the orchestrator
//! only requires this thin contract. Exactly one holder of a given
//! `(service, role)` key is master at any moment, and `is_master` turns
//! false immediately on loss. Consumers must tolerate flapping: work
//! done while not master is a no-op, and work done as master is never
//! rolled back — the next master reconciles.

use crate::config::OnDemandConfig;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::broadcast;
use tracing::{debug, info};

pub trait MasterElection: Send + Sync {
    /// Enter the election and block until the initial leadership state
    /// is known.
    fn start_and_wait(&self);

    /// Leave the election, releasing leadership when held.
    fn stop(&self);

    fn is_master(&self) -> bool;

    /// Leadership transitions; `true` means this process became master.
    fn subscribe(&self) -> broadcast::Receiver<bool>;
}

/// Election for single-analyzer deployments: master from start to stop,
/// holding the `(service, role)` key named in the configuration.
pub struct StandaloneElector {
    key: String,
    master: AtomicBool,
    changes: broadcast::Sender<bool>,
}

impl StandaloneElector {
    pub fn new(config: &OnDemandConfig) -> Self {
        let (changes, _) = broadcast::channel(8);
        Self {
            key: format!("{}/{}", config.elector_service, config.elector_role),
            master: AtomicBool::new(false),
            changes,
        }
    }

    /// The leadership key this elector holds while started.
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Default for StandaloneElector {
    fn default() -> Self {
        Self::new(&OnDemandConfig::default())
    }
}

impl MasterElection for StandaloneElector {
    fn start_and_wait(&self) {
        self.master.store(true, Ordering::SeqCst);
        info!(key = %self.key, "assuming standalone leadership");
        let _ = self.changes.send(true);
    }

    fn stop(&self) {
        self.master.store(false, Ordering::SeqCst);
        debug!(key = %self.key, "released standalone leadership");
        let _ = self.changes.send(false);
    }

    fn is_master(&self) -> bool {
        self.master.load(Ordering::SeqCst)
    }

    fn subscribe(&self) -> broadcast::Receiver<bool> {
        self.changes.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_standalone_lifecycle() {
        let elector = StandaloneElector::new(&OnDemandConfig::default());
        assert_eq!(elector.key(), "analyzer/ondemand-client");
        assert!(!elector.is_master());

        let mut changes = elector.subscribe();
        elector.start_and_wait();
        assert!(elector.is_master());
        assert!(changes.recv().await.unwrap());

        elector.stop();
        assert!(!elector.is_master());
        assert!(!changes.recv().await.unwrap());
    }

    #[test]
    fn test_key_follows_the_configuration() {
        let config = OnDemandConfig {
            elector_service: "agent".to_string(),
            elector_role: "flow-client".to_string(),
            ..OnDemandConfig::default()
        };
        assert_eq!(StandaloneElector::new(&config).key(), "agent/flow-client");
    }
}
