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

//! Message bus contract.
//!
//! Dispatch is fire-and-acknowledge: `send_to` reports synchronously
//! whether the message was handed to the target host's transport,
//! blocking up to the configured delivery timeout when the transport is
//! saturated. A timed-out delivery reports `false` and callers rely on
//! reconciliation instead of retrying.

use crate::config::OnDemandConfig;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::thread;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::error;

/// Per-host delivery queue depth before `send_to` starts blocking.
const ENDPOINT_BUFFER: usize = 256;

/// A namespaced, typed JSON envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusMessage {
    #[serde(rename = "Namespace")]
    pub namespace: String,
    #[serde(rename = "Type")]
    pub message_type: String,
    #[serde(rename = "Obj")]
    pub payload: Value,
}

impl BusMessage {
    pub fn new(namespace: &str, message_type: &str, payload: &impl Serialize) -> Self {
        let payload = match serde_json::to_value(payload) {
            Ok(value) => value,
            Err(err) => {
                error!(message_type, error = %err, "failed to encode bus payload");
                Value::Null
            }
        };
        Self {
            namespace: namespace.to_string(),
            message_type: message_type.to_string(),
            payload,
        }
    }
}

/// Routing transport between analyzers and agents.
pub trait MessageBus: Send + Sync {
    /// Deliver to the agent identified by `host`. Returns false when the
    /// host is unknown or delivery fails; the caller does not retry.
    fn send_to(&self, host: &str, message: BusMessage) -> bool;

    /// Deliver to every connected endpoint and subscriber, best effort.
    fn broadcast(&self, message: BusMessage);
}

/// In-process bus routing messages over bounded per-host channels.
/// Directed sends block up to the configured dispatch timeout when an
/// endpoint's queue is full; broadcasts never block.
pub struct LocalBus {
    endpoints: DashMap<String, mpsc::Sender<BusMessage>>,
    subscribers: Mutex<Vec<mpsc::Sender<BusMessage>>>,
    dispatch_timeout: Duration,
}

impl LocalBus {
    pub fn new(config: &OnDemandConfig) -> Self {
        Self {
            endpoints: DashMap::new(),
            subscribers: Mutex::new(Vec::new()),
            dispatch_timeout: Duration::from_millis(config.dispatch_timeout_ms),
        }
    }

    /// Attach an agent endpoint for `host`, replacing any previous one.
    pub fn register(&self, host: impl Into<String>) -> mpsc::Receiver<BusMessage> {
        let (tx, rx) = mpsc::channel(ENDPOINT_BUFFER);
        self.endpoints.insert(host.into(), tx);
        rx
    }

    pub fn unregister(&self, host: &str) {
        self.endpoints.remove(host);
    }

    /// Attach a broadcast-only listener.
    pub fn subscribe(&self) -> mpsc::Receiver<BusMessage> {
        let (tx, rx) = mpsc::channel(ENDPOINT_BUFFER);
        self.subscribers.lock().push(tx);
        rx
    }
}

impl Default for LocalBus {
    fn default() -> Self {
        Self::new(&OnDemandConfig::default())
    }
}

impl MessageBus for LocalBus {
    fn send_to(&self, host: &str, message: BusMessage) -> bool {
        let Some(endpoint) = self.endpoints.get(host).map(|e| e.value().clone()) else {
            return false;
        };
        let deadline = Instant::now() + self.dispatch_timeout;
        let mut message = message;
        loop {
            match endpoint.try_send(message) {
                Ok(()) => return true,
                Err(TrySendError::Closed(_)) => return false,
                Err(TrySendError::Full(returned)) => {
                    if Instant::now() >= deadline {
                        return false;
                    }
                    message = returned;
                    thread::sleep(Duration::from_millis(1));
                }
            }
        }
    }

    fn broadcast(&self, message: BusMessage) {
        for endpoint in self.endpoints.iter() {
            let _ = endpoint.value().try_send(message.clone());
        }
        self.subscribers
            .lock()
            .retain(|subscriber| match subscriber.try_send(message.clone()) {
                Ok(()) | Err(TrySendError::Full(_)) => true,
                Err(TrySendError::Closed(_)) => false,
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_send_to_routes_by_host() {
        let bus = LocalBus::new(&OnDemandConfig::default());
        let mut rx = bus.register("host-1");

        let message = BusMessage::new("ondemand", "Ping", &serde_json::json!({"n": 1}));
        assert!(bus.send_to("host-1", message.clone()));
        assert_eq!(rx.recv().await.unwrap(), message);

        assert!(!bus.send_to("host-2", message));
    }

    #[tokio::test]
    async fn test_send_to_a_dropped_endpoint_fails() {
        let bus = LocalBus::new(&OnDemandConfig::default());
        let rx = bus.register("host-1");
        drop(rx);
        assert!(!bus.send_to("host-1", BusMessage::new("ondemand", "Ping", &())));
    }

    #[tokio::test]
    async fn test_send_to_times_out_on_a_saturated_endpoint() {
        let config = OnDemandConfig {
            dispatch_timeout_ms: 10,
            ..OnDemandConfig::default()
        };
        let bus = LocalBus::new(&config);
        // Keep the receiver alive but never drain it.
        let _rx = bus.register("host-1");

        let message = BusMessage::new("ondemand", "Ping", &());
        for _ in 0..ENDPOINT_BUFFER {
            assert!(bus.send_to("host-1", message.clone()));
        }
        assert!(!bus.send_to("host-1", message));
    }

    #[tokio::test]
    async fn test_broadcast_reaches_endpoints_and_subscribers() {
        let bus = LocalBus::new(&OnDemandConfig::default());
        let mut agent = bus.register("host-1");
        let mut watcher = bus.subscribe();

        bus.broadcast(BusMessage::new("ondemand", "Ping", &()));
        assert_eq!(agent.recv().await.unwrap().message_type, "Ping");
        assert_eq!(watcher.recv().await.unwrap().message_type, "Ping");
    }
}
