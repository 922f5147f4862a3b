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

//! The capture orchestrator.
//!
//! Converges the probes running on agents onto the set of (capture,
//! node) pairs implied by evaluating each capture's traversal query
//! against the current graph. Ground truth for "a probe runs on node N"
//! is the node's `Capture/ID` metadata, written back by the agent, so a
//! lost dispatch is healed by the next reconciliation rather than
//! retried.
//!
//! All outbound work is gated on leadership. Leadership flapping is
//! tolerated by construction: work while not master is a no-op, work
//! done as master is left in place, and a freshly elected master resyncs
//! its capture mirror from the registry before reconciling.

use crate::bus::{BusMessage, MessageBus};
use crate::capture::Capture;
use crate::config::OnDemandConfig;
use crate::elector::MasterElection;
use crate::messages::{CaptureQuery, CAPTURE_ADDED, CAPTURE_DELETED, CAPTURE_START, CAPTURE_STOP};
use crate::registry::{CaptureEvent, CaptureRegistry, WatchAction};
use parking_lot::Mutex;
use plexus_graph::{keys, Edge, Graph, GraphEventListener, GraphTxn, Node};
use plexus_query::{QueryExecutor, TraversalResult};
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Forwards graph mutations into the reconciliation channel. Evaluating
/// queries needs the graph read lock, so nothing happens inside the
/// listener callback itself.
struct GraphEventRelay {
    notify: mpsc::UnboundedSender<()>,
}

impl GraphEventListener for GraphEventRelay {
    fn on_node_added(&self, _txn: &mut GraphTxn<'_>, _node: &Node) {
        let _ = self.notify.send(());
    }

    fn on_node_updated(&self, _txn: &mut GraphTxn<'_>, _node: &Node) {
        let _ = self.notify.send(());
    }

    fn on_edge_added(&self, _txn: &mut GraphTxn<'_>, _edge: &Edge) {
        let _ = self.notify.send(());
    }
}

struct Inner {
    graph: Graph,
    registry: Arc<dyn CaptureRegistry>,
    bus: Arc<dyn MessageBus>,
    elector: Arc<dyn MasterElection>,
    executor: Arc<dyn QueryExecutor>,
    config: OnDemandConfig,
    /// Mirror of the registry, keyed by capture UUID. The mutex also
    /// serializes probe registration fan-out.
    captures: Mutex<HashMap<String, Capture>>,
    /// Back-reference for spawning registration tasks from `&self`.
    handle: Weak<Inner>,
}

impl Inner {
    fn on_watch_event(&self, event: CaptureEvent) {
        debug!(action = %event.action, id = %event.id, "capture registry event");
        if !self.elector.is_master() {
            return;
        }
        match event.action {
            WatchAction::Init | WatchAction::Create | WatchAction::Set | WatchAction::Update => {
                self.bus.broadcast(BusMessage::new(
                    &self.config.namespace,
                    CAPTURE_ADDED,
                    &event.capture,
                ));
                self.on_capture_added(event.capture);
            }
            WatchAction::Expire | WatchAction::Delete => {
                self.bus.broadcast(BusMessage::new(
                    &self.config.namespace,
                    CAPTURE_DELETED,
                    &event.capture,
                ));
                self.on_capture_deleted(&event.capture);
            }
        }
    }

    fn on_capture_added(&self, capture: Capture) {
        self.captures
            .lock()
            .insert(capture.uuid.clone(), capture.clone());
        let results = self.resolve(&capture.gremlin_query);
        if !results.is_empty() {
            self.spawn_registration(results, capture);
        }
    }

    fn on_capture_deleted(&self, capture: &Capture) {
        self.captures.lock().remove(&capture.uuid);
        // Stops are sent to every resolved node, bound or not; agents
        // treat CaptureStop as idempotent.
        for result in self.resolve(&capture.gremlin_query) {
            match result {
                TraversalResult::Node(node) => {
                    if !self.unregister_probe(&node) {
                        error!(node = %node.id, "failed to stop capture");
                    }
                }
                TraversalResult::NodeList(nodes) => {
                    for node in nodes {
                        if !self.unregister_probe(&node) {
                            error!(node = %node.id, "failed to stop capture");
                        }
                    }
                }
                _ => {}
            }
        }
    }

    /// Re-evaluate every known capture after a graph mutation. Stale
    /// bindings are not stopped here; they disappear with the node, the
    /// capture, or the agent's own report.
    fn on_graph_event(&self) {
        if !self.elector.is_master() {
            return;
        }
        let captures: Vec<Capture> = self.captures.lock().values().cloned().collect();
        for capture in captures {
            let results = self.resolve(&capture.gremlin_query);
            if !results.is_empty() {
                self.spawn_registration(results, capture);
            }
        }
    }

    /// Rebuild the capture mirror from the registry and reconcile, run
    /// whenever this process gains leadership.
    fn resync(&self) {
        if !self.elector.is_master() {
            return;
        }
        let snapshot = self.registry.index();
        info!(captures = snapshot.len(), "resynchronizing after leadership change");
        {
            let mut captures = self.captures.lock();
            captures.clear();
            for capture in &snapshot {
                captures.insert(capture.uuid.clone(), capture.clone());
            }
        }
        for capture in snapshot {
            let results = self.resolve(&capture.gremlin_query);
            if !results.is_empty() {
                self.spawn_registration(results, capture);
            }
        }
    }

    fn resolve(&self, query: &str) -> Vec<TraversalResult> {
        match self.executor.execute(&self.graph, query) {
            Ok(results) => results,
            Err(error) => {
                error!(%error, query, "gremlin error");
                Vec::new()
            }
        }
    }

    /// Run one registration pass in its own task so event dispatch is
    /// never blocked behind probe fan-out.
    fn spawn_registration(&self, results: Vec<TraversalResult>, capture: Capture) {
        let Some(inner) = self.handle.upgrade() else {
            return;
        };
        tokio::spawn(async move {
            inner.register_probes(&results, &capture);
        });
    }

    /// Send a start to every resolved node that is not already bound.
    /// Within a shortest-path result the first bound node short-circuits
    /// the rest of that path; iteration then continues with the next
    /// result.
    fn register_probes(&self, results: &[TraversalResult], capture: &Capture) {
        if !self.elector.is_master() {
            return;
        }
        let _serialized = self.captures.lock();
        for result in results {
            match result {
                TraversalResult::Node(node) => {
                    self.register_node(node, capture);
                }
                TraversalResult::NodeList(nodes) => {
                    for node in nodes {
                        if self.register_node(node, capture) {
                            break;
                        }
                    }
                }
                _ => {}
            }
        }
    }

    /// Returns true when the node already carries a probe binding.
    fn register_node(&self, node: &Node, capture: &Capture) -> bool {
        // Consult the current graph: the resolved set may be stale.
        let Some(current) = self.graph.get_node(&node.id) else {
            return false;
        };
        if current.metadata.contains_key(keys::CAPTURE_ID) {
            return true;
        }
        self.register_probe(&current.id, &current.host, capture);
        false
    }

    fn register_probe(&self, node_id: &str, host: &str, capture: &Capture) -> bool {
        let payload = CaptureQuery {
            node_id: node_id.to_string(),
            capture: capture.clone(),
        };
        let message = BusMessage::new(&self.config.namespace, CAPTURE_START, &payload);
        if !self.bus.send_to(host, message) {
            error!(host, "unable to send capture start to agent");
            return false;
        }
        true
    }

    fn unregister_probe(&self, node: &Node) -> bool {
        let payload = CaptureQuery {
            node_id: node.id.clone(),
            capture: Capture::default(),
        };
        let message = BusMessage::new(&self.config.namespace, CAPTURE_STOP, &payload);
        if !self.bus.send_to(&node.host, message) {
            error!(host = %node.host, "unable to send capture stop to agent");
            return false;
        }
        true
    }
}

/// Watches the capture registry and the graph under leader election and
/// dispatches probe start/stop commands to the owning agents.
pub struct CaptureOrchestrator {
    inner: Arc<Inner>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    relay: Mutex<Option<Arc<dyn GraphEventListener>>>,
}

impl CaptureOrchestrator {
    pub fn new(
        graph: Graph,
        registry: Arc<dyn CaptureRegistry>,
        bus: Arc<dyn MessageBus>,
        elector: Arc<dyn MasterElection>,
        executor: Arc<dyn QueryExecutor>,
        config: OnDemandConfig,
    ) -> Self {
        let captures: HashMap<String, Capture> = registry
            .index()
            .into_iter()
            .map(|capture| (capture.uuid.clone(), capture))
            .collect();
        let inner = Arc::new_cyclic(|handle| Inner {
            graph,
            registry,
            bus,
            elector,
            executor,
            config,
            captures: Mutex::new(captures),
            handle: handle.clone(),
        });
        Self {
            inner,
            tasks: Mutex::new(Vec::new()),
            relay: Mutex::new(None),
        }
    }

    /// Enter the election, open the registry watch and attach to the
    /// graph. Must run inside a tokio runtime.
    pub fn start(&self) {
        self.inner.elector.start_and_wait();

        let mut watch = self.inner.registry.watch();
        let inner = Arc::clone(&self.inner);
        let watcher = tokio::spawn(async move {
            while let Some(event) = watch.recv().await {
                inner.on_watch_event(event);
            }
        });

        let (notify, mut graph_events) = mpsc::unbounded_channel();
        let relay: Arc<dyn GraphEventListener> = Arc::new(GraphEventRelay { notify });
        self.inner.graph.add_event_listener(relay.clone());
        *self.relay.lock() = Some(relay);

        let inner = Arc::clone(&self.inner);
        let reconciler = tokio::spawn(async move {
            while graph_events.recv().await.is_some() {
                inner.on_graph_event();
            }
        });

        let mut leadership = self.inner.elector.subscribe();
        let inner = Arc::clone(&self.inner);
        let resyncer = tokio::spawn(async move {
            loop {
                match leadership.recv().await {
                    Ok(true) => inner.resync(),
                    Ok(false) => {}
                    Err(broadcast::error::RecvError::Lagged(_)) => {}
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        self.tasks.lock().extend([watcher, reconciler, resyncer]);
    }

    /// Detach from the graph, halt the watchers and release leadership.
    /// In-flight dispatches complete or are abandoned.
    pub fn stop(&self) {
        if let Some(relay) = self.relay.lock().take() {
            self.inner.graph.remove_event_listener(&relay);
        }
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
        self.inner.elector.stop();
    }

    /// The capture specifications currently mirrored in memory.
    pub fn known_captures(&self) -> Vec<Capture> {
        self.inner.captures.lock().values().cloned().collect()
    }
}
