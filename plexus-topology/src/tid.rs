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

//! Stable topology identifiers.
//!
//! The TID mapper is a graph listener that assigns every node a
//! content-addressed identifier surviving restarts and topology churn.
//! Root-like nodes (hosts, namespaces, OVS ports, fabric nodes) hash
//! their own discovery material; every other node hashes its ownership
//! parent's TID together with its own name and type, so identical
//! ownership chains always produce identical TIDs.

use parking_lot::Mutex;
use plexus_graph::{
    keys, Edge, Filter, Graph, GraphEventListener, GraphTxn, Identifier, Node,
    OWNERSHIP_RELATION,
};
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

/// Graph listener computing and writing `TID` metadata.
///
/// Idempotent: recomputing a TID from the same material writes nothing
/// and emits no event. Nodes whose ownership parent has no TID yet are
/// left alone; a later edge or parent assignment retriggers them.
pub struct TidMapper {
    host_id: Mutex<Option<Identifier>>,
}

impl TidMapper {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            host_id: Mutex::new(None),
        })
    }

    /// Attach to `graph` and start reacting to its events. Keep a clone
    /// of the handle around to `stop` later.
    pub fn start(self: Arc<Self>, graph: &Graph) {
        graph.add_event_listener(self);
    }

    pub fn stop(self: Arc<Self>, graph: &Graph) {
        let listener: Arc<dyn GraphEventListener> = self;
        graph.remove_event_listener(&listener);
    }

    /// UUIDv5 over the OID namespace, the content address of every TID.
    fn hash_tid(material: &str) -> String {
        Uuid::new_v5(&Uuid::NAMESPACE_OID, material.as_bytes()).to_string()
    }

    fn ownership() -> Filter {
        Filter::new().eq(keys::RELATION_TYPE, OWNERSHIP_RELATION)
    }

    /// Derive `child`'s TID from its parent's, then recurse into the
    /// child's own ownership children.
    fn set_tid(&self, txn: &mut GraphTxn<'_>, parent: &Node, child: &Node) {
        let Some(node_type) = child.node_type().filter(|s| !s.is_empty()) else {
            return;
        };
        let Some(name) = child.get_string(keys::NAME).filter(|s| !s.is_empty()) else {
            return;
        };
        let Some(parent_tid) = parent.get_string(keys::TID).filter(|s| !s.is_empty()) else {
            return;
        };

        let tid = Self::hash_tid(&format!("{parent_tid}{name}{node_type}"));
        if child.get_string(keys::TID) == Some(tid.as_str()) {
            return;
        }
        if let Err(error) = txn.add_node_metadata(&child.id, keys::TID, tid) {
            warn!(node = %child.id, %error, "failed to assign tid");
            return;
        }
        if let Some(updated) = txn.get_node(&child.id) {
            self.set_children_tid(txn, &updated);
        }
    }

    fn set_children_tid(&self, txn: &mut GraphTxn<'_>, parent: &Node) {
        for child in txn.lookup_children(&parent.id, &Filter::new(), &Self::ownership()) {
            self.set_tid(txn, parent, &child);
        }
    }

    /// Assign a root TID and propagate to ownership children.
    fn set_root_tid(&self, txn: &mut GraphTxn<'_>, node: &Node, tid: String) {
        if txn.add_node_metadata(&node.id, keys::TID, tid).is_err() {
            return;
        }
        if let Some(updated) = txn.get_node(&node.id) {
            self.set_children_tid(txn, &updated);
        }
    }

    fn on_node_event(&self, txn: &mut GraphTxn<'_>, node: &Node) {
        if node.get_string(keys::TID).map_or(false, |t| !t.is_empty()) {
            return;
        }
        let Some(node_type) = node.node_type().filter(|s| !s.is_empty()) else {
            return;
        };

        match node_type {
            "host" => {
                *self.host_id.lock() = Some(node.id.clone());
                self.set_root_tid(txn, node, node.id.clone());
            }
            "netns" => {
                let Some(path) = node.get_string(keys::PATH).filter(|s| !s.is_empty()) else {
                    return;
                };
                let host_id = self.host_id.lock().clone().unwrap_or_default();
                let tid = Self::hash_tid(&format!("{host_id}{path}{node_type}"));
                self.set_root_tid(txn, node, tid);
            }
            "ovsport" => {
                let Some(port_uuid) = node.get_string(keys::UUID).filter(|s| !s.is_empty())
                else {
                    return;
                };
                let host_id = self.host_id.lock().clone().unwrap_or_default();
                let tid = Self::hash_tid(&format!("{host_id}{port_uuid}{node_type}"));
                self.set_root_tid(txn, node, tid);
            }
            _ => {
                if node.get_string(keys::PROBE) == Some("fabric") {
                    self.set_root_tid(txn, node, node.id.clone());
                    return;
                }
                let parents = txn.lookup_parents(&node.id, &Filter::new(), &Self::ownership());
                if parents.len() > 1 {
                    warn!(node = %node.id, "node has more than one ownership parent");
                }
                if let Some(parent) = parents.first() {
                    self.set_tid(txn, parent, node);
                }
            }
        }
    }

    fn on_edge_event(&self, txn: &mut GraphTxn<'_>, edge: &Edge) {
        if !edge.is_ownership() {
            return;
        }
        let (parent, child) = txn.get_edge_nodes(edge, &Filter::new(), &Filter::new());
        let (Some(parent), Some(child)) = (parent, child) else {
            return;
        };
        self.set_tid(txn, &parent, &child);
    }
}

impl GraphEventListener for TidMapper {
    fn on_node_added(&self, txn: &mut GraphTxn<'_>, node: &Node) {
        self.on_node_event(txn, node);
    }

    fn on_node_updated(&self, txn: &mut GraphTxn<'_>, node: &Node) {
        self.on_node_event(txn, node);
    }

    fn on_edge_added(&self, txn: &mut GraphTxn<'_>, edge: &Edge) {
        self.on_edge_event(txn, edge);
    }

    fn on_edge_updated(&self, txn: &mut GraphTxn<'_>, edge: &Edge) {
        self.on_edge_event(txn, edge);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plexus_graph::Metadata;

    fn expected(material: &str) -> String {
        Uuid::new_v5(&Uuid::NAMESPACE_OID, material.as_bytes()).to_string()
    }

    fn tid_of(graph: &Graph, id: &str) -> Option<String> {
        graph
            .get_node(id)
            .and_then(|n| n.get_string(keys::TID).map(str::to_string))
    }

    fn ownership_edge(graph: &Graph, id: &str, parent: &str, child: &str) {
        graph
            .add_edge(Edge::new(
                id,
                parent,
                child,
                "host-1",
                Metadata::new().with(keys::RELATION_TYPE, OWNERSHIP_RELATION),
            ))
            .unwrap();
    }

    fn add_host(graph: &Graph, id: &str) {
        graph
            .add_node(Node::new(
                id,
                id,
                Metadata::new().with(keys::TYPE, "host").with(keys::NAME, id),
            ))
            .unwrap();
    }

    #[test]
    fn test_host_tid_is_the_node_id() {
        let graph = Graph::new("host-1");
        TidMapper::new().start(&graph);
        add_host(&graph, "host-1");
        assert_eq!(tid_of(&graph, "host-1"), Some("host-1".to_string()));
    }

    #[test]
    fn test_netns_tid_hashes_host_path_and_type() {
        let graph = Graph::new("host-1");
        TidMapper::new().start(&graph);
        add_host(&graph, "host-1");
        graph
            .add_node(Node::new(
                "ns1",
                "host-1",
                Metadata::new()
                    .with(keys::TYPE, "netns")
                    .with(keys::NAME, "x")
                    .with(keys::PATH, "/var/run/netns/x"),
            ))
            .unwrap();
        ownership_edge(&graph, "e1", "host-1", "ns1");

        assert_eq!(
            tid_of(&graph, "ns1"),
            Some(expected("host-1/var/run/netns/xnetns"))
        );
    }

    #[test]
    fn test_tids_are_deterministic_across_restarts() {
        let build = || {
            let graph = Graph::new("host-1");
            TidMapper::new().start(&graph);
            add_host(&graph, "host-1");
            graph
                .add_node(Node::new(
                    "ns1",
                    "host-1",
                    Metadata::new()
                        .with(keys::TYPE, "netns")
                        .with(keys::NAME, "x")
                        .with(keys::PATH, "/var/run/netns/x"),
                ))
                .unwrap();
            ownership_edge(&graph, "e1", "host-1", "ns1");
            tid_of(&graph, "ns1")
        };
        assert_eq!(build(), build());
        assert!(build().is_some());
    }

    #[test]
    fn test_ovsport_tid_hashes_host_uuid_and_type() {
        let graph = Graph::new("host-1");
        TidMapper::new().start(&graph);
        add_host(&graph, "host-1");
        graph
            .add_node(Node::new(
                "p1",
                "host-1",
                Metadata::new()
                    .with(keys::TYPE, "ovsport")
                    .with(keys::NAME, "eth0")
                    .with(keys::UUID, "uuid-1"),
            ))
            .unwrap();

        assert_eq!(tid_of(&graph, "p1"), Some(expected("host-1uuid-1ovsport")));
    }

    #[test]
    fn test_fabric_probe_tid_is_the_node_id() {
        let graph = Graph::new("host-1");
        TidMapper::new().start(&graph);
        graph
            .add_node(Node::new(
                "f1",
                "host-1",
                Metadata::new()
                    .with(keys::TYPE, "port")
                    .with(keys::NAME, "fab0")
                    .with(keys::PROBE, "fabric"),
            ))
            .unwrap();

        assert_eq!(tid_of(&graph, "f1"), Some("f1".to_string()));
    }

    #[test]
    fn test_ownership_chain_propagates_recursively() {
        let graph = Graph::new("host-1");
        TidMapper::new().start(&graph);

        // Build the chain bottom-up so nothing can be derived until the
        // host finally shows up.
        graph
            .add_node(Node::new(
                "br0",
                "host-1",
                Metadata::new()
                    .with(keys::TYPE, "ovsbridge")
                    .with(keys::NAME, "br0"),
            ))
            .unwrap();
        graph
            .add_node(Node::new(
                "veth0",
                "host-1",
                Metadata::new().with(keys::TYPE, "veth").with(keys::NAME, "veth0"),
            ))
            .unwrap();
        ownership_edge(&graph, "e1", "br0", "veth0");
        assert_eq!(tid_of(&graph, "br0"), None);
        assert_eq!(tid_of(&graph, "veth0"), None);

        add_host(&graph, "host-1");
        ownership_edge(&graph, "e2", "host-1", "br0");

        let bridge_tid = expected("host-1br0ovsbridge");
        assert_eq!(tid_of(&graph, "br0"), Some(bridge_tid.clone()));
        assert_eq!(
            tid_of(&graph, "veth0"),
            Some(expected(&format!("{bridge_tid}veth0veth")))
        );
    }

    #[test]
    fn test_multiple_ownership_parents_use_the_first() {
        let graph = Graph::new("host-1");
        TidMapper::new().start(&graph);
        add_host(&graph, "h1");
        add_host(&graph, "h2");
        // No name yet, so the edge events cannot derive a TID.
        graph
            .add_node(Node::new(
                "c1",
                "host-1",
                Metadata::new().with(keys::TYPE, "veth"),
            ))
            .unwrap();
        ownership_edge(&graph, "e1", "h1", "c1");
        ownership_edge(&graph, "e2", "h2", "c1");
        assert_eq!(tid_of(&graph, "c1"), None);

        // Naming the node retriggers the mapper, which resolves the
        // constraint violation by using the first parent.
        graph.add_node_metadata("c1", keys::NAME, "c1").unwrap();
        assert_eq!(tid_of(&graph, "c1"), Some(expected("h1c1veth")));
    }

    #[test]
    fn test_stopped_mapper_no_longer_assigns() {
        let graph = Graph::new("host-1");
        let mapper = TidMapper::new();
        mapper.clone().start(&graph);
        mapper.stop(&graph);

        add_host(&graph, "host-1");
        assert_eq!(tid_of(&graph, "host-1"), None);
    }

    #[test]
    fn test_recompute_is_idempotent() {
        let graph = Graph::new("host-1");
        TidMapper::new().start(&graph);
        add_host(&graph, "host-1");
        graph
            .add_node(Node::new(
                "br0",
                "host-1",
                Metadata::new()
                    .with(keys::TYPE, "ovsbridge")
                    .with(keys::NAME, "br0"),
            ))
            .unwrap();
        ownership_edge(&graph, "e1", "host-1", "br0");

        let before = tid_of(&graph, "br0");
        let revision = graph.get_node("br0").unwrap().revision;

        // An unrelated update retriggers the mapper without effect.
        graph.add_node_metadata("br0", "MTU", 1500).unwrap();
        assert_eq!(tid_of(&graph, "br0"), before);
        assert_eq!(graph.get_node("br0").unwrap().revision, revision + 1);
    }
}
