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

//! Ownership-path helpers.

use plexus_graph::{keys, Filter, Graph, Node, OWNERSHIP_RELATION};
use std::collections::HashMap;
use std::fmt;

/// A node-to-root path through ownership edges.
pub struct NodePath(pub Vec<Node>);

impl NodePath {
    /// Render the path outermost owner first, e.g.
    /// `host-1[Type=host]/vm1[Type=netns]/eth0[Type=veth]`. Any node
    /// missing a name or type yields the empty string.
    pub fn marshal(&self) -> String {
        let mut path = String::new();
        for node in self.0.iter().rev() {
            let (Some(name), Some(node_type)) =
                (node.get_string(keys::NAME), node.node_type())
            else {
                return String::new();
            };
            if !path.is_empty() {
                path.push('/');
            }
            path.push_str(name);
            path.push_str("[Type=");
            path.push_str(node_type);
            path.push(']');
        }
        path
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.marshal())
    }
}

/// The ownership path of `node` up to its host, rendered with
/// [`NodePath::marshal`]; empty when the node is not attached to a host.
pub fn graph_path(graph: &Graph, node: &Node) -> String {
    let nodes = graph.lookup_shortest_path(
        &node.id,
        &Filter::new().eq(keys::TYPE, "host"),
        &Filter::new().eq(keys::RELATION_TYPE, OWNERSHIP_RELATION),
    );
    if nodes.is_empty() {
        return String::new();
    }
    NodePath(nodes).marshal()
}

/// Host label to the TIDs of its nodes, used to address per-host agent
/// work.
pub type HostNodeTidMap = HashMap<String, Vec<String>>;

pub fn build_host_node_tid_map(nodes: &[Node]) -> HostNodeTidMap {
    let mut map = HostNodeTidMap::new();
    for node in nodes {
        if let Some(tid) = node.get_string(keys::TID).filter(|t| !t.is_empty()) {
            map.entry(node.host.clone()).or_default().push(tid.to_string());
        }
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use plexus_graph::{Edge, Metadata};

    fn node(id: &str, host: &str, node_type: &str) -> Node {
        Node::new(
            id,
            host,
            Metadata::new().with(keys::TYPE, node_type).with(keys::NAME, id),
        )
    }

    #[test]
    fn test_marshal_renders_owner_first() {
        let path = NodePath(vec![
            node("eth0", "host-1", "veth"),
            node("vm1", "host-1", "netns"),
            node("host-1", "host-1", "host"),
        ]);
        assert_eq!(
            path.marshal(),
            "host-1[Type=host]/vm1[Type=netns]/eth0[Type=veth]"
        );
    }

    #[test]
    fn test_marshal_requires_name_and_type() {
        let anonymous = Node::new("x", "host-1", Metadata::new().with(keys::TYPE, "veth"));
        let path = NodePath(vec![anonymous, node("host-1", "host-1", "host")]);
        assert_eq!(path.marshal(), "");
    }

    #[test]
    fn test_graph_path_follows_ownership_to_the_host() {
        let graph = Graph::new("host-1");
        graph.add_node(node("host-1", "host-1", "host")).unwrap();
        graph.add_node(node("ns1", "host-1", "netns")).unwrap();
        graph.add_node(node("eth0", "host-1", "veth")).unwrap();
        let ownership = Metadata::new().with(keys::RELATION_TYPE, OWNERSHIP_RELATION);
        graph
            .add_edge(Edge::new("e1", "host-1", "ns1", "host-1", ownership.clone()))
            .unwrap();
        graph
            .add_edge(Edge::new("e2", "ns1", "eth0", "host-1", ownership))
            .unwrap();

        let leaf = graph.get_node("eth0").unwrap();
        assert_eq!(
            graph_path(&graph, &leaf),
            "host-1[Type=host]/ns1[Type=netns]/eth0[Type=veth]"
        );

        let orphan = Node::new("lone", "host-1", Metadata::new());
        graph.add_node(orphan.clone()).unwrap();
        assert_eq!(graph_path(&graph, &orphan), "");
    }

    #[test]
    fn test_host_node_tid_map_groups_by_host() {
        let mut a = node("a", "host-1", "veth");
        a.metadata.insert(keys::TID, "tid-a");
        let mut b = node("b", "host-2", "veth");
        b.metadata.insert(keys::TID, "tid-b");
        let untagged = node("c", "host-1", "veth");

        let map = build_host_node_tid_map(&[a, b, untagged]);
        assert_eq!(map.len(), 2);
        assert_eq!(map["host-1"], vec!["tid-a"]);
        assert_eq!(map["host-2"], vec!["tid-b"]);
    }
}
