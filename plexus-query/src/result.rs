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

//! Polymorphic traversal results.

use plexus_graph::{Edge, Node};
use serde::Serialize;
use serde_json::Value;

/// One element of a traversal's output.
///
/// Most steps yield `Node` or `Edge` elements; shortest-path steps yield
/// a whole path per source as `NodeList`; terminal aggregations yield
/// `Value`. Consumers that target probes must handle both node shapes,
/// flattening `NodeList` where they act per node.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TraversalResult {
    Node(Node),
    NodeList(Vec<Node>),
    Edge(Edge),
    Value(Value),
}

impl TraversalResult {
    pub fn as_node(&self) -> Option<&Node> {
        match self {
            TraversalResult::Node(node) => Some(node),
            _ => None,
        }
    }

    pub fn as_node_list(&self) -> Option<&[Node]> {
        match self {
            TraversalResult::NodeList(nodes) => Some(nodes),
            _ => None,
        }
    }

    pub fn as_edge(&self) -> Option<&Edge> {
        match self {
            TraversalResult::Edge(edge) => Some(edge),
            _ => None,
        }
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            TraversalResult::Value(value) => Some(value),
            _ => None,
        }
    }
}
