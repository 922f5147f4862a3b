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

//! Graph mutation events and listeners.

use crate::element::{Edge, Node};
use crate::graph::GraphTxn;

/// A committed graph mutation, carrying the element as of the commit.
#[derive(Debug, Clone, PartialEq)]
pub enum GraphEvent {
    NodeAdded(Node),
    NodeUpdated(Node),
    NodeDeleted(Node),
    EdgeAdded(Edge),
    EdgeUpdated(Edge),
    EdgeDeleted(Edge),
}

/// A listener attached to the graph.
///
/// Callbacks run on the mutating thread while the graph write lock is
/// held. The [`GraphTxn`] handle gives read access to the locked state
/// and event-emitting mutation access; a listener must not call the
/// lock-taking [`crate::Graph`] API from a callback — either use the
/// handle, or defer the work to another thread that re-acquires the
/// lock. Events caused by listener mutations are queued and dispatched
/// in commit order after the triggering event.
///
/// All methods default to no-ops so listeners implement only what they
/// observe.
#[allow(unused_variables)]
pub trait GraphEventListener: Send + Sync {
    fn on_node_added(&self, txn: &mut GraphTxn<'_>, node: &Node) {}
    fn on_node_updated(&self, txn: &mut GraphTxn<'_>, node: &Node) {}
    fn on_node_deleted(&self, txn: &mut GraphTxn<'_>, node: &Node) {}
    fn on_edge_added(&self, txn: &mut GraphTxn<'_>, edge: &Edge) {}
    fn on_edge_updated(&self, txn: &mut GraphTxn<'_>, edge: &Edge) {}
    fn on_edge_deleted(&self, txn: &mut GraphTxn<'_>, edge: &Edge) {}
}
