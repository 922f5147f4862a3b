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

//! The in-memory property-graph store.
//!
//! A [`Graph`] is a cheap handle over shared state: clones share nodes,
//! edges and listeners but may carry different temporal contexts. One
//! reader-writer lock protects the whole store; mutators take it in write
//! mode and dispatch listener callbacks before releasing it, readers take
//! it in read mode, and a [`GraphView`] pins a read guard for the duration
//! of a query so results are a consistent snapshot.
//!
//! Deleted elements are archived with their existence window, which is
//! what time-sliced handles consult. Archived metadata is last-known;
//! per-revision metadata history is the job of an external store.

use crate::context::{GraphContext, TimeSlice};
use crate::element::{Edge, Identifier, Node};
use crate::error::{GraphError, Result};
use crate::event::{GraphEvent, GraphEventListener};
use crate::filters::Filter;
use crate::metadata::Metadata;
use chrono::Utc;
use parking_lot::{Mutex, RwLock, RwLockReadGuard};
use serde_json::Value;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

#[derive(Default)]
struct GraphState {
    nodes: HashMap<Identifier, Node>,
    edges: HashMap<Identifier, Edge>,
    // Insertion order of the live element sets. Kept separately so lookups
    // and shortest-path tie-breaking are deterministic.
    node_order: Vec<Identifier>,
    edge_order: Vec<Identifier>,
    archived_nodes: Vec<Node>,
    archived_edges: Vec<Edge>,
}

impl GraphState {
    fn visible_nodes(&self, ctx: &GraphContext) -> Vec<&Node> {
        let mut out: Vec<&Node> = self
            .node_order
            .iter()
            .filter_map(|id| self.nodes.get(id))
            .collect();
        if let Some(slice) = ctx.time_slice {
            out.retain(|n| n.visible_in(&slice));
            out.extend(self.archived_nodes.iter().filter(|n| n.visible_in(&slice)));
        }
        out
    }

    fn visible_edges(&self, ctx: &GraphContext) -> Vec<&Edge> {
        let mut out: Vec<&Edge> = self
            .edge_order
            .iter()
            .filter_map(|id| self.edges.get(id))
            .collect();
        if let Some(slice) = ctx.time_slice {
            out.retain(|e| e.visible_in(&slice));
            out.extend(self.archived_edges.iter().filter(|e| e.visible_in(&slice)));
        }
        out
    }

    fn get_node(&self, id: &str, ctx: &GraphContext) -> Option<&Node> {
        match ctx.time_slice {
            None => self.nodes.get(id),
            Some(slice) => self
                .nodes
                .get(id)
                .filter(|n| n.visible_in(&slice))
                .or_else(|| {
                    self.archived_nodes
                        .iter()
                        .rev()
                        .find(|n| n.id == id && n.visible_in(&slice))
                }),
        }
    }

    fn get_edge(&self, id: &str, ctx: &GraphContext) -> Option<&Edge> {
        match ctx.time_slice {
            None => self.edges.get(id),
            Some(slice) => self
                .edges
                .get(id)
                .filter(|e| e.visible_in(&slice))
                .or_else(|| {
                    self.archived_edges
                        .iter()
                        .rev()
                        .find(|e| e.id == id && e.visible_in(&slice))
                }),
        }
    }

    fn get_nodes(&self, filter: &Filter, ctx: &GraphContext) -> Vec<Node> {
        self.visible_nodes(ctx)
            .into_iter()
            .filter(|n| filter.matches(&n.metadata))
            .cloned()
            .collect()
    }

    fn get_edges(&self, filter: &Filter, ctx: &GraphContext) -> Vec<Edge> {
        self.visible_edges(ctx)
            .into_iter()
            .filter(|e| filter.matches(&e.metadata))
            .cloned()
            .collect()
    }

    fn node_edges(&self, id: &str, filter: &Filter, ctx: &GraphContext) -> Vec<Edge> {
        self.visible_edges(ctx)
            .into_iter()
            .filter(|e| (e.parent == id || e.child == id) && filter.matches(&e.metadata))
            .cloned()
            .collect()
    }

    fn edge_nodes(
        &self,
        edge: &Edge,
        parent_filter: &Filter,
        child_filter: &Filter,
        ctx: &GraphContext,
    ) -> (Option<Node>, Option<Node>) {
        let parent = self
            .get_node(&edge.parent, ctx)
            .filter(|n| parent_filter.matches(&n.metadata))
            .cloned();
        let child = self
            .get_node(&edge.child, ctx)
            .filter(|n| child_filter.matches(&n.metadata))
            .cloned();
        (parent, child)
    }

    fn lookup_children(
        &self,
        id: &str,
        node_filter: &Filter,
        edge_filter: &Filter,
        ctx: &GraphContext,
    ) -> Vec<Node> {
        self.node_edges(id, edge_filter, ctx)
            .into_iter()
            .filter(|e| e.parent == id)
            .filter_map(|e| self.get_node(&e.child, ctx))
            .filter(|n| node_filter.matches(&n.metadata))
            .cloned()
            .collect()
    }

    fn lookup_parents(
        &self,
        id: &str,
        node_filter: &Filter,
        edge_filter: &Filter,
        ctx: &GraphContext,
    ) -> Vec<Node> {
        self.node_edges(id, edge_filter, ctx)
            .into_iter()
            .filter(|e| e.child == id)
            .filter_map(|e| self.get_node(&e.parent, ctx))
            .filter(|n| node_filter.matches(&n.metadata))
            .cloned()
            .collect()
    }

    /// Breadth-first search over the undirected projection of the edges
    /// admitted by `edge_filter`, stopping at the first node matching
    /// `target`. Ties are broken by edge insertion order. The returned
    /// path is source-to-target inclusive, empty when unreachable.
    fn lookup_shortest_path(
        &self,
        source: &str,
        target: &Filter,
        edge_filter: &Filter,
        ctx: &GraphContext,
    ) -> Vec<Node> {
        let Some(src) = self.get_node(source, ctx) else {
            return Vec::new();
        };
        if target.matches(&src.metadata) {
            return vec![src.clone()];
        }

        let mut prev: HashMap<Identifier, Identifier> = HashMap::new();
        let mut visited: HashSet<Identifier> = HashSet::new();
        visited.insert(source.to_string());
        let mut frontier: VecDeque<Identifier> = VecDeque::new();
        frontier.push_back(source.to_string());

        while let Some(current) = frontier.pop_front() {
            for edge in self.node_edges(&current, edge_filter, ctx) {
                let Some(next) = edge.other_end(&current) else {
                    continue;
                };
                if visited.contains(next) {
                    continue;
                }
                let Some(node) = self.get_node(next, ctx) else {
                    continue;
                };
                visited.insert(next.clone());
                prev.insert(next.clone(), current.clone());

                if target.matches(&node.metadata) {
                    let mut path = vec![node.clone()];
                    let mut cursor = next.clone();
                    while let Some(before) = prev.get(&cursor) {
                        if let Some(n) = self.get_node(before, ctx) {
                            path.push(n.clone());
                        }
                        cursor = before.clone();
                    }
                    path.reverse();
                    return path;
                }
                frontier.push_back(next.clone());
            }
        }
        Vec::new()
    }

    fn apply_add_node(&mut self, node: Node) -> Result<GraphEvent> {
        if self.nodes.contains_key(&node.id) {
            return Err(GraphError::NodeConflict(node.id));
        }
        self.node_order.push(node.id.clone());
        let event = GraphEvent::NodeAdded(node.clone());
        self.nodes.insert(node.id.clone(), node);
        Ok(event)
    }

    fn apply_add_edge(&mut self, edge: Edge) -> Result<GraphEvent> {
        if self.edges.contains_key(&edge.id) {
            return Err(GraphError::EdgeConflict(edge.id));
        }
        for end in [&edge.parent, &edge.child] {
            if !self.nodes.contains_key(end) {
                return Err(GraphError::MissingEndpoint {
                    edge: edge.id.clone(),
                    node: end.clone(),
                });
            }
        }
        if edge.is_ownership()
            && self
                .edges
                .values()
                .any(|e| e.child == edge.child && e.is_ownership())
        {
            warn!(node = %edge.child, "node already has an ownership parent");
        }
        self.edge_order.push(edge.id.clone());
        let event = GraphEvent::EdgeAdded(edge.clone());
        self.edges.insert(edge.id.clone(), edge);
        Ok(event)
    }

    fn apply_del_node(&mut self, id: &str, now: i64) -> Result<Vec<GraphEvent>> {
        if !self.nodes.contains_key(id) {
            return Err(GraphError::NodeNotFound(id.to_string()));
        }
        let incident: Vec<Identifier> = self
            .edge_order
            .iter()
            .filter(|eid| {
                self.edges
                    .get(*eid)
                    .map_or(false, |e| e.parent == id || e.child == id)
            })
            .cloned()
            .collect();

        let mut events = Vec::with_capacity(incident.len() + 1);
        for eid in &incident {
            if let Ok(event) = self.apply_del_edge(eid, now) {
                events.push(event);
            }
        }

        let Some(mut node) = self.nodes.remove(id) else {
            return Err(GraphError::NodeNotFound(id.to_string()));
        };
        self.node_order.retain(|n| n != id);
        node.deleted_at = Some(now);
        events.push(GraphEvent::NodeDeleted(node.clone()));
        self.archived_nodes.push(node);
        Ok(events)
    }

    fn apply_del_edge(&mut self, id: &str, now: i64) -> Result<GraphEvent> {
        let Some(mut edge) = self.edges.remove(id) else {
            return Err(GraphError::EdgeNotFound(id.to_string()));
        };
        self.edge_order.retain(|e| e != id);
        edge.deleted_at = Some(now);
        let event = GraphEvent::EdgeDeleted(edge.clone());
        self.archived_edges.push(edge);
        Ok(event)
    }

    fn apply_node_metadata(
        &mut self,
        id: &str,
        key: &str,
        value: Value,
        now: i64,
    ) -> Result<Option<GraphEvent>> {
        let Some(node) = self.nodes.get_mut(id) else {
            return Err(GraphError::NodeNotFound(id.to_string()));
        };
        if node.metadata.get(key) == Some(&value) {
            return Ok(None);
        }
        node.metadata.insert(key, value);
        node.updated_at = now;
        node.revision += 1;
        Ok(Some(GraphEvent::NodeUpdated(node.clone())))
    }

    fn apply_edge_metadata(
        &mut self,
        id: &str,
        key: &str,
        value: Value,
        now: i64,
    ) -> Result<Option<GraphEvent>> {
        let Some(edge) = self.edges.get_mut(id) else {
            return Err(GraphError::EdgeNotFound(id.to_string()));
        };
        if edge.metadata.get(key) == Some(&value) {
            return Ok(None);
        }
        edge.metadata.insert(key, value);
        edge.updated_at = now;
        edge.revision += 1;
        Ok(Some(GraphEvent::EdgeUpdated(edge.clone())))
    }

    fn apply_set_node_metadata(
        &mut self,
        id: &str,
        metadata: Metadata,
        now: i64,
    ) -> Result<Option<GraphEvent>> {
        let Some(node) = self.nodes.get_mut(id) else {
            return Err(GraphError::NodeNotFound(id.to_string()));
        };
        if node.metadata == metadata {
            return Ok(None);
        }
        node.metadata = metadata;
        node.updated_at = now;
        node.revision += 1;
        Ok(Some(GraphEvent::NodeUpdated(node.clone())))
    }
}

struct GraphInner {
    host: String,
    state: RwLock<GraphState>,
    listeners: Mutex<Vec<Arc<dyn GraphEventListener>>>,
}

/// Handle to the shared property graph. Cloning is cheap; clones share
/// the underlying store and listeners but carry their own
/// [`GraphContext`].
#[derive(Clone)]
pub struct Graph {
    inner: Arc<GraphInner>,
    ctx: GraphContext,
}

impl std::fmt::Debug for Graph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Graph")
            .field("host", &self.inner.host)
            .field("ctx", &self.ctx)
            .finish()
    }
}

impl Graph {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(GraphInner {
                host: host.into(),
                state: RwLock::new(GraphState::default()),
                listeners: Mutex::new(Vec::new()),
            }),
            ctx: GraphContext::live(),
        }
    }

    /// Label of the host this graph handle creates elements for.
    pub fn host(&self) -> &str {
        &self.inner.host
    }

    pub fn context(&self) -> GraphContext {
        self.ctx
    }

    /// A handle bound to `ctx`. Time-sliced handles are read-only, and a
    /// slice reaching past the present is refused.
    pub fn with_context(&self, ctx: GraphContext) -> Result<Graph> {
        if let Some(slice) = ctx.time_slice {
            if slice.to > Utc::now().timestamp() {
                return Err(GraphError::FutureTimeSlice);
            }
        }
        Ok(Graph {
            inner: self.inner.clone(),
            ctx,
        })
    }

    pub fn add_event_listener(&self, listener: Arc<dyn GraphEventListener>) {
        self.inner.listeners.lock().push(listener);
    }

    /// Detach `listener`, compared by identity. Safe to call from within
    /// a listener callback; dispatch iterates over a snapshot.
    pub fn remove_event_listener(&self, listener: &Arc<dyn GraphEventListener>) {
        self.inner
            .listeners
            .lock()
            .retain(|l| !Arc::ptr_eq(l, listener));
    }

    /// Create and insert a node with a generated identifier and this
    /// handle's host label.
    pub fn new_node(&self, metadata: Metadata) -> Result<Node> {
        let node = Node::new(
            Uuid::new_v4().to_string(),
            self.inner.host.clone(),
            metadata,
        );
        self.add_node(node.clone())?;
        Ok(node)
    }

    /// Create and insert an edge between two existing nodes.
    pub fn new_edge(&self, parent: &str, child: &str, metadata: Metadata) -> Result<Edge> {
        let edge = Edge::new(
            Uuid::new_v4().to_string(),
            parent,
            child,
            self.inner.host.clone(),
            metadata,
        );
        self.add_edge(edge.clone())?;
        Ok(edge)
    }

    pub fn add_node(&self, node: Node) -> Result<()> {
        self.ensure_live()?;
        let mut state = self.inner.state.write();
        let event = state.apply_add_node(node)?;
        self.dispatch(&mut state, vec![event]);
        Ok(())
    }

    pub fn del_node(&self, id: &str) -> Result<()> {
        self.ensure_live()?;
        let mut state = self.inner.state.write();
        let events = state.apply_del_node(id, Utc::now().timestamp())?;
        self.dispatch(&mut state, events);
        Ok(())
    }

    pub fn add_edge(&self, edge: Edge) -> Result<()> {
        self.ensure_live()?;
        let mut state = self.inner.state.write();
        let event = state.apply_add_edge(edge)?;
        self.dispatch(&mut state, vec![event]);
        Ok(())
    }

    pub fn del_edge(&self, id: &str) -> Result<()> {
        self.ensure_live()?;
        let mut state = self.inner.state.write();
        let event = state.apply_del_edge(id, Utc::now().timestamp())?;
        self.dispatch(&mut state, vec![event]);
        Ok(())
    }

    /// Set one metadata key on a node. Writes that do not change the
    /// stored value emit no event and do not bump the revision.
    pub fn add_node_metadata(&self, id: &str, key: &str, value: impl Into<Value>) -> Result<()> {
        self.ensure_live()?;
        let mut state = self.inner.state.write();
        if let Some(event) =
            state.apply_node_metadata(id, key, value.into(), Utc::now().timestamp())?
        {
            self.dispatch(&mut state, vec![event]);
        }
        Ok(())
    }

    pub fn add_edge_metadata(&self, id: &str, key: &str, value: impl Into<Value>) -> Result<()> {
        self.ensure_live()?;
        let mut state = self.inner.state.write();
        if let Some(event) =
            state.apply_edge_metadata(id, key, value.into(), Utc::now().timestamp())?
        {
            self.dispatch(&mut state, vec![event]);
        }
        Ok(())
    }

    /// Replace a node's whole metadata mapping.
    pub fn set_node_metadata(&self, id: &str, metadata: Metadata) -> Result<()> {
        self.ensure_live()?;
        let mut state = self.inner.state.write();
        if let Some(event) =
            state.apply_set_node_metadata(id, metadata, Utc::now().timestamp())?
        {
            self.dispatch(&mut state, vec![event]);
        }
        Ok(())
    }

    /// A read-locked view pinned to this handle's context. The guard is
    /// held until the view is dropped, so every lookup through it
    /// observes the same snapshot.
    pub fn read(&self) -> GraphView<'_> {
        GraphView {
            state: self.inner.state.read(),
            ctx: self.ctx,
        }
    }

    pub fn get_node(&self, id: &str) -> Option<Node> {
        self.read().get_node(id)
    }

    pub fn get_edge(&self, id: &str) -> Option<Edge> {
        self.read().get_edge(id)
    }

    pub fn get_nodes(&self, filter: &Filter) -> Vec<Node> {
        self.read().get_nodes(filter)
    }

    pub fn get_edges(&self, filter: &Filter) -> Vec<Edge> {
        self.read().get_edges(filter)
    }

    pub fn get_node_edges(&self, id: &str, filter: &Filter) -> Vec<Edge> {
        self.read().get_node_edges(id, filter)
    }

    pub fn get_edge_nodes(
        &self,
        edge: &Edge,
        parent_filter: &Filter,
        child_filter: &Filter,
    ) -> (Option<Node>, Option<Node>) {
        self.read().get_edge_nodes(edge, parent_filter, child_filter)
    }

    pub fn lookup_children(&self, id: &str, node_filter: &Filter, edge_filter: &Filter) -> Vec<Node> {
        self.read().lookup_children(id, node_filter, edge_filter)
    }

    pub fn lookup_parents(&self, id: &str, node_filter: &Filter, edge_filter: &Filter) -> Vec<Node> {
        self.read().lookup_parents(id, node_filter, edge_filter)
    }

    pub fn lookup_shortest_path(
        &self,
        id: &str,
        target: &Filter,
        edge_filter: &Filter,
    ) -> Vec<Node> {
        self.read().lookup_shortest_path(id, target, edge_filter)
    }

    fn ensure_live(&self) -> Result<()> {
        if self.ctx.is_live() {
            Ok(())
        } else {
            Err(GraphError::ReadOnlyContext)
        }
    }

    /// Deliver `events` to every listener while still holding the write
    /// lock. Listener mutations through the transaction handle queue
    /// further events, dispatched in commit order. The listener list is
    /// snapshotted per event so detaching during dispatch is safe.
    fn dispatch(&self, state: &mut GraphState, events: Vec<GraphEvent>) {
        let mut queue: VecDeque<GraphEvent> = events.into();
        while let Some(event) = queue.pop_front() {
            let listeners: Vec<Arc<dyn GraphEventListener>> =
                self.inner.listeners.lock().clone();
            for listener in &listeners {
                let mut txn = GraphTxn {
                    state: &mut *state,
                    queue: &mut queue,
                };
                match &event {
                    GraphEvent::NodeAdded(node) => listener.on_node_added(&mut txn, node),
                    GraphEvent::NodeUpdated(node) => listener.on_node_updated(&mut txn, node),
                    GraphEvent::NodeDeleted(node) => listener.on_node_deleted(&mut txn, node),
                    GraphEvent::EdgeAdded(edge) => listener.on_edge_added(&mut txn, edge),
                    GraphEvent::EdgeUpdated(edge) => listener.on_edge_updated(&mut txn, edge),
                    GraphEvent::EdgeDeleted(edge) => listener.on_edge_deleted(&mut txn, edge),
                }
            }
        }
    }
}

/// Mutation handle passed to listener callbacks while the write lock is
/// held. Reads observe the live state including any mutations already
/// applied during dispatch; mutations queue their events behind the one
/// being delivered.
pub struct GraphTxn<'a> {
    state: &'a mut GraphState,
    queue: &'a mut VecDeque<GraphEvent>,
}

impl GraphTxn<'_> {
    pub fn get_node(&self, id: &str) -> Option<Node> {
        self.state.get_node(id, &GraphContext::live()).cloned()
    }

    pub fn get_edge(&self, id: &str) -> Option<Edge> {
        self.state.get_edge(id, &GraphContext::live()).cloned()
    }

    pub fn lookup_children(&self, id: &str, node_filter: &Filter, edge_filter: &Filter) -> Vec<Node> {
        self.state
            .lookup_children(id, node_filter, edge_filter, &GraphContext::live())
    }

    pub fn lookup_parents(&self, id: &str, node_filter: &Filter, edge_filter: &Filter) -> Vec<Node> {
        self.state
            .lookup_parents(id, node_filter, edge_filter, &GraphContext::live())
    }

    pub fn get_edge_nodes(
        &self,
        edge: &Edge,
        parent_filter: &Filter,
        child_filter: &Filter,
    ) -> (Option<Node>, Option<Node>) {
        self.state
            .edge_nodes(edge, parent_filter, child_filter, &GraphContext::live())
    }

    pub fn add_node_metadata(&mut self, id: &str, key: &str, value: impl Into<Value>) -> Result<()> {
        if let Some(event) =
            self.state
                .apply_node_metadata(id, key, value.into(), Utc::now().timestamp())?
        {
            self.queue.push_back(event);
        }
        Ok(())
    }

    pub fn add_edge_metadata(&mut self, id: &str, key: &str, value: impl Into<Value>) -> Result<()> {
        if let Some(event) =
            self.state
                .apply_edge_metadata(id, key, value.into(), Utc::now().timestamp())?
        {
            self.queue.push_back(event);
        }
        Ok(())
    }
}

/// A read-locked, context-bound view of the graph. All lookups through
/// one view observe the same snapshot.
pub struct GraphView<'g> {
    state: RwLockReadGuard<'g, GraphState>,
    ctx: GraphContext,
}

impl<'g> GraphView<'g> {
    pub fn context(&self) -> GraphContext {
        self.ctx
    }

    /// Rebind this view to a historical slice. Refuses slices reaching
    /// past the present.
    pub fn set_slice(&mut self, slice: TimeSlice) -> Result<()> {
        if slice.to > Utc::now().timestamp() {
            return Err(GraphError::FutureTimeSlice);
        }
        self.ctx = GraphContext::sliced(slice);
        Ok(())
    }

    pub fn get_node(&self, id: &str) -> Option<Node> {
        self.state.get_node(id, &self.ctx).cloned()
    }

    pub fn get_edge(&self, id: &str) -> Option<Edge> {
        self.state.get_edge(id, &self.ctx).cloned()
    }

    pub fn get_nodes(&self, filter: &Filter) -> Vec<Node> {
        self.state.get_nodes(filter, &self.ctx)
    }

    pub fn get_edges(&self, filter: &Filter) -> Vec<Edge> {
        self.state.get_edges(filter, &self.ctx)
    }

    pub fn get_node_edges(&self, id: &str, filter: &Filter) -> Vec<Edge> {
        self.state.node_edges(id, filter, &self.ctx)
    }

    pub fn get_edge_nodes(
        &self,
        edge: &Edge,
        parent_filter: &Filter,
        child_filter: &Filter,
    ) -> (Option<Node>, Option<Node>) {
        self.state.edge_nodes(edge, parent_filter, child_filter, &self.ctx)
    }

    pub fn lookup_children(&self, id: &str, node_filter: &Filter, edge_filter: &Filter) -> Vec<Node> {
        self.state.lookup_children(id, node_filter, edge_filter, &self.ctx)
    }

    pub fn lookup_parents(&self, id: &str, node_filter: &Filter, edge_filter: &Filter) -> Vec<Node> {
        self.state.lookup_parents(id, node_filter, edge_filter, &self.ctx)
    }

    pub fn lookup_shortest_path(
        &self,
        id: &str,
        target: &Filter,
        edge_filter: &Filter,
    ) -> Vec<Node> {
        self.state.lookup_shortest_path(id, target, edge_filter, &self.ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{keys, OWNERSHIP_RELATION};
    use parking_lot::Mutex as PlMutex;

    fn node(id: &str, node_type: &str) -> Node {
        Node::new(
            id,
            "host-1",
            Metadata::new().with(keys::TYPE, node_type).with(keys::NAME, id),
        )
    }

    fn ownership(id: &str, parent: &str, child: &str) -> Edge {
        Edge::new(
            id,
            parent,
            child,
            "host-1",
            Metadata::new().with(keys::RELATION_TYPE, OWNERSHIP_RELATION),
        )
    }

    #[derive(Default)]
    struct Recorder {
        events: PlMutex<Vec<String>>,
    }

    impl Recorder {
        fn seen(&self) -> Vec<String> {
            self.events.lock().clone()
        }
    }

    impl GraphEventListener for Recorder {
        fn on_node_added(&self, _txn: &mut GraphTxn<'_>, node: &Node) {
            self.events.lock().push(format!("node-added:{}", node.id));
        }
        fn on_node_updated(&self, _txn: &mut GraphTxn<'_>, node: &Node) {
            self.events.lock().push(format!("node-updated:{}", node.id));
        }
        fn on_node_deleted(&self, _txn: &mut GraphTxn<'_>, node: &Node) {
            self.events.lock().push(format!("node-deleted:{}", node.id));
        }
        fn on_edge_added(&self, _txn: &mut GraphTxn<'_>, edge: &Edge) {
            self.events.lock().push(format!("edge-added:{}", edge.id));
        }
        fn on_edge_updated(&self, _txn: &mut GraphTxn<'_>, edge: &Edge) {
            self.events.lock().push(format!("edge-updated:{}", edge.id));
        }
        fn on_edge_deleted(&self, _txn: &mut GraphTxn<'_>, edge: &Edge) {
            self.events.lock().push(format!("edge-deleted:{}", edge.id));
        }
    }

    #[test]
    fn test_add_and_lookup() {
        let graph = Graph::new("host-1");
        graph.add_node(node("h1", "host")).unwrap();
        graph.add_node(node("br1", "ovsbridge")).unwrap();
        graph.add_edge(ownership("e1", "h1", "br1")).unwrap();

        assert_eq!(graph.get_node("h1").unwrap().id, "h1");
        assert!(graph.get_node("missing").is_none());

        let bridges = graph.get_nodes(&Filter::new().eq(keys::TYPE, "ovsbridge"));
        assert_eq!(bridges.len(), 1);
        assert_eq!(bridges[0].id, "br1");

        let children = graph.lookup_children(
            "h1",
            &Filter::new(),
            &Filter::new().eq(keys::RELATION_TYPE, OWNERSHIP_RELATION),
        );
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].id, "br1");

        let parents = graph.lookup_parents("br1", &Filter::new(), &Filter::new());
        assert_eq!(parents.len(), 1);
        assert_eq!(parents[0].id, "h1");
    }

    #[test]
    fn test_duplicate_identifiers_are_rejected() {
        let graph = Graph::new("host-1");
        graph.add_node(node("h1", "host")).unwrap();
        assert_eq!(
            graph.add_node(node("h1", "host")),
            Err(GraphError::NodeConflict("h1".to_string()))
        );
    }

    #[test]
    fn test_edge_requires_existing_endpoints() {
        let graph = Graph::new("host-1");
        graph.add_node(node("h1", "host")).unwrap();
        let err = graph.add_edge(ownership("e1", "h1", "ghost")).unwrap_err();
        assert_eq!(
            err,
            GraphError::MissingEndpoint {
                edge: "e1".to_string(),
                node: "ghost".to_string(),
            }
        );
    }

    #[test]
    fn test_del_node_removes_incident_edges() {
        let graph = Graph::new("host-1");
        let recorder = Arc::new(Recorder::default());
        graph.add_node(node("h1", "host")).unwrap();
        graph.add_node(node("br1", "ovsbridge")).unwrap();
        graph.add_edge(ownership("e1", "h1", "br1")).unwrap();

        graph.add_event_listener(recorder.clone());
        graph.del_node("br1").unwrap();

        assert!(graph.get_node("br1").is_none());
        assert!(graph.get_edge("e1").is_none());
        // Incident edges are deleted before the node itself.
        assert_eq!(
            recorder.seen(),
            vec!["edge-deleted:e1".to_string(), "node-deleted:br1".to_string()]
        );
    }

    #[test]
    fn test_metadata_updates_fire_only_on_change() {
        let graph = Graph::new("host-1");
        let recorder = Arc::new(Recorder::default());
        graph.add_node(node("h1", "host")).unwrap();
        graph.add_event_listener(recorder.clone());

        graph.add_node_metadata("h1", "MTU", 1500).unwrap();
        graph.add_node_metadata("h1", "MTU", 1500).unwrap();
        graph.add_node_metadata("h1", "MTU", 9000).unwrap();

        assert_eq!(
            recorder.seen(),
            vec!["node-updated:h1".to_string(), "node-updated:h1".to_string()]
        );
        assert_eq!(graph.get_node("h1").unwrap().revision, 3);
    }

    struct Tagger;

    impl GraphEventListener for Tagger {
        fn on_node_added(&self, txn: &mut GraphTxn<'_>, node: &Node) {
            txn.add_node_metadata(&node.id, "Seen", true).unwrap();
        }
    }

    #[test]
    fn test_listener_mutations_are_dispatched_in_commit_order() {
        let graph = Graph::new("host-1");
        let recorder = Arc::new(Recorder::default());
        graph.add_event_listener(Arc::new(Tagger));
        graph.add_event_listener(recorder.clone());

        graph.add_node(node("h1", "host")).unwrap();

        assert_eq!(
            graph.get_node("h1").unwrap().get("Seen"),
            Some(&Value::Bool(true))
        );
        assert_eq!(
            recorder.seen(),
            vec!["node-added:h1".to_string(), "node-updated:h1".to_string()]
        );
    }

    struct Detacher {
        graph: Graph,
        target: PlMutex<Option<Arc<dyn GraphEventListener>>>,
    }

    impl GraphEventListener for Detacher {
        fn on_node_added(&self, _txn: &mut GraphTxn<'_>, _node: &Node) {
            if let Some(target) = self.target.lock().take() {
                self.graph.remove_event_listener(&target);
            }
        }
    }

    #[test]
    fn test_detaching_during_dispatch_is_safe() {
        let graph = Graph::new("host-1");
        let recorder: Arc<Recorder> = Arc::new(Recorder::default());
        let victim: Arc<dyn GraphEventListener> = recorder.clone();
        graph.add_event_listener(Arc::new(Detacher {
            graph: graph.clone(),
            target: PlMutex::new(Some(victim.clone())),
        }));
        graph.add_event_listener(victim);

        // The victim still sees the event in flight, then nothing more.
        graph.add_node(node("h1", "host")).unwrap();
        graph.add_node(node("h2", "host")).unwrap();

        assert_eq!(recorder.seen(), vec!["node-added:h1".to_string()]);
    }

    #[test]
    fn test_shortest_path_prefers_fewer_hops() {
        let graph = Graph::new("host-1");
        for id in ["a", "b", "c", "d"] {
            graph.add_node(node(id, "intf")).unwrap();
        }
        graph.add_node(node("t", "host")).unwrap();
        // Long way round: a -> b -> c -> t. Short cut: a -> d -> t.
        graph.add_edge(ownership("e1", "a", "b")).unwrap();
        graph.add_edge(ownership("e2", "b", "c")).unwrap();
        graph.add_edge(ownership("e3", "c", "t")).unwrap();
        graph.add_edge(ownership("e4", "a", "d")).unwrap();
        graph.add_edge(ownership("e5", "d", "t")).unwrap();

        let path = graph.lookup_shortest_path(
            "a",
            &Filter::new().eq(keys::TYPE, "host"),
            &Filter::new(),
        );
        let ids: Vec<_> = path.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "d", "t"]);
    }

    #[test]
    fn test_shortest_path_ties_break_on_insertion_order() {
        let graph = Graph::new("host-1");
        for id in ["s", "left", "right", "t"] {
            graph.add_node(node(id, "intf")).unwrap();
        }
        graph.add_node_metadata("t", keys::TYPE, "host").unwrap();
        graph.add_edge(ownership("e1", "s", "right")).unwrap();
        graph.add_edge(ownership("e2", "s", "left")).unwrap();
        graph.add_edge(ownership("e3", "right", "t")).unwrap();
        graph.add_edge(ownership("e4", "left", "t")).unwrap();

        let path = graph.lookup_shortest_path(
            "s",
            &Filter::new().eq(keys::TYPE, "host"),
            &Filter::new(),
        );
        let ids: Vec<_> = path.iter().map(|n| n.id.as_str()).collect();
        // Both paths have two hops; the first inserted edge wins.
        assert_eq!(ids, vec!["s", "right", "t"]);
    }

    #[test]
    fn test_shortest_path_respects_edge_filter() {
        let graph = Graph::new("host-1");
        graph.add_node(node("s", "intf")).unwrap();
        graph.add_node(node("t", "host")).unwrap();
        graph
            .add_edge(Edge::new(
                "e1",
                "s",
                "t",
                "host-1",
                Metadata::new().with(keys::RELATION_TYPE, "layer2"),
            ))
            .unwrap();

        let target = Filter::new().eq(keys::TYPE, "host");
        let ownership_only = Filter::new().eq(keys::RELATION_TYPE, OWNERSHIP_RELATION);
        assert!(graph.lookup_shortest_path("s", &target, &ownership_only).is_empty());
        assert_eq!(graph.lookup_shortest_path("s", &target, &Filter::new()).len(), 2);
    }

    #[test]
    fn test_time_slice_visibility() {
        let graph = Graph::new("host-1");
        let now = Utc::now().timestamp();

        let mut old = node("old", "netns");
        old.created_at = now - 100;
        old.updated_at = now - 100;
        graph.add_node(old).unwrap();
        graph.add_node(node("fresh", "netns")).unwrap();

        let past = graph
            .with_context(GraphContext::sliced(TimeSlice::new(now - 90, now - 50)))
            .unwrap();
        let visible = past.get_nodes(&Filter::new());
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].id, "old");

        let before_creation = graph
            .with_context(GraphContext::sliced(TimeSlice::new(now - 200, now - 150)))
            .unwrap();
        assert!(before_creation.get_nodes(&Filter::new()).is_empty());
    }

    #[test]
    fn test_time_slice_sees_archived_elements() {
        let graph = Graph::new("host-1");
        let now = Utc::now().timestamp();

        let mut gone = node("gone", "container");
        gone.created_at = now - 100;
        graph.add_node(gone).unwrap();
        graph.del_node("gone").unwrap();
        assert!(graph.get_node("gone").is_none());

        let past = graph
            .with_context(GraphContext::sliced(TimeSlice::new(now - 90, now - 50)))
            .unwrap();
        let archived = past.get_node("gone").unwrap();
        assert_eq!(archived.id, "gone");
        assert!(archived.deleted_at.is_some());
    }

    #[test]
    fn test_time_slice_is_read_only() {
        let graph = Graph::new("host-1");
        let now = Utc::now().timestamp();
        let past = graph
            .with_context(GraphContext::sliced(TimeSlice::new(now - 10, now - 1)))
            .unwrap();
        assert_eq!(
            past.add_node(node("h1", "host")),
            Err(GraphError::ReadOnlyContext)
        );
    }

    #[test]
    fn test_future_slice_is_refused() {
        let graph = Graph::new("host-1");
        let now = Utc::now().timestamp();
        let err = graph
            .with_context(GraphContext::sliced(TimeSlice::new(now, now + 3600)))
            .unwrap_err();
        assert_eq!(err, GraphError::FutureTimeSlice);
        assert!(err.to_string().contains("future"));
    }
}
