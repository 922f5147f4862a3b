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

//! The fluent traversal step algebra.
//!
//! A traversal starts from [`GraphTraversal::new`], which pins a read
//! guard over the graph for the whole evaluation: every step observes one
//! consistent snapshot, and two consecutive evaluations over an unchanged
//! graph yield identical sequences. Steps consume their predecessor and
//! return the next step, carrying either data or a sticky error.
//!
//! A per-query pagination range installed with
//! [`GraphTraversal::with_pagination`] threads an admission iterator
//! through every producing step, so `v().has(...)` stops scanning as soon
//! as the requested window is full.

use crate::error::TraversalError;
use crate::result::TraversalResult;
use chrono::{DateTime, Duration, Utc};
use plexus_graph::{to_f64, Edge, Filter, Graph, GraphError, GraphView, Node, TimeSlice};
use serde_json::Value;
use std::collections::HashSet;

/// Per-query state threaded through the step chain.
#[derive(Debug, Clone, Copy, Default)]
pub struct StepContext {
    /// Half-open `[from, to)` admission window over produced elements.
    pub pagination: Option<(u64, u64)>,
}

impl StepContext {
    fn iterator(&self) -> RangeIterator {
        match self.pagination {
            Some((from, to)) => RangeIterator::bounded(from, to),
            None => RangeIterator::unbounded(),
        }
    }
}

/// Counts produced elements and admits those inside the window.
#[derive(Debug, Clone, Copy)]
struct RangeIterator {
    at: u64,
    from: u64,
    to: u64,
}

impl RangeIterator {
    fn unbounded() -> Self {
        Self {
            at: 0,
            from: 0,
            to: u64::MAX,
        }
    }

    fn bounded(from: u64, to: u64) -> Self {
        Self { at: 0, from, to }
    }

    fn done(&self) -> bool {
        self.at >= self.to
    }

    fn admit(&mut self) -> bool {
        let ok = self.at >= self.from && self.at < self.to;
        self.at += 1;
        ok
    }
}

/// Root of a traversal: the read-locked graph view plus query context.
pub struct GraphTraversal<'g> {
    view: GraphView<'g>,
    ctx: StepContext,
    error: Option<TraversalError>,
}

impl<'g> GraphTraversal<'g> {
    pub fn new(graph: &'g Graph) -> Self {
        Self {
            view: graph.read(),
            ctx: StepContext::default(),
            error: None,
        }
    }

    /// Install an admission window over produced elements. Every
    /// producing step admits within the window while it is installed, so
    /// a query front-end installs it just before the final step: both
    /// `has` paginated directly and `v` paginated then filtered yield
    /// the first matching elements without materializing the full set.
    pub fn with_pagination(mut self, from: u64, to: u64) -> Self {
        self.ctx.pagination = Some((from, to));
        self
    }

    /// Switch to a time-sliced view covering `[at - duration, at]`.
    /// An instant in the future is a sticky error.
    pub fn context(self, at: DateTime<Utc>, duration: Option<Duration>) -> Self {
        if self.error.is_some() {
            return self;
        }
        let Self {
            mut view,
            ctx,
            error,
        } = self;
        if at > Utc::now() {
            return Self {
                view,
                ctx,
                error: Some(GraphError::FutureTimeSlice.into()),
            };
        }
        let span = duration.unwrap_or_else(Duration::zero);
        let slice = TimeSlice::new((at - span).timestamp(), at.timestamp());
        let error = match view.set_slice(slice) {
            Ok(()) => error,
            Err(e) => Some(e.into()),
        };
        Self { view, ctx, error }
    }

    /// All nodes matching `filter`; the empty filter selects every node.
    pub fn v(self, filter: Filter) -> TraversalV<'g> {
        if let Some(error) = self.error.clone() {
            return TraversalV::err(self, error);
        }
        if let Some(error) = filter.error() {
            let error = error.clone().into();
            return TraversalV::err(self, error);
        }
        let all = self.view.get_nodes(&filter);
        let mut it = self.ctx.iterator();
        let mut nodes = Vec::new();
        for node in all {
            if it.done() {
                break;
            }
            if it.admit() {
                nodes.push(node);
            }
        }
        TraversalV::ok(self, nodes)
    }

    /// A single node by identifier; a missing node is a sticky error.
    pub fn v_id(self, id: &str) -> TraversalV<'g> {
        if let Some(error) = self.error.clone() {
            return TraversalV::err(self, error);
        }
        match self.view.get_node(id) {
            Some(node) => TraversalV::ok(self, vec![node]),
            None => {
                let error = TraversalError::NodeNotFound(id.to_string());
                TraversalV::err(self, error)
            }
        }
    }

    pub fn error(&self) -> Option<&TraversalError> {
        self.error.as_ref()
    }
}

/// A node-sequence step.
pub struct TraversalV<'g> {
    t: GraphTraversal<'g>,
    result: Result<Vec<Node>, TraversalError>,
}

impl<'g> TraversalV<'g> {
    fn ok(t: GraphTraversal<'g>, nodes: Vec<Node>) -> Self {
        Self {
            t,
            result: Ok(nodes),
        }
    }

    fn err(t: GraphTraversal<'g>, error: TraversalError) -> Self {
        Self {
            t,
            result: Err(error),
        }
    }

    pub fn error(&self) -> Option<&TraversalError> {
        self.result.as_ref().err()
    }

    /// The current node sequence; empty when the step carries an error.
    pub fn nodes(&self) -> &[Node] {
        self.result.as_deref().unwrap_or(&[])
    }

    /// Install the admission window for the steps that follow, see
    /// [`GraphTraversal::with_pagination`].
    pub fn with_pagination(mut self, from: u64, to: u64) -> Self {
        self.t.ctx.pagination = Some((from, to));
        self
    }

    pub fn values(&self) -> Vec<TraversalResult> {
        self.nodes()
            .iter()
            .cloned()
            .map(TraversalResult::Node)
            .collect()
    }

    /// Keep nodes whose metadata matches `filter`.
    pub fn has(self, filter: Filter) -> Self {
        let Self { t, result } = self;
        let nodes = match result {
            Ok(nodes) => nodes,
            Err(error) => return Self::err(t, error),
        };
        if let Some(error) = filter.error() {
            let error = error.clone().into();
            return Self::err(t, error);
        }
        let mut it = t.ctx.iterator();
        let mut out = Vec::new();
        for node in nodes {
            if it.done() {
                break;
            }
            if filter.matches(&node.metadata) && it.admit() {
                out.push(node);
            }
        }
        Self::ok(t, out)
    }

    /// Keep nodes carrying `key`, whatever its value.
    pub fn has_key(self, key: &str) -> Self {
        let Self { t, result } = self;
        let nodes = match result {
            Ok(nodes) => nodes,
            Err(error) => return Self::err(t, error),
        };
        let mut it = t.ctx.iterator();
        let mut out = Vec::new();
        for node in nodes {
            if it.done() {
                break;
            }
            if node.metadata.contains_key(key) && it.admit() {
                out.push(node);
            }
        }
        Self::ok(t, out)
    }

    /// Children through outgoing edges; `filter` applies to the child
    /// nodes.
    pub fn out(self, filter: Filter) -> Self {
        let Self { t, result } = self;
        let nodes = match result {
            Ok(nodes) => nodes,
            Err(error) => return Self::err(t, error),
        };
        if let Some(error) = filter.error() {
            let error = error.clone().into();
            return Self::err(t, error);
        }
        let mut it = t.ctx.iterator();
        let mut out = Vec::new();
        'nodes: for node in &nodes {
            for child in t.view.lookup_children(&node.id, &filter, &Filter::new()) {
                if it.done() {
                    break 'nodes;
                }
                if it.admit() {
                    out.push(child);
                }
            }
        }
        Self::ok(t, out)
    }

    /// Parents through incoming edges; `filter` applies to the parent
    /// nodes.
    pub fn in_(self, filter: Filter) -> Self {
        let Self { t, result } = self;
        let nodes = match result {
            Ok(nodes) => nodes,
            Err(error) => return Self::err(t, error),
        };
        if let Some(error) = filter.error() {
            let error = error.clone().into();
            return Self::err(t, error);
        }
        let mut it = t.ctx.iterator();
        let mut out = Vec::new();
        'nodes: for node in &nodes {
            for parent in t.view.lookup_parents(&node.id, &filter, &Filter::new()) {
                if it.done() {
                    break 'nodes;
                }
                if it.admit() {
                    out.push(parent);
                }
            }
        }
        Self::ok(t, out)
    }

    /// Neighbors in either direction; `filter` applies to the traversed
    /// edges.
    pub fn both(self, filter: Filter) -> Self {
        let Self { t, result } = self;
        let nodes = match result {
            Ok(nodes) => nodes,
            Err(error) => return Self::err(t, error),
        };
        if let Some(error) = filter.error() {
            let error = error.clone().into();
            return Self::err(t, error);
        }
        let mut it = t.ctx.iterator();
        let mut out = Vec::new();
        'nodes: for node in &nodes {
            for edge in t.view.get_node_edges(&node.id, &filter) {
                let Some(other) = edge.other_end(&node.id) else {
                    continue;
                };
                let Some(neighbor) = t.view.get_node(other) else {
                    continue;
                };
                if it.done() {
                    break 'nodes;
                }
                if it.admit() {
                    out.push(neighbor);
                }
            }
        }
        Self::ok(t, out)
    }

    /// Outgoing edges matching `filter`.
    pub fn out_e(self, filter: Filter) -> TraversalE<'g> {
        let Self { t, result } = self;
        let nodes = match result {
            Ok(nodes) => nodes,
            Err(error) => return TraversalE::err(t, error),
        };
        if let Some(error) = filter.error() {
            let error = error.clone().into();
            return TraversalE::err(t, error);
        }
        let mut it = t.ctx.iterator();
        let mut out = Vec::new();
        'nodes: for node in &nodes {
            for edge in t.view.get_node_edges(&node.id, &filter) {
                if edge.parent != node.id {
                    continue;
                }
                if it.done() {
                    break 'nodes;
                }
                if it.admit() {
                    out.push(edge);
                }
            }
        }
        TraversalE::ok(t, out)
    }

    /// Incoming edges matching `filter`.
    pub fn in_e(self, filter: Filter) -> TraversalE<'g> {
        let Self { t, result } = self;
        let nodes = match result {
            Ok(nodes) => nodes,
            Err(error) => return TraversalE::err(t, error),
        };
        if let Some(error) = filter.error() {
            let error = error.clone().into();
            return TraversalE::err(t, error);
        }
        let mut it = t.ctx.iterator();
        let mut out = Vec::new();
        'nodes: for node in &nodes {
            for edge in t.view.get_node_edges(&node.id, &filter) {
                if edge.child != node.id {
                    continue;
                }
                if it.done() {
                    break 'nodes;
                }
                if it.admit() {
                    out.push(edge);
                }
            }
        }
        TraversalE::ok(t, out)
    }

    /// One shortest path per distinct source node, dropping sources with
    /// no path.
    pub fn shortest_path_to(self, node_filter: Filter, edge_filter: Filter) -> TraversalPaths {
        let Self { t, result } = self;
        let nodes = match result {
            Ok(nodes) => nodes,
            Err(error) => return TraversalPaths { result: Err(error) },
        };
        for filter in [&node_filter, &edge_filter] {
            if let Some(error) = filter.error() {
                return TraversalPaths {
                    result: Err(error.clone().into()),
                };
            }
        }
        let mut seen = HashSet::new();
        let mut paths = Vec::new();
        for node in &nodes {
            if !seen.insert(node.id.clone()) {
                continue;
            }
            let path = t
                .view
                .lookup_shortest_path(&node.id, &node_filter, &edge_filter);
            if !path.is_empty() {
                paths.push(path);
            }
        }
        TraversalPaths { result: Ok(paths) }
    }

    /// De-duplicate, preserving input order. With no keys the node
    /// identifier is the visited key; with keys, the tuple of field
    /// values is, and nodes missing any field are skipped entirely.
    pub fn dedup(self, keys: &[&str]) -> Self {
        let Self { t, result } = self;
        let nodes = match result {
            Ok(nodes) => nodes,
            Err(error) => return Self::err(t, error),
        };
        let mut it = t.ctx.iterator();
        let mut visited: HashSet<String> = HashSet::new();
        let mut out = Vec::new();
        'nodes: for node in nodes {
            if it.done() {
                break;
            }
            let visit_key = if keys.is_empty() {
                format!("id:{}", node.id)
            } else {
                let mut values = Vec::with_capacity(keys.len());
                for key in keys {
                    match node.get(key) {
                        Some(value) => values.push(value.clone()),
                        None => continue 'nodes,
                    }
                }
                match serde_json::to_string(&values) {
                    Ok(encoded) => encoded,
                    Err(_) => continue,
                }
            };
            if visited.contains(&visit_key) {
                continue;
            }
            if !it.admit() {
                continue;
            }
            out.push(node);
            visited.insert(visit_key);
        }
        Self::ok(t, out)
    }

    /// Slice the sequence to the half-open interval `[from, to)`.
    pub fn range(self, from: u64, to: u64) -> Self {
        let Self { t, result } = self;
        let nodes = match result {
            Ok(nodes) => nodes,
            Err(error) => return Self::err(t, error),
        };
        let out = nodes
            .into_iter()
            .skip(from as usize)
            .take(to.saturating_sub(from) as usize)
            .collect();
        Self::ok(t, out)
    }

    pub fn limit(self, count: u64) -> Self {
        self.range(0, count)
    }

    pub fn count(self) -> TraversalValue {
        match self.result {
            Ok(nodes) => TraversalValue::ok(Value::from(nodes.len() as u64)),
            Err(error) => TraversalValue::err(error),
        }
    }

    /// Sum of a numeric field over the sequence; nodes without the field
    /// or with a non-numeric value are ignored.
    pub fn sum(self, key: &str) -> TraversalValue {
        match self.result {
            Ok(nodes) => {
                let mut total = 0.0;
                for node in &nodes {
                    if let Some(value) = node.get(key).and_then(to_f64) {
                        total += value;
                    }
                }
                TraversalValue::ok(Value::from(total))
            }
            Err(error) => TraversalValue::err(error),
        }
    }

    /// Project the values at `key`, skipping nodes without it.
    pub fn property_values(self, key: &str) -> TraversalValue {
        match self.result {
            Ok(nodes) => {
                let values: Vec<Value> = nodes
                    .iter()
                    .filter_map(|node| node.get(key).cloned())
                    .collect();
                TraversalValue::ok(Value::Array(values))
            }
            Err(error) => TraversalValue::err(error),
        }
    }

    /// Project every metadata key of every node.
    pub fn property_keys(self) -> TraversalValue {
        match self.result {
            Ok(nodes) => {
                let keys: Vec<Value> = nodes
                    .iter()
                    .flat_map(|node| node.metadata.keys())
                    .map(|key| Value::from(key.clone()))
                    .collect();
                TraversalValue::ok(Value::Array(keys))
            }
            Err(error) => TraversalValue::err(error),
        }
    }
}

/// An edge-sequence step.
pub struct TraversalE<'g> {
    t: GraphTraversal<'g>,
    result: Result<Vec<Edge>, TraversalError>,
}

impl<'g> TraversalE<'g> {
    fn ok(t: GraphTraversal<'g>, edges: Vec<Edge>) -> Self {
        Self {
            t,
            result: Ok(edges),
        }
    }

    fn err(t: GraphTraversal<'g>, error: TraversalError) -> Self {
        Self {
            t,
            result: Err(error),
        }
    }

    pub fn error(&self) -> Option<&TraversalError> {
        self.result.as_ref().err()
    }

    pub fn edges(&self) -> &[Edge] {
        self.result.as_deref().unwrap_or(&[])
    }

    /// Install the admission window for the steps that follow, see
    /// [`GraphTraversal::with_pagination`].
    pub fn with_pagination(mut self, from: u64, to: u64) -> Self {
        self.t.ctx.pagination = Some((from, to));
        self
    }

    pub fn values(&self) -> Vec<TraversalResult> {
        self.edges()
            .iter()
            .cloned()
            .map(TraversalResult::Edge)
            .collect()
    }

    pub fn has(self, filter: Filter) -> Self {
        let Self { t, result } = self;
        let edges = match result {
            Ok(edges) => edges,
            Err(error) => return Self::err(t, error),
        };
        if let Some(error) = filter.error() {
            let error = error.clone().into();
            return Self::err(t, error);
        }
        let mut it = t.ctx.iterator();
        let mut out = Vec::new();
        for edge in edges {
            if it.done() {
                break;
            }
            if filter.matches(&edge.metadata) && it.admit() {
                out.push(edge);
            }
        }
        Self::ok(t, out)
    }

    pub fn has_key(self, key: &str) -> Self {
        let Self { t, result } = self;
        let edges = match result {
            Ok(edges) => edges,
            Err(error) => return Self::err(t, error),
        };
        let mut it = t.ctx.iterator();
        let mut out = Vec::new();
        for edge in edges {
            if it.done() {
                break;
            }
            if edge.metadata.contains_key(key) && it.admit() {
                out.push(edge);
            }
        }
        Self::ok(t, out)
    }

    pub fn dedup(self, keys: &[&str]) -> Self {
        let Self { t, result } = self;
        let edges = match result {
            Ok(edges) => edges,
            Err(error) => return Self::err(t, error),
        };
        let mut visited: HashSet<String> = HashSet::new();
        let mut out = Vec::new();
        'edges: for edge in edges {
            let visit_key = if keys.is_empty() {
                format!("id:{}", edge.id)
            } else {
                let mut values = Vec::with_capacity(keys.len());
                for key in keys {
                    match edge.get(key) {
                        Some(value) => values.push(value.clone()),
                        None => continue 'edges,
                    }
                }
                match serde_json::to_string(&values) {
                    Ok(encoded) => encoded,
                    Err(_) => continue,
                }
            };
            if visited.insert(visit_key) {
                out.push(edge);
            }
        }
        Self::ok(t, out)
    }

    pub fn range(self, from: u64, to: u64) -> Self {
        let Self { t, result } = self;
        let edges = match result {
            Ok(edges) => edges,
            Err(error) => return Self::err(t, error),
        };
        let out = edges
            .into_iter()
            .skip(from as usize)
            .take(to.saturating_sub(from) as usize)
            .collect();
        Self::ok(t, out)
    }

    pub fn limit(self, count: u64) -> Self {
        self.range(0, count)
    }

    pub fn count(self) -> TraversalValue {
        match self.result {
            Ok(edges) => TraversalValue::ok(Value::from(edges.len() as u64)),
            Err(error) => TraversalValue::err(error),
        }
    }

    /// Parent endpoints of the edges, filtered by node metadata.
    pub fn in_v(self, filter: Filter) -> TraversalV<'g> {
        let Self { t, result } = self;
        let edges = match result {
            Ok(edges) => edges,
            Err(error) => return TraversalV::err(t, error),
        };
        if let Some(error) = filter.error() {
            let error = error.clone().into();
            return TraversalV::err(t, error);
        }
        let mut it = t.ctx.iterator();
        let mut out = Vec::new();
        for edge in &edges {
            let (parent, _) = t.view.get_edge_nodes(edge, &filter, &Filter::new());
            if let Some(parent) = parent {
                if it.done() {
                    break;
                }
                if it.admit() {
                    out.push(parent);
                }
            }
        }
        TraversalV::ok(t, out)
    }

    /// Child endpoints of the edges, filtered by node metadata.
    pub fn out_v(self, filter: Filter) -> TraversalV<'g> {
        let Self { t, result } = self;
        let edges = match result {
            Ok(edges) => edges,
            Err(error) => return TraversalV::err(t, error),
        };
        if let Some(error) = filter.error() {
            let error = error.clone().into();
            return TraversalV::err(t, error);
        }
        let mut it = t.ctx.iterator();
        let mut out = Vec::new();
        for edge in &edges {
            let (_, child) = t.view.get_edge_nodes(edge, &Filter::new(), &filter);
            if let Some(child) = child {
                if it.done() {
                    break;
                }
                if it.admit() {
                    out.push(child);
                }
            }
        }
        TraversalV::ok(t, out)
    }
}

/// Terminal step holding one shortest path per source.
pub struct TraversalPaths {
    result: Result<Vec<Vec<Node>>, TraversalError>,
}

impl TraversalPaths {
    pub fn error(&self) -> Option<&TraversalError> {
        self.result.as_ref().err()
    }

    pub fn paths(&self) -> &[Vec<Node>] {
        self.result.as_deref().unwrap_or(&[])
    }

    pub fn values(&self) -> Vec<TraversalResult> {
        self.paths()
            .iter()
            .cloned()
            .map(TraversalResult::NodeList)
            .collect()
    }
}

/// Terminal step holding a scalar or an array of scalars.
pub struct TraversalValue {
    result: Result<Value, TraversalError>,
}

impl TraversalValue {
    fn ok(value: Value) -> Self {
        Self { result: Ok(value) }
    }

    fn err(error: TraversalError) -> Self {
        Self { result: Err(error) }
    }

    pub fn error(&self) -> Option<&TraversalError> {
        self.result.as_ref().err()
    }

    pub fn value(&self) -> Option<&Value> {
        self.result.as_ref().ok()
    }

    pub fn values(&self) -> Vec<TraversalResult> {
        match &self.result {
            Ok(Value::Array(items)) => items
                .iter()
                .cloned()
                .map(TraversalResult::Value)
                .collect(),
            Ok(value) => vec![TraversalResult::Value(value.clone())],
            Err(_) => Vec::new(),
        }
    }

    /// De-duplicate array elements by structural equality, preserving
    /// order. Scalars pass through unchanged.
    pub fn dedup(self) -> Self {
        match self.result {
            Ok(Value::Array(items)) => {
                let mut seen = HashSet::new();
                let mut out = Vec::new();
                for item in items {
                    let Ok(encoded) = serde_json::to_string(&item) else {
                        continue;
                    };
                    if seen.insert(encoded) {
                        out.push(item);
                    }
                }
                Self::ok(Value::Array(out))
            }
            _ => self,
        }
    }
}
