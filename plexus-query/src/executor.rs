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

//! Query-string execution seam.
//!
//! The Gremlin-like parsing front-end lives outside this crate; consumers
//! that hold query strings (the capture orchestrator, the API layer) go
//! through this trait, and the parser's crate implements it by compiling
//! the string into a step chain.

use crate::error::TraversalError;
use crate::result::TraversalResult;
use plexus_graph::Graph;

/// Evaluates a traversal query string against the current graph.
///
/// Evaluation runs under the graph's read lock for the duration of one
/// call and must return the terminal step's `values()`.
pub trait QueryExecutor: Send + Sync {
    fn execute(&self, graph: &Graph, query: &str)
        -> Result<Vec<TraversalResult>, TraversalError>;
}
