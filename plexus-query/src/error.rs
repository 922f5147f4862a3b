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

//! Traversal error types.
//!
//! Traversal errors are sticky values, not exceptions: once a step
//! carries one, every later step propagates it without doing work and
//! `values()` returns empty. The error is inspected at the terminal
//! step via `error()`.

use plexus_graph::{FilterError, GraphError};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TraversalError {
    /// A filter passed to a step was malformed.
    #[error(transparent)]
    Filter(#[from] FilterError),

    /// The underlying graph refused the operation.
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// Lookup of a vertex by identifier failed.
    #[error("node '{0}' does not exist")]
    NodeNotFound(String),

    /// A query string could not be resolved by the executor.
    #[error("query execution failed: {0}")]
    Execution(String),
}
