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

//! Graph error types.

use thiserror::Error;

/// Result type for graph operations.
pub type Result<T> = std::result::Result<T, GraphError>;

/// Errors that can occur while mutating or slicing the graph.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GraphError {
    /// A node with the same identifier is already present.
    #[error("node '{0}' already present")]
    NodeConflict(String),

    /// An edge with the same identifier is already present.
    #[error("edge '{0}' already present")]
    EdgeConflict(String),

    /// Node lookup by identifier failed.
    #[error("node '{0}' does not exist")]
    NodeNotFound(String),

    /// Edge lookup by identifier failed.
    #[error("edge '{0}' does not exist")]
    EdgeNotFound(String),

    /// An edge references a node that is not part of the graph.
    #[error("edge '{edge}' references missing node '{node}'")]
    MissingEndpoint { edge: String, node: String },

    /// Mutation attempted through a time-sliced handle.
    #[error("cannot mutate a time-sliced graph view")]
    ReadOnlyContext,

    /// The requested time slice ends after the present.
    #[error("cannot predict the future")]
    FutureTimeSlice,
}
