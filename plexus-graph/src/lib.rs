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

//! Plexus Graph
//!
//! In-memory property graph for live network topology: nodes and edges
//! carrying key/value metadata, mutation listeners, metadata filters and
//! time-sliced read-only views.

pub mod context;
pub mod element;
pub mod error;
pub mod event;
pub mod filters;
pub mod graph;
pub mod metadata;

pub use context::{GraphContext, TimeSlice};
pub use element::{Edge, Identifier, Node};
pub use error::{GraphError, Result};
pub use event::{GraphEvent, GraphEventListener};
pub use filters::{Filter, FilterError, Predicate};
pub use graph::{Graph, GraphTxn, GraphView};
pub use metadata::{keys, to_f64, to_i64, Metadata, LAYER2_RELATION, OWNERSHIP_RELATION};
