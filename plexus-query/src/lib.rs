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

//! Plexus Query
//!
//! Fluent, Gremlin-style traversal algebra over the Plexus property
//! graph: lazy node/edge/value steps with metadata predicates,
//! shortest-path, pagination and de-duplication, evaluated against a
//! read-locked snapshot.

pub mod error;
pub mod executor;
pub mod result;
pub mod traversal;

pub use error::TraversalError;
pub use executor::QueryExecutor;
pub use result::TraversalResult;
pub use traversal::{
    GraphTraversal, StepContext, TraversalE, TraversalPaths, TraversalV, TraversalValue,
};
