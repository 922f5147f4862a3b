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

//! Plexus Topology
//!
//! Topology-level services over the property graph: the TID mapper that
//! assigns stable content-addressed node identities, and ownership-path
//! helpers.

pub mod path;
pub mod tid;

pub use path::{build_host_node_tid_map, graph_path, HostNodeTidMap, NodePath};
pub use tid::TidMapper;
