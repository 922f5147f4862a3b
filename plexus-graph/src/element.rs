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

//! Graph elements: nodes and edges.

use crate::context::TimeSlice;
use crate::metadata::{keys, Metadata, OWNERSHIP_RELATION};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Opaque element identifier. Stable within a process; stable across
/// restarts only once a `TID` has been assigned to the node.
pub type Identifier = String;

/// A vertex of the topology graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Node {
    #[serde(rename = "ID")]
    pub id: Identifier,
    /// Label of the host whose agent discovered the node.
    pub host: String,
    pub metadata: Metadata,
    /// Unix seconds of creation.
    pub created_at: i64,
    /// Unix seconds of the last metadata revision.
    pub updated_at: i64,
    /// Monotonic revision counter, bumped on every metadata change.
    pub revision: u64,
    /// Unix seconds of deletion, set on archived copies only.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub deleted_at: Option<i64>,
}

impl Node {
    pub fn new(id: impl Into<Identifier>, host: impl Into<String>, metadata: Metadata) -> Self {
        let now = Utc::now().timestamp();
        Self {
            id: id.into(),
            host: host.into(),
            metadata,
            created_at: now,
            updated_at: now,
            revision: 1,
            deleted_at: None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.metadata.get(key)
    }

    pub fn get_string(&self, key: &str) -> Option<&str> {
        self.metadata.get_string(key)
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.metadata.get_i64(key)
    }

    /// Value of the reserved `Type` key.
    pub fn node_type(&self) -> Option<&str> {
        self.get_string(keys::TYPE)
    }

    pub(crate) fn visible_in(&self, slice: &TimeSlice) -> bool {
        slice.intersects(self.created_at, self.deleted_at)
    }
}

/// A directed link between two nodes. The `parent` end owns or precedes
/// the `child` end for classified relations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Edge {
    #[serde(rename = "ID")]
    pub id: Identifier,
    pub parent: Identifier,
    pub child: Identifier,
    pub host: String,
    pub metadata: Metadata,
    pub created_at: i64,
    pub updated_at: i64,
    pub revision: u64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub deleted_at: Option<i64>,
}

impl Edge {
    pub fn new(
        id: impl Into<Identifier>,
        parent: impl Into<Identifier>,
        child: impl Into<Identifier>,
        host: impl Into<String>,
        metadata: Metadata,
    ) -> Self {
        let now = Utc::now().timestamp();
        Self {
            id: id.into(),
            parent: parent.into(),
            child: child.into(),
            host: host.into(),
            metadata,
            created_at: now,
            updated_at: now,
            revision: 1,
            deleted_at: None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.metadata.get(key)
    }

    pub fn get_string(&self, key: &str) -> Option<&str> {
        self.metadata.get_string(key)
    }

    /// Value of the reserved `RelationType` key.
    pub fn relation_type(&self) -> Option<&str> {
        self.get_string(keys::RELATION_TYPE)
    }

    pub fn is_ownership(&self) -> bool {
        self.relation_type() == Some(OWNERSHIP_RELATION)
    }

    /// The endpoint opposite to `id`, when `id` is one of the two.
    pub fn other_end(&self, id: &str) -> Option<&Identifier> {
        if self.parent == id {
            Some(&self.child)
        } else if self.child == id {
            Some(&self.parent)
        } else {
            None
        }
    }

    pub(crate) fn visible_in(&self, slice: &TimeSlice) -> bool {
        slice.intersects(self.created_at, self.deleted_at)
    }
}
