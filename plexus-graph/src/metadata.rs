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

//! Metadata mappings carried by graph nodes and edges.
//!
//! Metadata is a flat map from string keys to JSON scalars or structured
//! values. A handful of keys are load-bearing for the topology and are
//! listed in [`keys`].

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Reserved metadata keys.
pub mod keys {
    /// Entity kind (`host`, `netns`, `ovsbridge`, `ovsport`, `bond`,
    /// `veth`, `container`, `vm`, `fabric`, ...).
    pub const TYPE: &str = "Type";
    /// Human-readable entity name.
    pub const NAME: &str = "Name";
    /// Stable topology identifier, assigned by the TID mapper.
    pub const TID: &str = "TID";
    /// UUID of the capture bound to this node once a probe runs on it.
    pub const CAPTURE_ID: &str = "Capture/ID";
    /// Filesystem path of a network namespace.
    pub const PATH: &str = "Path";
    /// Backend UUID of an OVS port.
    pub const UUID: &str = "UUID";
    /// Probe that discovered the entity.
    pub const PROBE: &str = "Probe";
    /// Edge classification, see [`crate::metadata::OWNERSHIP_RELATION`].
    pub const RELATION_TYPE: &str = "RelationType";
}

/// `RelationType` value of containment edges. The ownership sub-relation
/// forms a forest rooted at each host node.
pub const OWNERSHIP_RELATION: &str = "ownership";

/// `RelationType` value of layer-2 peer links.
pub const LAYER2_RELATION: &str = "layer2";

/// Key/value metadata attached to a node or an edge.
///
/// Backed by an ordered map so that key iteration, and therefore query
/// output, is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata(BTreeMap<String, Value>);

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, for literal metadata in constructors and tests.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// String value at `key`, when present and a string.
    pub fn get_string(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// Integer value at `key`, coerced from numbers and numeric strings.
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.0.get(key).and_then(to_i64)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Metadata {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl<'a> IntoIterator for &'a Metadata {
    type Item = (&'a String, &'a Value);
    type IntoIter = std::collections::btree_map::Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Best-effort coercion of a metadata value to a 64 bit integer.
pub fn to_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Best-effort coercion of a metadata value to a float.
pub fn to_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}
