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

//! Capture resources.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A user-declared packet-capture specification: a traversal query
/// selecting target nodes, plus opaque probe parameters forwarded to the
/// agents. The registry is the system of record; orchestrators mirror
/// captures in memory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Capture {
    #[serde(rename = "UUID", default, skip_serializing_if = "String::is_empty")]
    pub uuid: String,

    #[serde(
        rename = "GremlinQuery",
        default,
        skip_serializing_if = "String::is_empty"
    )]
    pub gremlin_query: String,

    #[serde(rename = "Name", default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(
        rename = "Description",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<String>,

    /// Probe type hint for the agent (`pcap`, `afpacket`, ...).
    #[serde(rename = "Type", default, skip_serializing_if = "Option::is_none")]
    pub capture_type: Option<String>,

    #[serde(rename = "BPFFilter", default, skip_serializing_if = "Option::is_none")]
    pub bpf_filter: Option<String>,

    /// Number of active probes, reported back by agents.
    #[serde(rename = "Count", default, skip_serializing_if = "Option::is_none")]
    pub count: Option<i64>,
}

impl Capture {
    /// A capture with a fresh UUID targeting `query`.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            uuid: Uuid::new_v4().to_string(),
            gremlin_query: query.into(),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_assigns_a_uuid() {
        let capture = Capture::new("G.V().Has('Type', 'ovsbridge')");
        assert!(!capture.uuid.is_empty());
        assert_eq!(capture.gremlin_query, "G.V().Has('Type', 'ovsbridge')");
    }

    #[test]
    fn test_wire_field_names() {
        let mut capture = Capture::new("G.V()");
        capture.uuid = "cap-1".to_string();
        capture.bpf_filter = Some("port 80".to_string());
        let value = serde_json::to_value(&capture).unwrap();
        assert_eq!(value["UUID"], "cap-1");
        assert_eq!(value["GremlinQuery"], "G.V()");
        assert_eq!(value["BPFFilter"], "port 80");
        assert!(value.get("Name").is_none());
    }

    #[test]
    fn test_default_serializes_to_an_empty_object() {
        let value = serde_json::to_value(Capture::default()).unwrap();
        assert_eq!(value, serde_json::json!({}));
    }
}
