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

//! On-demand capture message vocabulary.

use crate::capture::Capture;
use serde::{Deserialize, Serialize};

/// Logical channel carrying every orchestrator message.
pub const NAMESPACE: &str = "ondemand";

/// Directed to the owning agent: start a probe on a node.
pub const CAPTURE_START: &str = "CaptureStart";
/// Directed to the owning agent: stop the probe on a node. Idempotent
/// on the agent side.
pub const CAPTURE_STOP: &str = "CaptureStop";
/// Broadcast: a capture specification appeared or changed.
pub const CAPTURE_ADDED: &str = "CaptureAdded";
/// Broadcast: a capture specification was removed.
pub const CAPTURE_DELETED: &str = "CaptureDeleted";

/// Payload of `CaptureStart` and `CaptureStop`. Stop messages carry an
/// empty capture record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CaptureQuery {
    #[serde(rename = "NodeID")]
    pub node_id: String,
    #[serde(rename = "Capture")]
    pub capture: Capture,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_stop_payload_has_an_empty_capture() {
        let stop = CaptureQuery {
            node_id: "n1".to_string(),
            capture: Capture::default(),
        };
        let value = serde_json::to_value(&stop).unwrap();
        assert_eq!(value["NodeID"], "n1");
        assert_eq!(value["Capture"], serde_json::json!({}));
    }
}
