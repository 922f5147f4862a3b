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

//! On-demand orchestration configuration.

use serde::{Deserialize, Serialize};

/// Tunables for the capture orchestrator and its collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct OnDemandConfig {
    /// Bus namespace for every orchestrator message.
    pub namespace: String,
    /// Election service name, the first half of the elector's
    /// leadership key.
    pub elector_service: String,
    /// Election role, the second half of the elector's leadership key.
    pub elector_role: String,
    /// How long a directed bus delivery may block before it is reported
    /// as failed, in milliseconds.
    pub dispatch_timeout_ms: u64,
}

impl Default for OnDemandConfig {
    fn default() -> Self {
        Self {
            namespace: crate::messages::NAMESPACE.to_string(),
            elector_service: "analyzer".to_string(),
            elector_role: "ondemand-client".to_string(),
            dispatch_timeout_ms: 5000,
        }
    }
}
