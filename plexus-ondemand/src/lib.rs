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

//! Plexus On-Demand
//!
//! On-demand packet-capture orchestration: capture resources, the
//! registry and bus contracts, leader election, and the orchestrator
//! that converges declarative captures onto graph nodes by dispatching
//! probe commands to agents.

pub mod bus;
pub mod capture;
pub mod config;
pub mod elector;
pub mod messages;
pub mod orchestrator;
pub mod registry;

pub use bus::{BusMessage, LocalBus, MessageBus};
pub use capture::Capture;
pub use config::OnDemandConfig;
pub use elector::{MasterElection, StandaloneElector};
pub use messages::{
    CaptureQuery, CAPTURE_ADDED, CAPTURE_DELETED, CAPTURE_START, CAPTURE_STOP, NAMESPACE,
};
pub use orchestrator::CaptureOrchestrator;
pub use registry::{CaptureEvent, CaptureRegistry, MemoryCaptureRegistry, WatchAction};
