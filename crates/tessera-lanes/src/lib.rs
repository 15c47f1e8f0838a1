// Copyright 2025 eraflo
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


//! # Tessera Lanes
//!
//! Hot-path pipelines that mutate a mesh's assembled channels one submesh at a
//! time. Each lane processes every channel of a submesh within a single call, so
//! a submesh is either resident in all of its channels or in none of them.

#![warn(missing_docs)]

mod admission_lane;
mod eviction_lane;
mod workspace;

pub use admission_lane::AdmissionLane;
pub use eviction_lane::EvictionLane;
pub use workspace::MeshWorkspace;

use tessera_core::StreamResult;
use tessera_data::SubmeshKey;

/// What a lane did to one submesh.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LaneOutcome {
    /// Number of channels the submesh was added to or removed from.
    pub channels: usize,
    /// Total segment bytes added or removed.
    pub bytes: usize,
}

/// A processing strategy applied to one submesh of one mesh.
pub trait StreamLane: Send + Sync {
    /// A short name for logging.
    fn strategy_name(&self) -> &'static str;

    /// Processes one submesh across every channel it declares.
    fn run(&self, workspace: &mut MeshWorkspace<'_>, key: SubmeshKey) -> StreamResult<LaneOutcome>;
}
