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


//! Status snapshots reported by the stream processor.

use crate::id::MeshId;
use serde::{Deserialize, Serialize};

/// Which side currently owns a mesh's assembled buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GateState {
    /// The processor owns the buffers and may mutate them.
    Processing,
    /// The buffers are on loan to the host.
    Loaned,
}

/// A point-in-time summary of one mesh's streaming state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshStatus {
    /// The mesh this status describes.
    pub mesh_id: MeshId,
    /// Current owner of the buffers.
    pub gate: GateState,
    /// Number of submeshes registered.
    pub total_submeshes: usize,
    /// Number of submeshes currently resident in every channel they declare.
    pub resident_submeshes: usize,
    /// Length of the add-queue.
    pub pending_additions: usize,
    /// Length of the remove-queue.
    pub pending_removals: usize,
    /// Used bytes per channel, in registration order.
    pub channel_bytes: Vec<(String, usize)>,
    /// Running primitive count of the resident submeshes.
    pub primitive_count: u64,
    /// Index-space high-water mark of the resident submeshes.
    pub max_index: u32,
    /// Number of times the buffers have been handed to the host.
    pub handoffs: u64,
}

impl MeshStatus {
    /// Returns `true` when neither queue holds work.
    pub fn is_settled(&self) -> bool {
        self.pending_additions == 0 && self.pending_removals == 0
    }
}
