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


//! The mutable view of one mesh that lanes operate on.

use tessera_core::{IndexFormat, MeshId, PrimitiveTopology};
use tessera_data::{ChannelStore, MeshCounters, SegmentIndex, SourceBuffers};

/// Borrowed state of a mesh whose buffers are owned by the processor.
///
/// A workspace can only be assembled from a live [`ChannelStore`], which a
/// mesh does not hold while its buffers are on loan.
#[derive(Debug)]
pub struct MeshWorkspace<'a> {
    /// The mesh being processed.
    pub mesh_id: MeshId,
    /// Segment descriptions and current offsets.
    pub index: &'a mut SegmentIndex,
    /// The assembled channel buffers.
    pub store: &'a mut ChannelStore,
    /// Index-space and primitive counters.
    pub counters: &'a mut MeshCounters,
    /// Registration-time source bytes.
    pub sources: &'a SourceBuffers,
    /// Width of the index words.
    pub format: IndexFormat,
    /// How index counts map to primitives.
    pub topology: PrimitiveTopology,
}
