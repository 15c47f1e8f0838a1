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


//! Per-mesh index-space and primitive counters.

use tessera_core::{StreamError, StreamResult};

/// Keeps the shared index buffer globally unique across concatenated submeshes.
///
/// `max_index` is the sum of `max_value + 1` over the resident indexed
/// submeshes. It is only ever moved by the exact contribution of the submesh
/// being admitted or evicted, never recomputed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MeshCounters {
    /// Number of primitives described by the resident index segments.
    pub primitive_count: u64,
    /// Index-space high-water mark.
    pub max_index: u32,
}

impl MeshCounters {
    /// Accounts for an admitted submesh.
    pub fn admit(&mut self, span: u64, primitives: u64) -> StreamResult<()> {
        let max_index = (self.max_index as u64)
            .checked_add(span)
            .and_then(|v| u32::try_from(v).ok())
            .ok_or_else(|| {
                StreamError::inconsistency(
                    "index",
                    format!("max index {} cannot grow by {span}", self.max_index),
                )
            })?;
        self.max_index = max_index;
        self.primitive_count += primitives;
        Ok(())
    }

    /// Removes an evicted submesh's contribution.
    pub fn evict(&mut self, span: u64, primitives: u64) -> StreamResult<()> {
        let max_index = (self.max_index as u64).checked_sub(span).ok_or_else(|| {
            StreamError::inconsistency(
                "index",
                format!("max index {} cannot shrink by {span}", self.max_index),
            )
        })?;
        let primitive_count = self.primitive_count.checked_sub(primitives).ok_or_else(|| {
            StreamError::inconsistency(
                "index",
                format!(
                    "primitive count {} cannot shrink by {primitives}",
                    self.primitive_count
                ),
            )
        })?;
        self.max_index = max_index as u32;
        self.primitive_count = primitive_count;
        Ok(())
    }
}
