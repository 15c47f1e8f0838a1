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


//! A lane that cuts a submesh's segments out of every channel and closes the
//! gaps they leave.

use tessera_core::{StreamError, StreamResult};
use tessera_data::{IndexViewMut, SubmeshKey};

use crate::{LaneOutcome, MeshWorkspace, StreamLane};

/// Removes a submesh from the assembled channels.
///
/// Segments placed after the evicted one slide down to close the gap. In the
/// index channel, every word after the gap is lowered by the evicted span so
/// the surviving indices stay contiguous.
#[derive(Debug, Default)]
pub struct EvictionLane;

impl EvictionLane {
    /// Creates a new `EvictionLane`.
    pub fn new() -> Self {
        Self
    }
}

impl StreamLane for EvictionLane {
    fn strategy_name(&self) -> &'static str {
        "Eviction"
    }

    fn run(&self, workspace: &mut MeshWorkspace<'_>, key: SubmeshKey) -> StreamResult<LaneOutcome> {
        let index_slot = workspace.index.index_slot();
        let slots: Vec<usize> = workspace
            .index
            .entry(key)
            .participating_slots()
            .filter(|&slot| workspace.index.entry(key).is_resident_in(slot))
            .collect();

        let mut outcome = LaneOutcome::default();
        for slot in slots {
            let entry = workspace.index.entry(key);
            let channel = workspace.index.channel_name(slot);
            let segment = entry
                .segment(slot)
                .ok_or_else(|| StreamError::inconsistency(channel, "resident without a segment"))?;
            let offset = entry.current_offset(slot) as usize;
            let length = segment.length_bytes;
            let end = offset + length;

            let mut index_shift = 0;
            if Some(slot) == index_slot {
                if let Some(indices) = entry.indices().copied() {
                    let span = u32::try_from(indices.span()).map_err(|_| {
                        StreamError::inconsistency(channel, "resident span exceeds u32")
                    })?;
                    let used = workspace.store.used_length(slot);
                    let tail = used.checked_sub(end).ok_or_else(|| {
                        StreamError::inconsistency(
                            channel,
                            format!("segment end {end} is past the used length {used}"),
                        )
                    })?;

                    let format = workspace.format;
                    let buffer = workspace.store.used_bytes_mut(slot)?;
                    IndexViewMut::new(buffer, end, tail, format)?.sub_bias(span)?;
                    workspace.counters.evict(
                        indices.span(),
                        workspace.topology.primitive_count(indices.count),
                    )?;
                    index_shift = span;
                }
            }

            workspace.store.remove_range(slot, offset..end)?;
            workspace.index.release(key, slot, length, index_shift)?;
            outcome.channels += 1;
            outcome.bytes += length;
        }

        workspace.index.set_index_base(key, None);
        workspace.index.set_visible(key, false);
        log::trace!(
            "Mesh {}: evicted '{}' ({} bytes over {} channels)",
            workspace.mesh_id,
            workspace.index.entry(key).id(),
            outcome.bytes,
            outcome.channels
        );
        Ok(outcome)
    }
}
