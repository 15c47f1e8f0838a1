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


//! A lane that appends a submesh's segments to the end of every channel it
//! participates in.

use tessera_core::{StreamError, StreamResult};
use tessera_data::{IndexViewMut, SubmeshKey};

use crate::{LaneOutcome, MeshWorkspace, StreamLane};

/// Copies a submesh from the source buffers into the assembled channels.
///
/// Index words are rebased by the mesh's current `max_index` so they keep
/// referring to this submesh's own vertices once concatenated after the
/// already resident ones.
#[derive(Debug, Default)]
pub struct AdmissionLane;

impl AdmissionLane {
    /// Creates a new `AdmissionLane`.
    pub fn new() -> Self {
        Self
    }

    /// Checks that rebasing the submesh's indices stays inside the index
    /// format. Returns the base and span to apply, or `None` when the submesh
    /// has no indices.
    fn plan_rebase(
        workspace: &MeshWorkspace<'_>,
        key: SubmeshKey,
    ) -> StreamResult<Option<(u32, u64)>> {
        let entry = workspace.index.entry(key);
        let Some(indices) = entry.indices() else {
            return Ok(None);
        };

        let base = workspace.counters.max_index;
        let span = indices.span();
        let required = base as u64 + indices.max_value as u64;
        let limit = workspace.format.max_value() as u64;
        if required > limit || base as u64 + span > u32::MAX as u64 {
            return Err(StreamError::IndexOverflow {
                submesh: entry.id().clone(),
                required,
                limit,
            });
        }
        Ok(Some((base, span)))
    }
}

impl StreamLane for AdmissionLane {
    fn strategy_name(&self) -> &'static str {
        "Admission"
    }

    fn run(&self, workspace: &mut MeshWorkspace<'_>, key: SubmeshKey) -> StreamResult<LaneOutcome> {
        if workspace.index.entry(key).is_visible() {
            return Err(StreamError::inconsistency(
                "*",
                format!(
                    "submesh '{}' is already resident",
                    workspace.index.entry(key).id()
                ),
            ));
        }

        // Fail before touching any channel.
        let rebase = Self::plan_rebase(workspace, key)?;
        let index_slot = workspace.index.index_slot();
        let slots: Vec<usize> = workspace.index.entry(key).participating_slots().collect();

        let mut outcome = LaneOutcome::default();
        for slot in slots {
            let segment = workspace.index.entry(key).segment(slot).ok_or_else(|| {
                StreamError::inconsistency(
                    workspace.index.channel_name(slot),
                    "participating slot has no segment",
                )
            })?;
            let bytes = workspace.sources.segment(slot, segment)?;
            let offset = workspace.store.append(slot, bytes)?;

            if Some(slot) == index_slot {
                if let Some((base, span)) = rebase {
                    let format = workspace.format;
                    let buffer = workspace.store.used_bytes_mut(slot)?;
                    IndexViewMut::new(buffer, offset, segment.length_bytes, format)?
                        .add_bias(base)?;

                    let count = workspace
                        .index
                        .entry(key)
                        .indices()
                        .map_or(0, |indices| indices.count);
                    workspace
                        .counters
                        .admit(span, workspace.topology.primitive_count(count))?;
                    workspace.index.set_index_base(key, Some(base));
                }
            }

            workspace.index.place(key, slot, offset)?;
            outcome.channels += 1;
            outcome.bytes += segment.length_bytes;
        }

        workspace.index.set_visible(key, true);
        log::trace!(
            "Mesh {}: admitted '{}' ({} bytes over {} channels)",
            workspace.mesh_id,
            workspace.index.entry(key).id(),
            outcome.bytes,
            outcome.channels
        );
        Ok(outcome)
    }
}
