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


//! The stream processor state of a single mesh.

use std::time::Duration;

use tessera_core::descriptor::MeshDescriptor;
use tessera_core::protocol::{BufferLoan, VisibilityUpdate};
use tessera_core::status::MeshStatus;
use tessera_core::{
    Clock, IndexFormat, MeshId, PrimitiveTopology, StreamConfig, StreamError, StreamResult,
    SubmeshId,
};
use tessera_data::{
    AdmissionQueues, ChannelStore, IndexView, MeshCounters, PriorityWeights, QueueDelta,
    QueueSlot, SegmentIndex, SourceBuffers, SubmeshKey,
};
use tessera_lanes::{AdmissionLane, EvictionLane, MeshWorkspace, StreamLane};

use super::gate::OwnershipGate;

/// Everything the processor tracks for one registered mesh.
#[derive(Debug)]
pub struct MeshStream {
    id: MeshId,
    index: SegmentIndex,
    sources: SourceBuffers,
    queues: AdmissionQueues,
    counters: MeshCounters,
    gate: OwnershipGate,
    weights: PriorityWeights,
    format: IndexFormat,
    topology: PrimitiveTopology,
    frame_budget: Duration,
    shrink_threshold: f32,
    /// Set by any lane run, cleared by a handoff.
    dirty: bool,
    handoffs: u64,
    admission: AdmissionLane,
    eviction: EvictionLane,
}

impl MeshStream {
    /// Validates a descriptor and sets up a mesh with nothing resident.
    ///
    /// The mesh's own `ticks_per_second`, when present, overrides the
    /// configured rate.
    pub fn new(
        id: MeshId,
        descriptor: MeshDescriptor,
        config: &StreamConfig,
    ) -> StreamResult<Self> {
        let format = config.index_format;
        let index = SegmentIndex::build(&descriptor, format)?;
        let store = ChannelStore::new(
            index.channels().iter().map(|c| c.name.clone()),
            config.shrink_threshold,
        );
        let ticks_per_second = descriptor
            .ticks_per_second
            .unwrap_or(config.ticks_per_second);
        let topology = descriptor.topology;
        let sources = SourceBuffers::from_descriptor(descriptor);

        let mut queues = AdmissionQueues::new(index.len());
        if config.admit_on_register {
            for key in index.keys() {
                queues.enqueue_add(key);
            }
        }

        log::info!(
            "Mesh {id}: registered {} submeshes over {} channels at {} ticks/s",
            index.len(),
            index.channels().len(),
            ticks_per_second
        );

        Ok(Self {
            id,
            index,
            sources,
            queues,
            counters: MeshCounters::default(),
            gate: OwnershipGate::Processing(store),
            weights: PriorityWeights {
                size: config.size_weight,
                distance: config.distance_weight,
            },
            format,
            topology,
            frame_budget: StreamConfig::frame_budget_for(ticks_per_second),
            shrink_threshold: config.shrink_threshold,
            dirty: false,
            handoffs: 0,
            admission: AdmissionLane::new(),
            eviction: EvictionLane::new(),
        })
    }

    /// The mesh id.
    pub fn id(&self) -> MeshId {
        self.id
    }

    /// The segment index.
    pub fn index(&self) -> &SegmentIndex {
        &self.index
    }

    /// The admission queues.
    pub fn queues(&self) -> &AdmissionQueues {
        &self.queues
    }

    /// The running counters.
    pub fn counters(&self) -> MeshCounters {
        self.counters
    }

    /// The ownership gate.
    pub fn gate(&self) -> &OwnershipGate {
        &self.gate
    }

    /// The soft deadline of one processing pass.
    pub fn frame_budget(&self) -> Duration {
        self.frame_budget
    }

    /// Number of handoffs so far.
    pub fn handoffs(&self) -> u64 {
        self.handoffs
    }

    /// Replaces the desired visible set.
    ///
    /// Ids that do not name a submesh of this mesh are ignored. Hints are
    /// applied before the add-queue is reordered.
    pub fn update_visibility(&mut self, update: &VisibilityUpdate) -> QueueDelta {
        for (id, &size) in &update.size_hint {
            if let Some(key) = self.index.key_of(id) {
                self.index.set_hints(key, Some(size), None);
            }
        }
        for (id, &distance) in &update.distance_hint {
            if let Some(key) = self.index.key_of(id) {
                self.index.set_hints(key, None, Some(distance));
            }
        }

        let visible = self.index.resolve(&update.visible_ids);
        let ignored = update
            .visible_ids
            .iter()
            .filter(|id| self.index.key_of(id).is_none())
            .count();
        if ignored > 0 {
            log::debug!("Mesh {}: ignored {ignored} unknown submesh ids", self.id);
        }

        let delta = self.queues.apply_visibility(&self.index, &visible);
        self.queues.prioritize(&self.index, &self.weights);

        log::debug!(
            "Mesh {}: visibility update queued +{} -{} (cancelled +{} -{})",
            self.id,
            delta.enqueued_additions,
            delta.enqueued_removals,
            delta.cancelled_additions,
            delta.cancelled_removals
        );
        delta
    }

    /// Records requested levels of detail, pairing `ids` with `lods`.
    ///
    /// Admission does not branch on the level yet. Returns how many
    /// submeshes were updated.
    pub fn change_lod(&mut self, ids: &[SubmeshId], lods: &[u8]) -> usize {
        if ids.len() != lods.len() {
            log::warn!(
                "Mesh {}: change_lod got {} ids for {} levels, extra entries ignored",
                self.id,
                ids.len(),
                lods.len()
            );
        }
        let mut updated = 0;
        for (id, &lod) in ids.iter().zip(lods) {
            if let Some(key) = self.index.key_of(id) {
                self.index.set_requested_lod(key, lod);
                updated += 1;
            }
        }
        log::debug!("Mesh {}: recorded {updated} LOD requests", self.id);
        updated
    }

    /// Takes back buffers lent by an earlier handoff.
    pub fn return_buffers(&mut self, loan: BufferLoan) -> StreamResult<()> {
        if loan.mesh_id != self.id {
            return Err(StreamError::LoanMismatch {
                mesh_id: self.id,
                details: format!("loan belongs to mesh {}", loan.mesh_id),
            });
        }
        self.gate.restore(loan, self.shrink_threshold)?;
        log::debug!("Mesh {}: buffers returned", self.id);
        Ok(())
    }

    /// Runs one processing pass.
    ///
    /// Removals drain before additions. After every submesh the pass hands
    /// the buffers to the host if the frame budget is spent or both queues
    /// are empty. Nothing happens while the buffers are on loan, and a pass
    /// that changes nothing hands nothing off.
    pub fn process(&mut self, clock: &dyn Clock) -> StreamResult<Option<BufferLoan>> {
        if !self.gate.is_resident() {
            return Ok(None);
        }
        if self.queues.is_empty() {
            return if self.dirty {
                self.hand_off().map(Some)
            } else {
                Ok(None)
            };
        }

        let started = clock.now();
        let mut processed = 0usize;
        loop {
            let (key, lane): (SubmeshKey, &dyn StreamLane) =
                if let Some(key) = self.queues.pop_remove() {
                    (key, &self.eviction)
                } else if let Some(key) = self.queues.pop_add() {
                    (key, &self.admission)
                } else {
                    return Ok(None);
                };

            let mesh_id = self.id;
            let store = self
                .gate
                .store_mut()
                .ok_or_else(|| StreamError::OwnershipViolation {
                    mesh_id,
                    details: "lane run without the buffers".into(),
                })?;
            let mut workspace = MeshWorkspace {
                mesh_id: self.id,
                index: &mut self.index,
                store,
                counters: &mut self.counters,
                sources: &self.sources,
                format: self.format,
                topology: self.topology,
            };
            lane.run(&mut workspace, key)?;
            self.dirty = true;
            processed += 1;

            let elapsed = clock.now().saturating_duration_since(started);
            if elapsed > self.frame_budget || self.queues.is_empty() {
                log::debug!(
                    "Mesh {}: {processed} submeshes in {:?} (budget {:?}), handing off",
                    self.id,
                    elapsed,
                    self.frame_budget
                );
                return self.hand_off().map(Some);
            }
        }
    }

    fn hand_off(&mut self) -> StreamResult<BufferLoan> {
        let loan = self.gate.lend(self.id, self.counters.primitive_count)?;
        self.dirty = false;
        self.handoffs += 1;
        Ok(loan)
    }

    /// A snapshot of the mesh's state.
    pub fn status(&self) -> MeshStatus {
        MeshStatus {
            mesh_id: self.id,
            gate: self.gate.state(),
            total_submeshes: self.index.len(),
            resident_submeshes: self.index.visible_count(),
            pending_additions: self.queues.pending_additions(),
            pending_removals: self.queues.pending_removals(),
            channel_bytes: self.gate.layout(),
            primitive_count: self.counters.primitive_count,
            max_index: self.counters.max_index,
            handoffs: self.handoffs,
        }
    }

    /// Verifies the bookkeeping against the buffers.
    ///
    /// Resident segments must tile every channel from offset 0 with no gap or
    /// overlap, visibility must match residency, the counters must equal the
    /// sum over resident submeshes, and queue membership must agree with
    /// residency. While the processor holds the buffers, every resident
    /// index word must also lie in its submesh's rebased range.
    pub fn check_invariants(&self) -> StreamResult<()> {
        let layout = self.gate.layout();

        for (slot, (name, used_length)) in layout.iter().enumerate() {
            let mut expected_offset = 0usize;
            for &key in self.index.resident_in(slot) {
                let entry = self.index.entry(key);
                let length = entry.segment(slot).map_or(0, |s| s.length_bytes);
                if entry.current_offset(slot) != expected_offset as i64 {
                    return Err(StreamError::inconsistency(
                        name.as_str(),
                        format!(
                            "submesh '{}' at {} where {expected_offset} was expected",
                            entry.id(),
                            entry.current_offset(slot)
                        ),
                    ));
                }
                expected_offset += length;
            }
            if expected_offset != *used_length {
                return Err(StreamError::inconsistency(
                    name.as_str(),
                    format!(
                        "resident segments cover {expected_offset} of {used_length} used bytes"
                    ),
                ));
            }
        }

        let mut max_index = 0u64;
        let mut primitive_count = 0u64;
        for key in self.index.keys() {
            let entry = self.index.entry(key);
            let resident: Vec<bool> = entry
                .participating_slots()
                .map(|slot| entry.is_resident_in(slot))
                .collect();
            let consistent = if entry.is_visible() {
                resident.iter().all(|&r| r)
            } else {
                resident.iter().all(|&r| !r)
            };
            if !consistent {
                return Err(StreamError::inconsistency(
                    "*",
                    format!("submesh '{}' is only partly resident", entry.id()),
                ));
            }

            let slot = self.queues.slot(key);
            let misqueued = match slot {
                QueueSlot::Add => entry.is_visible(),
                QueueSlot::Remove => !entry.is_visible(),
                QueueSlot::Idle => false,
            };
            if misqueued {
                return Err(StreamError::inconsistency(
                    "*",
                    format!(
                        "submesh '{}' is queued as {slot:?} against its residency",
                        entry.id()
                    ),
                ));
            }

            if entry.is_visible() {
                if let Some(indices) = entry.indices() {
                    max_index += indices.span();
                    primitive_count += self.topology.primitive_count(indices.count);
                }
            }
        }
        if !self.queues.is_consistent() {
            return Err(StreamError::inconsistency("*", "admission queues overlap"));
        }
        if max_index != self.counters.max_index as u64
            || primitive_count != self.counters.primitive_count
        {
            return Err(StreamError::inconsistency(
                "index",
                format!(
                    "counters ({}, {}) disagree with resident submeshes \
                     ({max_index}, {primitive_count})",
                    self.counters.max_index, self.counters.primitive_count
                ),
            ));
        }

        match (self.index.index_slot(), self.gate.store()) {
            (Some(slot), Some(store)) => self.check_index_words(slot, store),
            _ => Ok(()),
        }
    }

    fn check_index_words(&self, slot: usize, store: &ChannelStore) -> StreamResult<()> {
        let bytes = store
            .channel(slot)
            .map(|c| c.used_bytes())
            .unwrap_or_default();
        let mut expected_base = 0u32;
        for &key in self.index.resident_in(slot) {
            let entry = self.index.entry(key);
            let Some(indices) = entry.indices() else {
                continue;
            };
            if entry.index_base() != Some(expected_base) {
                return Err(StreamError::inconsistency(
                    self.index.channel_name(slot),
                    format!(
                        "submesh '{}' rebased by {:?} where {expected_base} was expected",
                        entry.id(),
                        entry.index_base()
                    ),
                ));
            }

            let offset = entry.current_offset(slot) as usize;
            let view = IndexView::new(bytes, offset, indices.length_bytes, self.format)?;
            let low = expected_base as u64 + indices.min_value as u64;
            let high = expected_base as u64 + indices.max_value as u64;
            if view.iter().any(|v| (v as u64) < low || (v as u64) > high) {
                return Err(StreamError::inconsistency(
                    self.index.channel_name(slot),
                    format!(
                        "submesh '{}' holds indices outside [{low}, {high}]",
                        entry.id()
                    ),
                ));
            }
            expected_base += indices.span() as u32;
        }
        Ok(())
    }
}
