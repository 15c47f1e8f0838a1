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


//! Admission queues derived from visibility-set diffs.

use crate::priority::{insertion_sort_by, PriorityWeights};
use crate::segment_index::{SegmentIndex, SubmeshKey};
use std::collections::{HashSet, VecDeque};

/// Which queue, if any, a submesh currently sits in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum QueueSlot {
    /// In neither queue.
    #[default]
    Idle,
    /// Waiting to be admitted.
    Add,
    /// Waiting to be evicted.
    Remove,
}

/// What a visibility update changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueDelta {
    /// Submeshes newly queued for admission.
    pub enqueued_additions: usize,
    /// Submeshes newly queued for eviction.
    pub enqueued_removals: usize,
    /// Queued additions withdrawn because the submesh became invisible again.
    pub cancelled_additions: usize,
    /// Queued removals withdrawn because the submesh became visible again.
    pub cancelled_removals: usize,
}

/// The add-queue and remove-queue of one mesh.
///
/// A submesh sits in at most one of them; the per-submesh [`QueueSlot`] makes
/// that membership test constant time.
#[derive(Debug, Clone, Default)]
pub struct AdmissionQueues {
    add: VecDeque<SubmeshKey>,
    remove: VecDeque<SubmeshKey>,
    slots: Vec<QueueSlot>,
}

impl AdmissionQueues {
    /// Creates empty queues for `submesh_count` submeshes.
    pub fn new(submesh_count: usize) -> Self {
        Self {
            add: VecDeque::new(),
            remove: VecDeque::new(),
            slots: vec![QueueSlot::Idle; submesh_count],
        }
    }

    /// The queue a submesh sits in.
    pub fn slot(&self, key: SubmeshKey) -> QueueSlot {
        self.slots.get(key.index()).copied().unwrap_or_default()
    }

    /// Diffs a new visible set against the current state.
    ///
    /// Cancellation comes first: a submesh whose visibility flips back before
    /// it was processed is withdrawn from its queue instead of being queued for
    /// the opposite operation.
    pub fn apply_visibility(
        &mut self,
        index: &SegmentIndex,
        visible: &HashSet<SubmeshKey>,
    ) -> QueueDelta {
        let mut delta = QueueDelta::default();

        for key in index.keys() {
            let now_visible = visible.contains(&key);
            let resident = index.entry(key).is_visible();
            let slot = &mut self.slots[key.index()];

            match (now_visible, *slot) {
                (true, QueueSlot::Remove) => {
                    *slot = QueueSlot::Idle;
                    delta.cancelled_removals += 1;
                }
                (true, QueueSlot::Idle) if !resident => {
                    *slot = QueueSlot::Add;
                    self.add.push_back(key);
                    delta.enqueued_additions += 1;
                }
                (false, QueueSlot::Add) => {
                    *slot = QueueSlot::Idle;
                    delta.cancelled_additions += 1;
                }
                (false, QueueSlot::Idle) if resident => {
                    *slot = QueueSlot::Remove;
                    self.remove.push_back(key);
                    delta.enqueued_removals += 1;
                }
                _ => {}
            }
        }

        if delta.cancelled_additions > 0 {
            let slots = &self.slots;
            self.add.retain(|k| slots[k.index()] == QueueSlot::Add);
        }
        if delta.cancelled_removals > 0 {
            let slots = &self.slots;
            self.remove.retain(|k| slots[k.index()] == QueueSlot::Remove);
        }

        delta
    }

    /// Queues a submesh for admission unless it is already queued.
    pub fn enqueue_add(&mut self, key: SubmeshKey) -> bool {
        if self.slots[key.index()] != QueueSlot::Idle {
            return false;
        }
        self.slots[key.index()] = QueueSlot::Add;
        self.add.push_back(key);
        true
    }

    /// Reorders the add-queue ascending by admission priority.
    pub fn prioritize(&mut self, index: &SegmentIndex, weights: &PriorityWeights) {
        insertion_sort_by(self.add.make_contiguous(), |a, b| {
            weights.compare(&index.entry(*a).hints(), &index.entry(*b).hints())
        });
    }

    /// Takes the next submesh to admit.
    pub fn pop_add(&mut self) -> Option<SubmeshKey> {
        let key = self.add.pop_front()?;
        self.slots[key.index()] = QueueSlot::Idle;
        Some(key)
    }

    /// Takes the next submesh to evict.
    pub fn pop_remove(&mut self) -> Option<SubmeshKey> {
        let key = self.remove.pop_front()?;
        self.slots[key.index()] = QueueSlot::Idle;
        Some(key)
    }

    /// The add-queue, in admission order.
    pub fn additions(&self) -> impl Iterator<Item = SubmeshKey> + '_ {
        self.add.iter().copied()
    }

    /// The remove-queue, in eviction order.
    pub fn removals(&self) -> impl Iterator<Item = SubmeshKey> + '_ {
        self.remove.iter().copied()
    }

    /// Length of the add-queue.
    pub fn pending_additions(&self) -> usize {
        self.add.len()
    }

    /// Length of the remove-queue.
    pub fn pending_removals(&self) -> usize {
        self.remove.len()
    }

    /// Returns `true` when both queues are empty.
    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.remove.is_empty()
    }

    /// Checks that no submesh is in both queues and that the slots agree with
    /// queue membership.
    pub fn is_consistent(&self) -> bool {
        let adds: HashSet<_> = self.add.iter().collect();
        let removes: HashSet<_> = self.remove.iter().collect();
        adds.len() == self.add.len()
            && removes.len() == self.remove.len()
            && adds.is_disjoint(&removes)
            && self.add.iter().all(|k| self.slot(*k) == QueueSlot::Add)
            && self.remove.iter().all(|k| self.slot(*k) == QueueSlot::Remove)
    }
}
