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


//! Fixtures shared by the stream agent tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use tessera_agents::StreamManager;
use tessera_core::descriptor::{
    ChannelDescriptor, IndexSegment, MeshDescriptor, Segment, SubmeshDescriptor,
};
use tessera_core::protocol::{BufferLoan, VisibilityUpdate};
use tessera_core::{IndexFormat, ManualClock, MeshId, StreamConfig, SubmeshId};
use tessera_data::SubmeshKey;

/// Bytes of position data per submesh.
pub const POSITION_STRIDE: usize = 24;
/// Index words per submesh.
pub const INDEX_COUNT: u32 = 6;

/// The 6 local indices of the `i`-th submesh: a rotation of `0..=5`.
pub fn indices_for(i: usize) -> [u16; 6] {
    let mut words = [0, 1, 2, 3, 4, 5];
    words.rotate_left(i % 6);
    words
}

/// A mesh whose `i`-th submesh owns 24 position bytes filled with `i + 1`
/// and 6 indices with `max_value == 5`.
pub fn mesh(ids: &[&str]) -> MeshDescriptor {
    let mut positions = Vec::new();
    let mut indices: Vec<u16> = Vec::new();
    for i in 0..ids.len() {
        positions.extend(std::iter::repeat(i as u8 + 1).take(POSITION_STRIDE));
        indices.extend(indices_for(i));
    }

    let mut descriptor = MeshDescriptor::new()
        .with_channel(ChannelDescriptor::attribute("position", positions))
        .with_channel(ChannelDescriptor::index(
            "index",
            bytemuck::cast_slice::<u16, u8>(&indices).to_vec(),
        ));
    for (i, id) in ids.iter().enumerate() {
        descriptor = descriptor.with_submesh(
            SubmeshDescriptor::new(*id)
                .with_segment("position", Segment::new(i * POSITION_STRIDE, POSITION_STRIDE))
                .with_indices(IndexSegment::for_format(
                    i * 12,
                    INDEX_COUNT,
                    0,
                    5,
                    IndexFormat::U16,
                )),
        );
    }
    descriptor
}

/// A visibility update with no hints.
pub fn visible(ids: &[&str]) -> VisibilityUpdate {
    VisibilityUpdate::new(ids.iter().copied())
}

/// A manager whose clock advances by `step` on every read.
pub fn manager_with_step(
    config: StreamConfig,
    step: Duration,
) -> (StreamManager, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::with_step(step));
    let manager = StreamManager::with_clock(config, clock.clone());
    (manager, clock)
}

/// Decodes the used part of the loan's index channel.
pub fn index_words(loan: &BufferLoan) -> Vec<u16> {
    loan.channel("index")
        .expect("loan has an index channel")
        .used_bytes()
        .chunks_exact(2)
        .map(|w| u16::from_le_bytes([w[0], w[1]]))
        .collect()
}

/// The key of a submesh in a registered mesh.
pub fn key(manager: &StreamManager, mesh_id: MeshId, id: &str) -> SubmeshKey {
    manager
        .mesh(mesh_id)
        .unwrap()
        .index()
        .key_of(&SubmeshId::from(id))
        .expect("unknown submesh")
}

/// Current offset of a submesh in a channel slot.
pub fn offset(manager: &StreamManager, mesh_id: MeshId, id: &str, slot: usize) -> i64 {
    let key = key(manager, mesh_id, id);
    manager
        .mesh(mesh_id)
        .unwrap()
        .index()
        .entry(key)
        .current_offset(slot)
}

/// Ticks until the mesh has no queued work, returning every loan and checking
/// invariants after each tick. Returns the index words of the last loan.
pub fn settle(manager: &mut StreamManager, mesh_id: MeshId) -> Option<Vec<u16>> {
    let mut last = None;
    for _ in 0..100 {
        let report = manager.tick();
        assert!(report.failures.is_empty(), "{:?}", report.failures);
        manager.check_invariants().unwrap();
        for loan in report.loans {
            last = Some(index_words(&loan));
            manager.return_buffers(loan).unwrap();
            manager.check_invariants().unwrap();
        }
        if manager.status(mesh_id).unwrap().is_settled() {
            return last;
        }
    }
    panic!("mesh did not settle");
}
