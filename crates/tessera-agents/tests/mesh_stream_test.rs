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


mod common;

use std::collections::HashSet;
use std::time::Duration;

use common::*;
use tessera_core::descriptor::{
    ChannelDescriptor, IndexSegment, MeshDescriptor, SubmeshDescriptor,
};
use tessera_core::protocol::VisibilityUpdate;
use tessera_core::status::GateState;
use tessera_core::{IndexFormat, StreamConfig, StreamError, SubmeshId};

const POSITION: usize = 0;

fn rebased(i: usize, base: u16) -> Vec<u16> {
    indices_for(i).iter().map(|w| w + base).collect()
}

#[test]
fn test_three_visible_submeshes_are_concatenated_with_unique_indices() {
    // --- 1. ARRANGE ---
    let (mut manager, _clock) = manager_with_step(StreamConfig::default(), Duration::ZERO);
    let mesh_id = manager.register(mesh(&["a", "b", "c"])).unwrap();
    manager
        .update_visibility(mesh_id, &visible(&["a", "b", "c"]))
        .unwrap();

    // --- 2. ACT ---
    let mut report = manager.tick();

    // --- 3. ASSERT ---
    assert!(report.failures.is_empty());
    assert_eq!(report.loans.len(), 1, "an emptied queue hands the buffers off");
    let loan = report.loans.pop().unwrap();
    assert_eq!(loan.mesh_id, mesh_id);
    assert_eq!(loan.primitive_count, 6);
    assert_eq!(loan.channel_names(), vec!["position", "index"]);
    assert_eq!(loan.channel_lengths()["index"], 36);

    let expected = [rebased(0, 0), rebased(1, 6), rebased(2, 12)].concat();
    assert_eq!(index_words(&loan), expected);

    let status = manager.status(mesh_id).unwrap();
    assert_eq!(status.max_index, 18);
    assert_eq!(status.resident_submeshes, 3);
    assert_eq!(status.gate, GateState::Loaned);
    assert_eq!(status.handoffs, 1);
}

#[test]
fn test_evicting_the_middle_submesh_reindexes_the_tail() {
    // --- 1. ARRANGE ---
    let (mut manager, _clock) = manager_with_step(StreamConfig::default(), Duration::ZERO);
    let mesh_id = manager.register(mesh(&["a", "b", "c"])).unwrap();
    manager
        .update_visibility(mesh_id, &visible(&["a", "b", "c"]))
        .unwrap();
    settle(&mut manager, mesh_id);

    // --- 2. ACT ---
    manager
        .update_visibility(mesh_id, &visible(&["a", "c"]))
        .unwrap();
    let words = settle(&mut manager, mesh_id).expect("eviction hands the buffers off");

    // --- 3. ASSERT ---
    assert_eq!(words, [rebased(0, 0), rebased(2, 6)].concat());
    let status = manager.status(mesh_id).unwrap();
    assert_eq!(status.max_index, 12);
    assert_eq!(status.primitive_count, 4);
    assert_eq!(offset(&manager, mesh_id, "c", POSITION), 24);
    assert_eq!(offset(&manager, mesh_id, "b", POSITION), -1);
}

#[test]
fn test_loaned_mesh_is_not_processed_until_returned() {
    // --- 1. ARRANGE ---
    let (mut manager, _clock) = manager_with_step(StreamConfig::default(), Duration::ZERO);
    let mesh_id = manager.register(mesh(&["a", "b"])).unwrap();
    manager.update_visibility(mesh_id, &visible(&["a"])).unwrap();
    let mut first = manager.tick();
    let loan = first.loans.pop().expect("first pass hands off");

    // --- 2. ACT ---
    manager
        .update_visibility(mesh_id, &visible(&["a", "b"]))
        .unwrap();
    let blocked = manager.tick();

    // --- 3. ASSERT ---
    assert!(blocked.is_empty(), "a loaned mesh must be skipped");
    let status = manager.status(mesh_id).unwrap();
    assert_eq!(status.gate, GateState::Loaned);
    assert_eq!(status.pending_additions, 1);
    assert_eq!(status.resident_submeshes, 1);

    manager.return_buffers(loan).unwrap();
    let resumed = manager.tick();
    assert_eq!(resumed.loans.len(), 1);
    assert_eq!(manager.status(mesh_id).unwrap().resident_submeshes, 2);
}

#[test]
fn test_spent_frame_budget_hands_off_mid_queue() {
    // --- 1. ARRANGE ---
    // 100 ticks/s gives a 10 ms budget; every clock read costs 6 ms, so two
    // submeshes fit in one pass.
    let (mut manager, _clock) =
        manager_with_step(StreamConfig::default(), Duration::from_millis(6));
    let ids = ["a", "b", "c", "d", "e"];
    let mesh_id = manager
        .register(mesh(&ids).with_ticks_per_second(100))
        .unwrap();
    manager.update_visibility(mesh_id, &visible(&ids)).unwrap();

    // --- 2. ACT & 3. ASSERT ---
    let mut resident_after_each_pass = Vec::new();
    for _ in 0..3 {
        let mut report = manager.tick();
        assert_eq!(report.loans.len(), 1);
        resident_after_each_pass.push(manager.status(mesh_id).unwrap().resident_submeshes);
        manager.return_buffers(report.loans.pop().unwrap()).unwrap();
    }
    assert_eq!(resident_after_each_pass, vec![2, 4, 5]);
    assert_eq!(manager.status(mesh_id).unwrap().handoffs, 3);
    assert!(manager.tick().is_empty(), "nothing changed, nothing handed off");
}

#[test]
fn test_removals_drain_before_additions() {
    // --- 1. ARRANGE ---
    let (mut manager, _clock) =
        manager_with_step(StreamConfig::default(), Duration::from_millis(6));
    let mesh_id = manager
        .register(mesh(&["a", "b", "c"]).with_ticks_per_second(100))
        .unwrap();
    manager
        .update_visibility(mesh_id, &visible(&["a", "b"]))
        .unwrap();
    settle(&mut manager, mesh_id);

    // --- 2. ACT ---
    manager.update_visibility(mesh_id, &visible(&["c"])).unwrap();
    let mut report = manager.tick();

    // --- 3. ASSERT ---
    let loan = report.loans.pop().expect("budget spent after two evictions");
    let status = manager.status(mesh_id).unwrap();
    assert_eq!(status.resident_submeshes, 0);
    assert_eq!(status.pending_removals, 0);
    assert_eq!(status.pending_additions, 1);
    assert_eq!(loan.channel_lengths()["position"], 0);

    manager.return_buffers(loan).unwrap();
    let words = settle(&mut manager, mesh_id).unwrap();
    assert_eq!(words, rebased(2, 0));
}

#[test]
fn test_add_queue_follows_priority_order() {
    // --- 1. ARRANGE ---
    let (mut manager, _clock) = manager_with_step(StreamConfig::default(), Duration::ZERO);
    let mesh_id = manager.register(mesh(&["a", "b", "c", "d"])).unwrap();
    let update = VisibilityUpdate::new(["a", "b", "c", "d"])
        .with_size_hint("a", 3.0)
        .with_size_hint("b", 1.0)
        .with_size_hint("c", 2.0)
        .with_size_hint("d", 1.0)
        .with_distance_hint("b", 5.0)
        .with_distance_hint("d", 2.0);

    // --- 2. ACT ---
    manager.update_visibility(mesh_id, &update).unwrap();

    // --- 3. ASSERT ---
    let stream = manager.mesh(mesh_id).unwrap();
    let order: Vec<&str> = stream
        .queues()
        .additions()
        .map(|key| stream.index().entry(key).id().as_str())
        .collect();
    assert_eq!(order, vec!["d", "b", "c", "a"]);

    settle(&mut manager, mesh_id);
    assert_eq!(offset(&manager, mesh_id, "d", POSITION), 0);
    assert_eq!(offset(&manager, mesh_id, "b", POSITION), 24);
    assert_eq!(offset(&manager, mesh_id, "a", POSITION), 72);
}

#[test]
fn test_flipping_an_absent_submesh_leaves_it_queued_for_admission() {
    let (mut manager, _clock) = manager_with_step(StreamConfig::default(), Duration::ZERO);
    let mesh_id = manager.register(mesh(&["a", "b", "c", "d"])).unwrap();

    manager.update_visibility(mesh_id, &visible(&["d"])).unwrap();
    let delta = manager.update_visibility(mesh_id, &visible(&[])).unwrap();
    assert_eq!(delta.cancelled_additions, 1);
    manager.update_visibility(mesh_id, &visible(&["d"])).unwrap();

    let stream = manager.mesh(mesh_id).unwrap();
    let d = key(&manager, mesh_id, "d");
    assert_eq!(stream.queues().additions().collect::<Vec<_>>(), vec![d]);
    assert_eq!(stream.queues().pending_removals(), 0);

    settle(&mut manager, mesh_id);
    assert_eq!(manager.status(mesh_id).unwrap().resident_submeshes, 1);
}

#[test]
fn test_flipping_a_resident_submesh_never_evicts_it() {
    let (mut manager, _clock) = manager_with_step(StreamConfig::default(), Duration::ZERO);
    let mesh_id = manager.register(mesh(&["a", "b", "c", "d"])).unwrap();
    manager.update_visibility(mesh_id, &visible(&["d"])).unwrap();
    settle(&mut manager, mesh_id);

    manager.update_visibility(mesh_id, &visible(&[])).unwrap();
    let delta = manager.update_visibility(mesh_id, &visible(&["d"])).unwrap();

    assert_eq!(delta.cancelled_removals, 1);
    assert!(manager.mesh(mesh_id).unwrap().queues().is_empty());
    assert!(manager.tick().is_empty());
    let status = manager.status(mesh_id).unwrap();
    assert_eq!(status.resident_submeshes, 1);
    assert_eq!(status.handoffs, 1);
}

#[test]
fn test_unknown_submesh_ids_are_ignored() {
    let (mut manager, _clock) = manager_with_step(StreamConfig::default(), Duration::ZERO);
    let mesh_id = manager.register(mesh(&["a", "b"])).unwrap();

    let delta = manager
        .update_visibility(mesh_id, &visible(&["a", "not-yet-registered"]))
        .unwrap();

    assert_eq!(delta.enqueued_additions, 1);
    settle(&mut manager, mesh_id);
    assert_eq!(manager.status(mesh_id).unwrap().resident_submeshes, 1);
}

#[test]
fn test_admit_then_evict_restores_the_previous_layout() {
    // --- 1. ARRANGE ---
    let (mut manager, _clock) = manager_with_step(StreamConfig::default(), Duration::ZERO);
    let mesh_id = manager.register(mesh(&["a", "b", "c"])).unwrap();
    manager
        .update_visibility(mesh_id, &visible(&["a", "b"]))
        .unwrap();
    let before_words = settle(&mut manager, mesh_id);
    let before = manager.status(mesh_id).unwrap();
    let before_offsets: Vec<i64> = ["a", "b"]
        .iter()
        .flat_map(|id| [0, 1].map(|slot| offset(&manager, mesh_id, id, slot)))
        .collect();

    // --- 2. ACT ---
    manager
        .update_visibility(mesh_id, &visible(&["a", "b", "c"]))
        .unwrap();
    settle(&mut manager, mesh_id);
    manager
        .update_visibility(mesh_id, &visible(&["a", "b"]))
        .unwrap();
    let after_words = settle(&mut manager, mesh_id);

    // --- 3. ASSERT ---
    let after = manager.status(mesh_id).unwrap();
    assert_eq!(after.channel_bytes, before.channel_bytes);
    assert_eq!(after.max_index, before.max_index);
    assert_eq!(after_words, before_words);
    let after_offsets: Vec<i64> = ["a", "b"]
        .iter()
        .flat_map(|id| [0, 1].map(|slot| offset(&manager, mesh_id, id, slot)))
        .collect();
    assert_eq!(after_offsets, before_offsets);
}

#[test]
fn test_invariants_hold_under_visibility_churn() {
    // --- 1. ARRANGE ---
    let (mut manager, _clock) =
        manager_with_step(StreamConfig::default(), Duration::from_millis(6));
    let ids = ["a", "b", "c", "d", "e", "f"];
    let mesh_id = manager
        .register(mesh(&ids).with_ticks_per_second(100))
        .unwrap();
    let frames: [&[&str]; 6] = [
        &["a", "b", "c", "d", "e", "f"],
        &["b", "d", "f"],
        &["a", "f"],
        &["c", "d", "e", "f"],
        &[],
        &["e", "a", "c"],
    ];

    // --- 2. ACT & 3. ASSERT ---
    for frame in frames {
        manager.update_visibility(mesh_id, &visible(frame)).unwrap();
        let words = settle(&mut manager, mesh_id).unwrap_or_default();

        let status = manager.status(mesh_id).unwrap();
        assert_eq!(status.resident_submeshes, frame.len());
        assert_eq!(status.max_index as usize, 6 * frame.len());

        let unique: HashSet<u16> = words.iter().copied().collect();
        assert_eq!(unique.len(), words.len(), "index values collide");
        assert!(words.iter().all(|&w| (w as u32) < status.max_index));
    }
}

#[test]
fn test_index_overflow_is_reported_and_the_rest_still_streams() {
    // --- 1. ARRANGE ---
    let indices: [u16; 6] = [0, 40_000, 1, 2, 40_000, 3];
    let setup = |config: StreamConfig| {
        let descriptor = MeshDescriptor::new()
            .with_channel(ChannelDescriptor::index(
                "index",
                bytemuck::cast_slice::<u16, u8>(&indices[..]).to_vec(),
            ))
            .with_submesh(
                SubmeshDescriptor::new("near")
                    .with_indices(IndexSegment::for_format(0, 3, 0, 40_000, IndexFormat::U16)),
            )
            .with_submesh(
                SubmeshDescriptor::new("far")
                    .with_indices(IndexSegment::for_format(6, 3, 2, 40_000, IndexFormat::U16)),
            );
        let (mut manager, clock) = manager_with_step(config, Duration::ZERO);
        let mesh_id = manager.register(descriptor).unwrap();
        manager
            .update_visibility(mesh_id, &visible(&["near", "far"]))
            .unwrap();
        (manager, clock, mesh_id)
    };
    let (mut manager, _clock, mesh_id) = setup(StreamConfig::default());

    // --- 2. ACT ---
    let failed = manager.tick();
    let handed_off = manager.tick();

    // --- 3. ASSERT ---
    assert!(failed.loans.is_empty());
    assert_eq!(failed.failures.len(), 1);
    let (failed_mesh, error) = &failed.failures[0];
    assert_eq!(*failed_mesh, mesh_id);
    assert_eq!(
        *error,
        StreamError::IndexOverflow {
            submesh: SubmeshId::from("far"),
            required: 80_001,
            limit: 65_535,
        }
    );

    assert_eq!(handed_off.loans.len(), 1, "admitted work is still handed off");
    let status = manager.status(mesh_id).unwrap();
    assert_eq!(status.resident_submeshes, 1);
    assert_eq!(status.max_index, 40_001);
    assert!(status.is_settled());
    manager.check_invariants().unwrap();
}
