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

use std::time::Duration;

use common::*;
use tessera_core::descriptor::Segment;
use tessera_core::protocol::BufferLoan;
use tessera_core::status::GateState;
use tessera_core::{MeshId, StreamConfig, StreamError, SubmeshId};

#[test]
fn test_bad_registration_leaves_other_meshes_alone() {
    let (mut manager, _clock) = manager_with_step(StreamConfig::default(), Duration::ZERO);
    let good = manager.register(mesh(&["a"])).unwrap();

    let mut broken = mesh(&["a", "b"]);
    broken.submeshes[1]
        .segments
        .insert("position".into(), Segment::new(40, 24));
    let err = manager.register(broken).unwrap_err();

    assert!(matches!(err, StreamError::InvalidDescriptor(_)));
    assert_eq!(manager.mesh_count(), 1);
    assert_eq!(manager.mesh_ids(), &[good]);
}

#[test]
fn test_host_minted_ids_cannot_be_reused() {
    let (mut manager, _clock) = manager_with_step(StreamConfig::default(), Duration::ZERO);
    let mesh_id = MeshId::new();
    manager.register_as(mesh_id, mesh(&["a"])).unwrap();

    let err = manager.register_as(mesh_id, mesh(&["b"])).unwrap_err();
    assert!(matches!(err, StreamError::InvalidDescriptor(_)));
}

#[test]
fn test_unknown_mesh_is_an_error() {
    let (mut manager, _clock) = manager_with_step(StreamConfig::default(), Duration::ZERO);
    let stranger = MeshId::new();

    assert_eq!(
        manager.update_visibility(stranger, &visible(&["a"])).unwrap_err(),
        StreamError::UnknownMesh(stranger)
    );
    assert_eq!(
        manager.status(stranger).unwrap_err(),
        StreamError::UnknownMesh(stranger)
    );
    assert_eq!(
        manager.deregister(stranger).unwrap_err(),
        StreamError::UnknownMesh(stranger)
    );
}

#[test]
fn test_meshes_are_gated_independently() {
    // --- 1. ARRANGE ---
    let (mut manager, _clock) = manager_with_step(StreamConfig::default(), Duration::ZERO);
    let first = manager.register(mesh(&["a", "b"])).unwrap();
    let second = manager.register(mesh(&["x", "y"])).unwrap();
    manager.update_visibility(first, &visible(&["a"])).unwrap();
    manager.update_visibility(second, &visible(&["x"])).unwrap();

    let report = manager.tick();
    assert_eq!(report.loans.len(), 2);
    let mut loans = report.loans.into_iter();
    let first_loan = loans.next().unwrap();
    let second_loan = loans.next().unwrap();
    assert_eq!(first_loan.mesh_id, first, "meshes tick in registration order");
    assert_eq!(second_loan.mesh_id, second);

    // --- 2. ACT ---
    // Only the second mesh gets its buffers back.
    manager.return_buffers(second_loan).unwrap();
    manager.update_visibility(first, &visible(&["a", "b"])).unwrap();
    manager.update_visibility(second, &visible(&["x", "y"])).unwrap();
    let report = manager.tick();

    // --- 3. ASSERT ---
    assert_eq!(report.loans.len(), 1);
    assert_eq!(report.loans[0].mesh_id, second);
    assert_eq!(manager.status(first).unwrap().pending_additions, 1);
    assert_eq!(manager.status(second).unwrap().resident_submeshes, 2);
    drop(first_loan);
}

#[test]
fn test_tampered_loan_is_rejected_and_the_gate_stays_closed() {
    let (mut manager, _clock) = manager_with_step(StreamConfig::default(), Duration::ZERO);
    let mesh_id = manager.register(mesh(&["a"])).unwrap();
    manager.update_visibility(mesh_id, &visible(&["a"])).unwrap();
    let mut loan = manager.tick().loans.pop().unwrap();

    loan.channels.swap(0, 1);
    let err = manager.return_buffers(loan).unwrap_err();

    assert!(matches!(err, StreamError::LoanMismatch { .. }));
    assert_eq!(manager.status(mesh_id).unwrap().gate, GateState::Loaned);
}

#[test]
fn test_returning_buffers_the_processor_holds_is_a_violation() {
    let (mut manager, _clock) = manager_with_step(StreamConfig::default(), Duration::ZERO);
    let mesh_id = manager.register(mesh(&["a"])).unwrap();

    let forged = BufferLoan {
        mesh_id,
        channels: Vec::new(),
        primitive_count: 0,
    };
    let err = manager.return_buffers(forged).unwrap_err();

    assert!(matches!(err, StreamError::OwnershipViolation { .. }));
    assert_eq!(manager.status(mesh_id).unwrap().gate, GateState::Processing);
}

#[test]
fn test_deregistered_mesh_rejects_its_late_loan() {
    let (mut manager, _clock) = manager_with_step(StreamConfig::default(), Duration::ZERO);
    let mesh_id = manager.register(mesh(&["a"])).unwrap();
    manager.update_visibility(mesh_id, &visible(&["a"])).unwrap();
    let loan = manager.tick().loans.pop().unwrap();

    manager.deregister(mesh_id).unwrap();

    assert_eq!(manager.mesh_count(), 0);
    assert_eq!(
        manager.return_buffers(loan).unwrap_err(),
        StreamError::UnknownMesh(mesh_id)
    );
    assert!(manager.tick().is_empty());
}

#[test]
fn test_admit_on_register_streams_everything() {
    let config = StreamConfig {
        admit_on_register: true,
        ..StreamConfig::default()
    };
    let (mut manager, _clock) = manager_with_step(config, Duration::ZERO);

    let mesh_id = manager.register(mesh(&["a", "b", "c"])).unwrap();
    assert_eq!(manager.status(mesh_id).unwrap().pending_additions, 3);

    settle(&mut manager, mesh_id);
    assert_eq!(manager.status(mesh_id).unwrap().resident_submeshes, 3);
}

#[test]
fn test_lod_requests_are_recorded_without_changing_residency() {
    let (mut manager, _clock) = manager_with_step(StreamConfig::default(), Duration::ZERO);
    let mesh_id = manager.register(mesh(&["a", "b"])).unwrap();

    let updated = manager
        .change_lod(
            mesh_id,
            &[SubmeshId::from("a"), SubmeshId::from("missing")],
            &[2, 3],
        )
        .unwrap();

    assert_eq!(updated, 1);
    let a = key(&manager, mesh_id, "a");
    let stream = manager.mesh(mesh_id).unwrap();
    assert_eq!(stream.index().entry(a).requested_lod(), Some(2));
    assert!(stream.queues().is_empty());
    assert!(manager.tick().is_empty());
}
