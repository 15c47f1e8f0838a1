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


//! Owns every registered mesh and ticks them round-robin.

use std::collections::HashMap;
use std::sync::Arc;

use tessera_core::descriptor::MeshDescriptor;
use tessera_core::protocol::{BufferLoan, VisibilityUpdate};
use tessera_core::status::MeshStatus;
use tessera_core::{
    Clock, MeshId, StreamConfig, StreamError, StreamResult, SubmeshId, SystemClock,
};
use tessera_data::QueueDelta;

use super::mesh_stream::MeshStream;

/// What one tick produced.
#[derive(Debug, Default)]
pub struct TickReport {
    /// Buffers handed to the host, one per mesh at most.
    pub loans: Vec<BufferLoan>,
    /// Meshes whose processing pass failed.
    pub failures: Vec<(MeshId, StreamError)>,
}

impl TickReport {
    /// Returns `true` if the tick produced neither loans nor failures.
    pub fn is_empty(&self) -> bool {
        self.loans.is_empty() && self.failures.is_empty()
    }
}

/// The stream processor's view of every registered mesh.
pub struct StreamManager {
    config: StreamConfig,
    clock: Arc<dyn Clock>,
    meshes: HashMap<MeshId, MeshStream>,
    /// Registration order, for round-robin ticking.
    order: Vec<MeshId>,
}

impl std::fmt::Debug for StreamManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamManager")
            .field("config", &self.config)
            .field("meshes", &self.order)
            .finish()
    }
}

impl StreamManager {
    /// Creates a manager timing its passes with the system clock.
    pub fn new(config: StreamConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Creates a manager with a custom clock.
    pub fn with_clock(config: StreamConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            meshes: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// The configuration new meshes are created with.
    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Registers a mesh under a fresh id.
    pub fn register(&mut self, descriptor: MeshDescriptor) -> StreamResult<MeshId> {
        let mesh_id = MeshId::new();
        self.register_as(mesh_id, descriptor)?;
        Ok(mesh_id)
    }

    /// Registers a mesh under an id minted by the host.
    ///
    /// A failed registration leaves every other mesh untouched.
    pub fn register_as(
        &mut self,
        mesh_id: MeshId,
        descriptor: MeshDescriptor,
    ) -> StreamResult<()> {
        if self.meshes.contains_key(&mesh_id) {
            return Err(StreamError::invalid(format!(
                "mesh {mesh_id} is already registered"
            )));
        }
        let stream = MeshStream::new(mesh_id, descriptor, &self.config)?;
        self.meshes.insert(mesh_id, stream);
        self.order.push(mesh_id);
        Ok(())
    }

    /// Replaces the desired visible set of a mesh.
    pub fn update_visibility(
        &mut self,
        mesh_id: MeshId,
        update: &VisibilityUpdate,
    ) -> StreamResult<QueueDelta> {
        Ok(self.mesh_mut(mesh_id)?.update_visibility(update))
    }

    /// Hands a loan back to the mesh it came from.
    pub fn return_buffers(&mut self, loan: BufferLoan) -> StreamResult<()> {
        self.mesh_mut(loan.mesh_id)?.return_buffers(loan)
    }

    /// Records requested levels of detail.
    pub fn change_lod(
        &mut self,
        mesh_id: MeshId,
        ids: &[SubmeshId],
        lods: &[u8],
    ) -> StreamResult<usize> {
        Ok(self.mesh_mut(mesh_id)?.change_lod(ids, lods))
    }

    /// Drops a mesh and every piece of state attached to it.
    ///
    /// A mesh on loan can be dropped too; its buffers are then never expected back.
    pub fn deregister(&mut self, mesh_id: MeshId) -> StreamResult<()> {
        let stream = self
            .meshes
            .remove(&mesh_id)
            .ok_or(StreamError::UnknownMesh(mesh_id))?;
        self.order.retain(|id| *id != mesh_id);
        log::info!(
            "Mesh {mesh_id}: deregistered ({:?}, {} handoffs)",
            stream.gate().state(),
            stream.handoffs()
        );
        Ok(())
    }

    /// Runs one processing pass over every mesh, in registration order.
    pub fn tick(&mut self) -> TickReport {
        let mut report = TickReport::default();
        for mesh_id in &self.order {
            let Some(stream) = self.meshes.get_mut(mesh_id) else {
                continue;
            };
            match stream.process(self.clock.as_ref()) {
                Ok(Some(loan)) => report.loans.push(loan),
                Ok(None) => {}
                Err(error) => {
                    log::error!("Mesh {mesh_id}: processing failed: {error}");
                    report.failures.push((*mesh_id, error));
                }
            }
        }
        report
    }

    /// A snapshot of one mesh.
    pub fn status(&self, mesh_id: MeshId) -> StreamResult<MeshStatus> {
        Ok(self.mesh(mesh_id)?.status())
    }

    /// Looks up a mesh.
    pub fn mesh(&self, mesh_id: MeshId) -> StreamResult<&MeshStream> {
        self.meshes
            .get(&mesh_id)
            .ok_or(StreamError::UnknownMesh(mesh_id))
    }

    fn mesh_mut(&mut self, mesh_id: MeshId) -> StreamResult<&mut MeshStream> {
        self.meshes
            .get_mut(&mesh_id)
            .ok_or(StreamError::UnknownMesh(mesh_id))
    }

    /// Number of registered meshes.
    pub fn mesh_count(&self) -> usize {
        self.order.len()
    }

    /// Registered mesh ids, in registration order.
    pub fn mesh_ids(&self) -> &[MeshId] {
        &self.order
    }

    /// Returns `true` when no mesh has queued work.
    pub fn is_idle(&self) -> bool {
        self.meshes.values().all(|m| m.queues().is_empty())
    }

    /// Checks the bookkeeping of every mesh, stopping at the first violation.
    pub fn check_invariants(&self) -> Result<(), (MeshId, StreamError)> {
        for mesh_id in &self.order {
            if let Some(stream) = self.meshes.get(mesh_id) {
                stream.check_invariants().map_err(|e| (*mesh_id, e))?;
            }
        }
        Ok(())
    }
}
