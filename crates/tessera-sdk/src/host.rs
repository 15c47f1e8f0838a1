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


//! The host side of the message-passing boundary.

use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use tessera_core::descriptor::MeshDescriptor;
use tessera_core::protocol::{BufferLoan, StreamCommand, StreamEvent, VisibilityUpdate};
use tessera_core::{MeshId, StreamError, StreamResult, SubmeshId};

/// A handle for talking to a running [`StreamService`](crate::StreamService).
///
/// Every method only enqueues a command; results arrive later as events.
/// Sending blocks while the command buffer is full.
#[derive(Debug)]
pub struct StreamHost {
    commands: Sender<StreamCommand>,
    events: Receiver<StreamEvent>,
}

impl StreamHost {
    pub(crate) fn new(commands: Sender<StreamCommand>, events: Receiver<StreamEvent>) -> Self {
        Self { commands, events }
    }

    fn send(&self, command: StreamCommand) -> StreamResult<()> {
        self.commands
            .send(command)
            .map_err(|_| StreamError::Disconnected)
    }

    /// Registers a mesh. The id is minted here, so it can be used right away;
    /// a [`StreamEvent::Registered`] or [`StreamEvent::Failed`] follows.
    pub fn register(&self, descriptor: MeshDescriptor) -> StreamResult<MeshId> {
        let mesh_id = MeshId::new();
        self.send(StreamCommand::Register {
            mesh_id,
            descriptor,
        })?;
        Ok(mesh_id)
    }

    /// Replaces the visible set of a mesh.
    pub fn update_visibility(
        &self,
        mesh_id: MeshId,
        update: VisibilityUpdate,
    ) -> StreamResult<()> {
        self.send(StreamCommand::UpdateVisibility { mesh_id, update })
    }

    /// Gives buffers received in a [`StreamEvent::BufferReady`] back.
    pub fn return_buffers(&self, loan: BufferLoan) -> StreamResult<()> {
        self.send(StreamCommand::ReturnBuffers(loan))
    }

    /// Requests levels of detail for some submeshes.
    pub fn change_lod(
        &self,
        mesh_id: MeshId,
        ids: Vec<SubmeshId>,
        lods: Vec<u8>,
    ) -> StreamResult<()> {
        self.send(StreamCommand::ChangeLod { mesh_id, ids, lods })
    }

    /// Drops a mesh on the processor side.
    pub fn deregister(&self, mesh_id: MeshId) -> StreamResult<()> {
        self.send(StreamCommand::Deregister { mesh_id })
    }

    /// Asks for a [`StreamEvent::Status`].
    pub fn query_status(&self, mesh_id: MeshId) -> StreamResult<()> {
        self.send(StreamCommand::QueryStatus { mesh_id })
    }

    /// Asks the processor to stop after the commands already sent.
    pub fn shutdown(&self) -> StreamResult<()> {
        self.send(StreamCommand::Shutdown)
    }

    /// Waits up to `timeout` for the next event.
    ///
    /// Returns `Ok(None)` on timeout and [`StreamError::Disconnected`] once the
    /// processor is gone and every event has been read.
    pub fn recv_event_timeout(&self, timeout: Duration) -> StreamResult<Option<StreamEvent>> {
        match self.events.recv_timeout(timeout) {
            Ok(event) => Ok(Some(event)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(StreamError::Disconnected),
        }
    }

    /// Takes the next event if one is waiting.
    pub fn try_recv_event(&self) -> StreamResult<Option<StreamEvent>> {
        match self.events.try_recv() {
            Ok(event) => Ok(Some(event)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(StreamError::Disconnected),
        }
    }

    /// The raw event receiver, for use with `crossbeam_channel::select!`.
    pub fn events(&self) -> &Receiver<StreamEvent> {
        &self.events
    }
}
