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


//! Tracks which side owns a mesh's assembled buffers.

use tessera_core::protocol::BufferLoan;
use tessera_core::status::GateState;
use tessera_core::{MeshId, StreamError, StreamResult};
use tessera_data::ChannelStore;

/// Who currently holds the buffers of one mesh.
///
/// While the buffers are on loan the processor holds only the layout it lent
/// out, so there is nothing for a lane to mutate.
#[derive(Debug)]
pub enum OwnershipGate {
    /// The processor owns the buffers.
    Processing(ChannelStore),
    /// The host owns the buffers.
    Loaned {
        /// Channel names and used lengths at the time of the handoff.
        layout: Vec<(String, usize)>,
    },
}

impl OwnershipGate {
    /// The gate state, without the buffers.
    pub fn state(&self) -> GateState {
        match self {
            OwnershipGate::Processing(_) => GateState::Processing,
            OwnershipGate::Loaned { .. } => GateState::Loaned,
        }
    }

    /// Returns `true` while the processor may mutate the buffers.
    pub fn is_resident(&self) -> bool {
        matches!(self, OwnershipGate::Processing(_))
    }

    /// The buffers, if the processor holds them.
    pub fn store(&self) -> Option<&ChannelStore> {
        match self {
            OwnershipGate::Processing(store) => Some(store),
            OwnershipGate::Loaned { .. } => None,
        }
    }

    /// The buffers, mutably, if the processor holds them.
    pub fn store_mut(&mut self) -> Option<&mut ChannelStore> {
        match self {
            OwnershipGate::Processing(store) => Some(store),
            OwnershipGate::Loaned { .. } => None,
        }
    }

    /// Channel names and used lengths, wherever the buffers are.
    pub fn layout(&self) -> Vec<(String, usize)> {
        match self {
            OwnershipGate::Processing(store) => store.layout(),
            OwnershipGate::Loaned { layout } => layout.clone(),
        }
    }

    /// Moves the buffers out to the host.
    pub fn lend(&mut self, mesh_id: MeshId, primitive_count: u64) -> StreamResult<BufferLoan> {
        let previous = std::mem::replace(self, OwnershipGate::Loaned { layout: Vec::new() });
        match previous {
            OwnershipGate::Processing(store) => {
                *self = OwnershipGate::Loaned {
                    layout: store.layout(),
                };
                Ok(store.into_loan(mesh_id, primitive_count))
            }
            loaned => {
                *self = loaned;
                Err(StreamError::OwnershipViolation {
                    mesh_id,
                    details: "buffers are already on loan".into(),
                })
            }
        }
    }

    /// Takes the buffers back from the host.
    ///
    /// The loan must match the layout that was lent out. On failure the gate
    /// stays closed.
    pub fn restore(&mut self, loan: BufferLoan, shrink_threshold: f32) -> StreamResult<()> {
        let mesh_id = loan.mesh_id;
        match self {
            OwnershipGate::Processing(_) => Err(StreamError::OwnershipViolation {
                mesh_id,
                details: "buffers returned while the processor owns them".into(),
            }),
            OwnershipGate::Loaned { layout } => {
                let store = ChannelStore::from_loan(loan, layout, shrink_threshold)?;
                *self = OwnershipGate::Processing(store);
                Ok(())
            }
        }
    }
}
