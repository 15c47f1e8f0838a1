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


//! Messages exchanged between the host and the stream processor.
//!
//! The boundary is a message-passing one: buffers cross it by move, never by
//! copy, so the sending side loses access the moment a message is sent.

use crate::descriptor::MeshDescriptor;
use crate::error::StreamError;
use crate::id::{MeshId, SubmeshId};
use crate::status::MeshStatus;
use std::collections::HashMap;
use std::fmt;

/// One assembled channel buffer on loan to the host.
pub struct LoanedChannel {
    /// The channel name.
    pub name: String,
    /// The whole buffer. Only the first `used_length` bytes are meaningful.
    pub bytes: Vec<u8>,
    /// Number of bytes the resident submeshes occupy.
    pub used_length: usize,
}

impl LoanedChannel {
    /// The meaningful prefix of the buffer, ready for upload.
    pub fn used_bytes(&self) -> &[u8] {
        &self.bytes[..self.used_length.min(self.bytes.len())]
    }
}

impl fmt::Debug for LoanedChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoanedChannel")
            .field("name", &self.name)
            .field("capacity", &self.bytes.len())
            .field("used_length", &self.used_length)
            .finish()
    }
}

/// The assembled buffers of a mesh, lent to the host for upload.
///
/// A loan is not `Clone`: the host hands the very same value back with
/// [`StreamCommand::ReturnBuffers`] once the upload is done.
#[derive(Debug)]
pub struct BufferLoan {
    /// The mesh the buffers belong to.
    pub mesh_id: MeshId,
    /// One entry per channel, in registration order.
    pub channels: Vec<LoanedChannel>,
    /// Number of primitives described by the index channel.
    pub primitive_count: u64,
}

impl BufferLoan {
    /// Looks up a channel by name.
    pub fn channel(&self, name: &str) -> Option<&LoanedChannel> {
        self.channels.iter().find(|c| c.name == name)
    }

    /// The channel names, in registration order.
    pub fn channel_names(&self) -> Vec<&str> {
        self.channels.iter().map(|c| c.name.as_str()).collect()
    }

    /// The used length of every channel.
    pub fn channel_lengths(&self) -> HashMap<&str, usize> {
        self.channels
            .iter()
            .map(|c| (c.name.as_str(), c.used_length))
            .collect()
    }
}

/// A level-triggered visibility update: the complete set of submeshes that
/// should be resident, plus optional priority hints.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VisibilityUpdate {
    /// Every submesh that should be visible. Unknown ids are ignored.
    pub visible_ids: Vec<SubmeshId>,
    /// Screen-size style hint per submesh; missing entries keep their last value.
    pub size_hint: HashMap<SubmeshId, f32>,
    /// Camera distance hint per submesh; missing entries keep their last value.
    pub distance_hint: HashMap<SubmeshId, f32>,
}

impl VisibilityUpdate {
    /// Creates an update with no hints.
    pub fn new<I, S>(visible_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<SubmeshId>,
    {
        Self {
            visible_ids: visible_ids.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// Sets the size hint of one submesh.
    pub fn with_size_hint(mut self, id: impl Into<SubmeshId>, hint: f32) -> Self {
        self.size_hint.insert(id.into(), hint);
        self
    }

    /// Sets the distance hint of one submesh.
    pub fn with_distance_hint(mut self, id: impl Into<SubmeshId>, hint: f32) -> Self {
        self.distance_hint.insert(id.into(), hint);
        self
    }
}

/// Messages sent from the host to the stream processor.
#[derive(Debug)]
pub enum StreamCommand {
    /// Registers a mesh under a host-minted id.
    Register {
        /// The id the host will use for this mesh.
        mesh_id: MeshId,
        /// Channels, submeshes and source bytes.
        descriptor: MeshDescriptor,
    },
    /// Replaces the desired visible set of a mesh.
    UpdateVisibility {
        /// The mesh to update.
        mesh_id: MeshId,
        /// The new visible set and hints.
        update: VisibilityUpdate,
    },
    /// Hands lent buffers back to the processor.
    ReturnBuffers(BufferLoan),
    /// Records requested levels of detail.
    ChangeLod {
        /// The mesh the submeshes belong to.
        mesh_id: MeshId,
        /// Submeshes whose level of detail changes.
        ids: Vec<SubmeshId>,
        /// The requested level for each id, pairwise.
        lods: Vec<u8>,
    },
    /// Drops every piece of state of a mesh.
    Deregister {
        /// The mesh to drop.
        mesh_id: MeshId,
    },
    /// Requests a [`StreamEvent::Status`] reply.
    QueryStatus {
        /// The mesh to describe.
        mesh_id: MeshId,
    },
    /// Stops the processor.
    Shutdown,
}

/// Messages sent from the stream processor to the host.
#[derive(Debug)]
pub enum StreamEvent {
    /// A mesh was registered.
    Registered {
        /// The registered mesh.
        mesh_id: MeshId,
    },
    /// Rebuilt buffers, with ownership transferred to the host.
    BufferReady(BufferLoan),
    /// Reply to [`StreamCommand::QueryStatus`].
    Status(MeshStatus),
    /// A command or a processing pass failed for a mesh.
    Failed {
        /// The mesh concerned.
        mesh_id: MeshId,
        /// What went wrong.
        error: StreamError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loan_exposes_used_prefix_only() {
        let loan = BufferLoan {
            mesh_id: MeshId::new(),
            channels: vec![LoanedChannel {
                name: "position".into(),
                bytes: vec![1, 2, 3, 0, 0, 0],
                used_length: 3,
            }],
            primitive_count: 0,
        };

        let channel = loan.channel("position").expect("channel should exist");
        assert_eq!(channel.used_bytes(), &[1, 2, 3]);
        assert_eq!(loan.channel_names(), vec!["position"]);
        assert_eq!(loan.channel_lengths().get("position"), Some(&3));
        assert!(loan.channel("normal").is_none());
    }

    #[test]
    fn visibility_update_builder_collects_hints() {
        let update = VisibilityUpdate::new(["a", "b"])
            .with_size_hint("a", 2.0)
            .with_distance_hint("b", 7.5);
        assert_eq!(update.visible_ids.len(), 2);
        assert_eq!(update.size_hint.get(&SubmeshId::from("a")), Some(&2.0));
        assert_eq!(update.distance_hint.get(&SubmeshId::from("b")), Some(&7.5));
    }
}
