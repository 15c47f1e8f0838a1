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


//! The public-facing API of Tessera.
//!
//! [`StreamService`] runs the stream processor on its own thread. The host
//! talks to it only through a [`StreamHost`], which sends [`StreamCommand`]s
//! and receives [`StreamEvent`]s. Buffers cross the boundary by move, so at
//! any moment exactly one side can touch a mesh's assembled channels.
//!
//! [`StreamCommand`]: tessera_core::protocol::StreamCommand
//! [`StreamEvent`]: tessera_core::protocol::StreamEvent

#![warn(missing_docs)]

mod host;
mod service;

pub use host::StreamHost;
pub use service::StreamService;

/// Everything a host application usually needs.
pub mod prelude {
    pub use crate::{StreamHost, StreamService};
    pub use tessera_core::descriptor::{
        ChannelDescriptor, IndexSegment, MeshDescriptor, Segment, SubmeshDescriptor,
    };
    pub use tessera_core::protocol::{BufferLoan, StreamEvent, VisibilityUpdate};
    pub use tessera_core::status::{GateState, MeshStatus};
    pub use tessera_core::{
        IndexFormat, MeshId, PrimitiveTopology, StreamConfig, StreamError, StreamResult,
        SubmeshId,
    };
}
