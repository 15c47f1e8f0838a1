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


//! # Tessera Agents
//!
//! Stateful drivers sitting above the Lanes. A [`MeshStream`] owns everything
//! the processor knows about one mesh and decides, tick by tick, which lane to
//! run and when to lend the buffers to the host. The [`StreamManager`] owns
//! every registered mesh and ticks them round-robin.

#![warn(missing_docs)]

pub mod stream_agent;

pub use stream_agent::{MeshStream, OwnershipGate, StreamManager, TickReport};
