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


//! # Tessera Data
//!
//! Data layouts owned by the stream processor for every registered mesh:
//!
//! - [`SegmentIndex`]: static per-submesh segment descriptions plus their
//!   current offsets in each assembled channel.
//! - [`ChannelStore`]: the growable/shrinkable assembled byte buffers.
//! - [`MeshCounters`]: the index-space high-water mark and primitive count.
//! - [`AdmissionQueues`]: the add/remove queues derived from visibility diffs.

#![warn(missing_docs)]

pub mod channel;
pub mod counters;
pub mod index_view;
pub mod priority;
pub mod queues;
pub mod segment_index;

pub use channel::{Channel, ChannelStore, SourceBuffers};
pub use counters::MeshCounters;
pub use index_view::{IndexView, IndexViewMut};
pub use priority::{insertion_sort_by, PriorityHints, PriorityWeights};
pub use queues::{AdmissionQueues, QueueDelta, QueueSlot};
pub use segment_index::{ChannelInfo, SegmentIndex, SubmeshEntry, SubmeshKey};
