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


//! Registration descriptors: the source channels of a mesh and where each
//! submesh's bytes live inside them.
//!
//! These are the byte ranges a mesh-format parser yields; the stream processor
//! never looks at the accessor model that produced them.

use crate::format::{IndexFormat, PrimitiveTopology};
use crate::id::SubmeshId;
use std::collections::HashMap;
use std::fmt;
use std::ops::Range;

/// A byte range inside a source or assembled buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Segment {
    /// First byte of the range.
    pub start_bytes: usize,
    /// Length of the range in bytes.
    pub length_bytes: usize,
}

impl Segment {
    /// Creates a segment from its start and length.
    pub const fn new(start_bytes: usize, length_bytes: usize) -> Self {
        Self {
            start_bytes,
            length_bytes,
        }
    }

    /// One past the last byte of the range, or `None` if it does not fit in `usize`.
    pub fn end_bytes(&self) -> Option<usize> {
        self.start_bytes.checked_add(self.length_bytes)
    }

    /// The range as a slice index. Callers must have validated [`Segment::end_bytes`].
    pub fn range(&self) -> Range<usize> {
        self.start_bytes..self.start_bytes + self.length_bytes
    }
}

/// The location and value bounds of a submesh's indices in the source index buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IndexSegment {
    /// First byte of the index words.
    pub start_bytes: usize,
    /// Length of the index words in bytes.
    pub length_bytes: usize,
    /// Number of index words.
    pub count: u32,
    /// Smallest index value referenced.
    pub min_value: u32,
    /// Largest index value referenced.
    pub max_value: u32,
}

impl IndexSegment {
    /// Describes `count` indices of the given format starting at `start_bytes`.
    pub fn for_format(
        start_bytes: usize,
        count: u32,
        min_value: u32,
        max_value: u32,
        format: IndexFormat,
    ) -> Self {
        Self {
            start_bytes,
            length_bytes: count as usize * format.width(),
            count,
            min_value,
            max_value,
        }
    }

    /// The byte range of the index words.
    pub fn segment(&self) -> Segment {
        Segment::new(self.start_bytes, self.length_bytes)
    }

    /// The slice of index space this submesh occupies once concatenated: `max_value + 1`.
    pub fn span(&self) -> u64 {
        self.max_value as u64 + 1
    }
}

/// Whether a channel carries vertex attributes or indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    /// Raw attribute bytes, copied verbatim.
    Attribute,
    /// Index words, reindexed as submeshes are concatenated.
    Index,
}

/// A named source buffer handed to the processor at registration.
#[derive(Clone)]
pub struct ChannelDescriptor {
    /// The channel name submesh segments refer to.
    pub name: String,
    /// Attribute or index channel.
    pub kind: ChannelKind,
    /// The source bytes. Copied in at registration.
    pub content: Vec<u8>,
}

impl ChannelDescriptor {
    /// Describes an attribute channel.
    pub fn attribute(name: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            kind: ChannelKind::Attribute,
            content,
        }
    }

    /// Describes the index channel.
    pub fn index(name: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            kind: ChannelKind::Index,
            content,
        }
    }

    /// The length of the source buffer.
    pub fn byte_length(&self) -> usize {
        self.content.len()
    }
}

impl fmt::Debug for ChannelDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelDescriptor")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("byte_length", &self.content.len())
            .finish()
    }
}

/// Where one submesh's data lives in every source channel it participates in.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmeshDescriptor {
    /// The submesh's opaque identity.
    pub id: SubmeshId,
    /// Attribute segments, keyed by channel name.
    pub segments: HashMap<String, Segment>,
    /// The index segment, if the submesh is indexed.
    pub indices: Option<IndexSegment>,
}

impl SubmeshDescriptor {
    /// Creates a submesh that participates in no channel yet.
    pub fn new(id: impl Into<SubmeshId>) -> Self {
        Self {
            id: id.into(),
            segments: HashMap::new(),
            indices: None,
        }
    }

    /// Adds an attribute segment.
    pub fn with_segment(mut self, channel: impl Into<String>, segment: Segment) -> Self {
        self.segments.insert(channel.into(), segment);
        self
    }

    /// Sets the index segment.
    pub fn with_indices(mut self, indices: IndexSegment) -> Self {
        self.indices = Some(indices);
        self
    }
}

/// Everything a `register` message carries.
#[derive(Debug, Clone, Default)]
pub struct MeshDescriptor {
    /// The source channels.
    pub channels: Vec<ChannelDescriptor>,
    /// Every submesh of the mesh.
    pub submeshes: Vec<SubmeshDescriptor>,
    /// Overrides the configured processing rate for this mesh.
    pub ticks_per_second: Option<u32>,
    /// How the index channel is assembled into primitives.
    pub topology: PrimitiveTopology,
}

impl MeshDescriptor {
    /// Creates an empty descriptor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a source channel.
    pub fn with_channel(mut self, channel: ChannelDescriptor) -> Self {
        self.channels.push(channel);
        self
    }

    /// Adds a submesh.
    pub fn with_submesh(mut self, submesh: SubmeshDescriptor) -> Self {
        self.submeshes.push(submesh);
        self
    }

    /// Overrides the processing rate for this mesh.
    pub fn with_ticks_per_second(mut self, ticks_per_second: u32) -> Self {
        self.ticks_per_second = Some(ticks_per_second);
        self
    }

    /// Sets the primitive topology.
    pub fn with_topology(mut self, topology: PrimitiveTopology) -> Self {
        self.topology = topology;
        self
    }
}
