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


//! Index widths and primitive topologies understood by the stream processor.

use serde::{Deserialize, Serialize};

/// The width of the words stored in an index channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum IndexFormat {
    /// 16-bit unsigned indices (`UNSIGNED_SHORT`).
    #[default]
    U16,
    /// 32-bit unsigned indices (`UNSIGNED_INT`).
    U32,
}

impl IndexFormat {
    /// The size of a single index word, in bytes.
    pub const fn width(self) -> usize {
        match self {
            IndexFormat::U16 => 2,
            IndexFormat::U32 => 4,
        }
    }

    /// The largest index value a word of this format can hold.
    pub const fn max_value(self) -> u32 {
        match self {
            IndexFormat::U16 => u16::MAX as u32,
            IndexFormat::U32 => u32::MAX,
        }
    }
}

/// How the indices of a mesh are assembled into primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PrimitiveTopology {
    /// Every three indices form a triangle.
    #[default]
    Triangles,
    /// Every two indices form a line segment.
    Lines,
    /// Every index is a point.
    Points,
}

impl PrimitiveTopology {
    /// The number of primitives described by `index_count` indices.
    pub const fn primitive_count(self, index_count: u32) -> u64 {
        let count = index_count as u64;
        match self {
            PrimitiveTopology::Triangles => count / 3,
            PrimitiveTopology::Lines => count / 2,
            PrimitiveTopology::Points => count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_format_limits() {
        assert_eq!(IndexFormat::U16.width(), 2);
        assert_eq!(IndexFormat::U16.max_value(), 65_535);
        assert_eq!(IndexFormat::U32.width(), 4);
        assert_eq!(IndexFormat::U32.max_value(), u32::MAX);
    }

    #[test]
    fn primitive_counts_follow_topology() {
        assert_eq!(PrimitiveTopology::Triangles.primitive_count(6), 2);
        assert_eq!(PrimitiveTopology::Lines.primitive_count(6), 3);
        assert_eq!(PrimitiveTopology::Points.primitive_count(6), 6);
    }
}
