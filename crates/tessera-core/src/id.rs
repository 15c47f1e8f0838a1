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


//! Identifiers for registered meshes and their submeshes.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// A unique identifier for a mesh registered with the stream processor.
///
/// Mesh ids are minted on the host side so that a `Register` command and every
/// command that follows it can be addressed before the processor has replied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MeshId(Uuid);

impl MeshId {
    /// Creates a new, random (version 4) `MeshId`.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for MeshId {
    /// Creates a new, random (version 4) `MeshId`.
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MeshId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The opaque identifier of a submesh within a mesh.
///
/// Source formats reference submeshes either by string (e.g. a UUID written by an
/// exporter) or by integer position; both are stored in their textual form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubmeshId(String);

impl SubmeshId {
    /// Creates a submesh id from anything string-like.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the textual form of the id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SubmeshId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for SubmeshId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<u64> for SubmeshId {
    fn from(value: u64) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for SubmeshId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
