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


//! Defines the error taxonomy of the streaming engine.

use crate::id::{MeshId, SubmeshId};

/// A convenience alias for results produced by the streaming engine.
pub type StreamResult<T> = Result<T, StreamError>;

/// Every failure the stream processor can report.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StreamError {
    /// Malformed registration data, or a byte view that does not fit its buffer.
    /// Fatal to that mesh's registration only.
    #[error("Invalid descriptor: {0}")]
    InvalidDescriptor(String),

    /// An internal bookkeeping invariant does not hold. This is a programming
    /// error, never a recoverable condition.
    #[error("Offset inconsistency in channel '{channel}': {details}")]
    OffsetInconsistency {
        /// The channel whose bookkeeping disagrees with its buffer.
        channel: String,
        /// What was found.
        details: String,
    },

    /// The buffers of a mesh were addressed while they were on loan to the host,
    /// or a loan was returned to a mesh that never lent it.
    #[error("Ownership violation on mesh {mesh_id}: {details}")]
    OwnershipViolation {
        /// The mesh whose gate was violated.
        mesh_id: MeshId,
        /// What was attempted.
        details: String,
    },

    /// Admitting a submesh would push index values past the configured width.
    #[error("Index overflow admitting submesh '{submesh}': {required} exceeds limit {limit}")]
    IndexOverflow {
        /// The submesh that could not be admitted.
        submesh: SubmeshId,
        /// The largest index value admission would have produced.
        required: u64,
        /// The largest value the index format can hold.
        limit: u64,
    },

    /// The mesh is not registered (or has been deregistered).
    #[error("Unknown mesh {0}")]
    UnknownMesh(MeshId),

    /// Buffers returned by the host do not match what was lent out.
    #[error("Buffer loan mismatch for mesh {mesh_id}: {details}")]
    LoanMismatch {
        /// The mesh the loan belongs to.
        mesh_id: MeshId,
        /// Which channel or length disagreed.
        details: String,
    },

    /// The other side of the message boundary has gone away.
    #[error("Stream processor disconnected")]
    Disconnected,
}

impl StreamError {
    /// Convenience constructor for an [`StreamError::InvalidDescriptor`].
    pub fn invalid(details: impl Into<String>) -> Self {
        StreamError::InvalidDescriptor(details.into())
    }

    /// Convenience constructor for an [`StreamError::OffsetInconsistency`].
    pub fn inconsistency(channel: impl Into<String>, details: impl Into<String>) -> Self {
        StreamError::OffsetInconsistency {
            channel: channel.into(),
            details: details.into(),
        }
    }
}
