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


//! The Channel Store: assembled byte buffers, one per channel, and the source
//! buffers they are assembled from.

use std::ops::Range;
use tessera_core::descriptor::{MeshDescriptor, Segment};
use tessera_core::protocol::{BufferLoan, LoanedChannel};
use tessera_core::{MeshId, StreamError, StreamResult};

const MIN_CAPACITY: usize = 256;

/// The registration-time copy of every source channel.
#[derive(Debug, Clone, Default)]
pub struct SourceBuffers {
    buffers: Vec<Vec<u8>>,
}

impl SourceBuffers {
    /// Takes ownership of the descriptor's channel contents.
    pub fn from_descriptor(descriptor: MeshDescriptor) -> Self {
        Self {
            buffers: descriptor
                .channels
                .into_iter()
                .map(|channel| channel.content)
                .collect(),
        }
    }

    /// The bytes of a segment in a source channel.
    pub fn segment(&self, slot: usize, segment: Segment) -> StreamResult<&[u8]> {
        let buffer = self
            .buffers
            .get(slot)
            .ok_or_else(|| StreamError::invalid(format!("no source channel at slot {slot}")))?;
        segment
            .end_bytes()
            .and_then(|end| buffer.get(segment.start_bytes..end))
            .ok_or_else(|| {
                StreamError::invalid(format!(
                    "segment {}+{} exceeds source channel {slot}",
                    segment.start_bytes, segment.length_bytes
                ))
            })
    }
}

/// One assembled channel: a buffer whose first `used_length` bytes hold the
/// resident segments back to back.
#[derive(Debug, Clone)]
pub struct Channel {
    name: String,
    buffer: Vec<u8>,
    used_length: usize,
}

impl Channel {
    /// Creates an empty channel.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            buffer: Vec::new(),
            used_length: 0,
        }
    }

    /// The channel name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bytes occupied by resident segments.
    pub fn used_length(&self) -> usize {
        self.used_length
    }

    /// Allocated length of the buffer.
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// The occupied prefix of the buffer.
    pub fn used_bytes(&self) -> &[u8] {
        &self.buffer[..self.used_length]
    }

    fn append(&mut self, bytes: &[u8]) -> usize {
        let offset = self.used_length;
        let needed = offset + bytes.len();
        if needed > self.buffer.len() {
            let grown = needed.max(self.buffer.len() * 2).max(MIN_CAPACITY);
            self.buffer.resize(grown, 0);
        }
        self.buffer[offset..needed].copy_from_slice(bytes);
        self.used_length = needed;
        offset
    }

    fn remove(&mut self, range: Range<usize>, shrink_threshold: f32) -> StreamResult<()> {
        if range.start > range.end || range.end > self.used_length {
            return Err(StreamError::inconsistency(
                &self.name,
                format!(
                    "cannot remove {}..{} from {} used bytes",
                    range.start, range.end, self.used_length
                ),
            ));
        }
        let removed = range.end - range.start;
        self.buffer.copy_within(range.end..self.used_length, range.start);
        self.used_length -= removed;

        let capacity = self.buffer.len();
        if capacity > MIN_CAPACITY && (self.used_length as f32) < shrink_threshold * capacity as f32
        {
            let shrunk = (self.used_length * 2).max(MIN_CAPACITY);
            self.buffer.truncate(shrunk);
            self.buffer.shrink_to_fit();
            log::trace!(
                "Channel '{}' shrunk from {} to {} bytes",
                self.name,
                capacity,
                shrunk
            );
        }
        Ok(())
    }
}

/// The assembled buffers of one mesh.
///
/// The store is the value that crosses the ownership gate: it is converted
/// into a [`BufferLoan`] when handed to the host and rebuilt from the loan when
/// the host returns it.
#[derive(Debug, Clone)]
pub struct ChannelStore {
    channels: Vec<Channel>,
    shrink_threshold: f32,
}

impl ChannelStore {
    /// Creates zero-length buffers for the given channel names.
    pub fn new<I, S>(names: I, shrink_threshold: f32) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            channels: names.into_iter().map(Channel::new).collect(),
            shrink_threshold,
        }
    }

    /// Number of channels.
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// Returns `true` if the store has no channels.
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Every channel, in registration order.
    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    /// A channel by slot.
    pub fn channel(&self, slot: usize) -> Option<&Channel> {
        self.channels.get(slot)
    }

    /// Used length of a channel, `0` for an unknown slot.
    pub fn used_length(&self, slot: usize) -> usize {
        self.channels.get(slot).map_or(0, Channel::used_length)
    }

    /// `(name, used_length)` for every channel.
    pub fn layout(&self) -> Vec<(String, usize)> {
        self.channels
            .iter()
            .map(|c| (c.name.clone(), c.used_length))
            .collect()
    }

    /// Appends bytes at the end of a channel, growing it as needed.
    /// Returns the offset the bytes were written at.
    pub fn append(&mut self, slot: usize, bytes: &[u8]) -> StreamResult<usize> {
        Ok(self.channel_mut(slot)?.append(bytes))
    }

    /// The occupied prefix of a channel, mutably.
    pub fn used_bytes_mut(&mut self, slot: usize) -> StreamResult<&mut [u8]> {
        let channel = self.channel_mut(slot)?;
        Ok(&mut channel.buffer[..channel.used_length])
    }

    /// Closes the gap left by `range`: later bytes shift down to fill it.
    pub fn remove_range(&mut self, slot: usize, range: Range<usize>) -> StreamResult<()> {
        let threshold = self.shrink_threshold;
        self.channel_mut(slot)?.remove(range, threshold)
    }

    /// Packages the buffers for the host. The store is consumed.
    pub fn into_loan(self, mesh_id: MeshId, primitive_count: u64) -> BufferLoan {
        BufferLoan {
            mesh_id,
            channels: self
                .channels
                .into_iter()
                .map(|c| LoanedChannel {
                    name: c.name,
                    bytes: c.buffer,
                    used_length: c.used_length,
                })
                .collect(),
            primitive_count,
        }
    }

    /// Rebuilds a store from a returned loan, checking it against the layout
    /// that was lent out.
    pub fn from_loan(
        loan: BufferLoan,
        expected: &[(String, usize)],
        shrink_threshold: f32,
    ) -> StreamResult<Self> {
        let mesh_id = loan.mesh_id;
        let mismatch = |details: String| StreamError::LoanMismatch { mesh_id, details };

        if loan.channels.len() != expected.len() {
            return Err(mismatch(format!(
                "expected {} channels, got {}",
                expected.len(),
                loan.channels.len()
            )));
        }

        let mut channels = Vec::with_capacity(expected.len());
        for (returned, (name, used_length)) in loan.channels.into_iter().zip(expected) {
            if &returned.name != name {
                return Err(mismatch(format!(
                    "expected channel '{name}', got '{}'",
                    returned.name
                )));
            }
            if returned.used_length != *used_length || returned.bytes.len() < *used_length {
                return Err(mismatch(format!(
                    "channel '{name}' lent with {used_length} used bytes, returned with {} of {}",
                    returned.used_length,
                    returned.bytes.len()
                )));
            }
            channels.push(Channel {
                name: returned.name,
                buffer: returned.bytes,
                used_length: returned.used_length,
            });
        }

        Ok(Self {
            channels,
            shrink_threshold,
        })
    }

    fn channel_mut(&mut self, slot: usize) -> StreamResult<&mut Channel> {
        self.channels
            .get_mut(slot)
            .ok_or_else(|| StreamError::inconsistency(format!("#{slot}"), "no such channel"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_grows_and_reports_offsets() {
        let mut store = ChannelStore::new(["position"], 0.25);
        assert_eq!(store.append(0, &[1, 2, 3]).unwrap(), 0);
        assert_eq!(store.append(0, &[4, 5]).unwrap(), 3);

        let channel = store.channel(0).unwrap();
        assert_eq!(channel.used_bytes(), &[1, 2, 3, 4, 5]);
        assert!(channel.capacity() >= channel.used_length());
    }

    #[test]
    fn remove_range_closes_the_gap() {
        let mut store = ChannelStore::new(["position"], 0.25);
        store.append(0, &[1, 1, 2, 2, 3, 3]).unwrap();
        store.remove_range(0, 2..4).unwrap();
        assert_eq!(store.channel(0).unwrap().used_bytes(), &[1, 1, 3, 3]);
        assert_eq!(store.used_length(0), 4);
    }

    #[test]
    fn remove_past_used_length_is_an_inconsistency() {
        let mut store = ChannelStore::new(["position"], 0.25);
        store.append(0, &[1, 2]).unwrap();
        let err = store.remove_range(0, 1..3).unwrap_err();
        assert!(matches!(err, StreamError::OffsetInconsistency { .. }));
    }

    #[test]
    fn buffers_shrink_when_mostly_empty() {
        let mut store = ChannelStore::new(["position"], 0.25);
        store.append(0, &vec![7; 4096]).unwrap();
        store.remove_range(0, 0..4000).unwrap();

        let channel = store.channel(0).unwrap();
        assert_eq!(channel.used_bytes(), &[7; 96][..]);
        assert!(channel.capacity() < 4096);
    }

    #[test]
    fn loan_round_trip_preserves_contents() {
        let mut store = ChannelStore::new(["position", "index"], 0.25);
        store.append(0, &[9; 12]).unwrap();
        store.append(1, &[1, 0, 2, 0]).unwrap();
        let layout = store.layout();

        let mesh_id = MeshId::new();
        let loan = store.into_loan(mesh_id, 1);
        assert_eq!(loan.channel("index").unwrap().used_bytes(), &[1, 0, 2, 0]);

        let store = ChannelStore::from_loan(loan, &layout, 0.25).unwrap();
        assert_eq!(store.used_length(0), 12);
        assert_eq!(store.channel(1).unwrap().used_bytes(), &[1, 0, 2, 0]);
    }

    #[test]
    fn tampered_loan_is_rejected() {
        let mut store = ChannelStore::new(["position"], 0.25);
        store.append(0, &[9; 12]).unwrap();
        let layout = store.layout();

        let mut loan = store.into_loan(MeshId::new(), 0);
        loan.channels[0].used_length = 4;
        let err = ChannelStore::from_loan(loan, &layout, 0.25).unwrap_err();
        assert!(matches!(err, StreamError::LoanMismatch { .. }));
    }

    #[test]
    fn source_segments_are_bounds_checked() {
        let mut descriptor = MeshDescriptor::new();
        descriptor
            .channels
            .push(tessera_core::descriptor::ChannelDescriptor::attribute(
                "position",
                vec![1, 2, 3, 4],
            ));
        let sources = SourceBuffers::from_descriptor(descriptor);
        assert_eq!(sources.segment(0, Segment::new(1, 2)).unwrap(), &[2, 3]);
        assert!(sources.segment(0, Segment::new(3, 2)).is_err());
        assert!(sources.segment(1, Segment::new(0, 1)).is_err());
    }
}
