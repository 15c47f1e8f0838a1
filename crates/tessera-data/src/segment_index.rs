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


//! The Segment Index: where every submesh's bytes live in the source buffers,
//! and where they currently live in each assembled channel.

use crate::index_view::IndexView;
use crate::priority::PriorityHints;
use std::collections::{HashMap, HashSet};
use tessera_core::descriptor::{ChannelKind, IndexSegment, MeshDescriptor, Segment};
use tessera_core::{IndexFormat, StreamError, StreamResult, SubmeshId};

/// Offset value meaning "not resident in this channel".
pub const ABSENT: i64 = -1;

/// A dense handle to a submesh within one mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubmeshKey(u32);

impl SubmeshKey {
    /// Position of the submesh in registration order.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Name and kind of one assembled channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelInfo {
    /// The channel name.
    pub name: String,
    /// Attribute or index channel.
    pub kind: ChannelKind,
}

/// Static description and mutable residency state of one submesh.
#[derive(Debug, Clone)]
pub struct SubmeshEntry {
    id: SubmeshId,
    segments: Vec<Option<Segment>>,
    indices: Option<IndexSegment>,
    offsets: Vec<i64>,
    index_base: Option<u32>,
    visible: bool,
    hints: PriorityHints,
    requested_lod: Option<u8>,
}

impl SubmeshEntry {
    /// The submesh's identity.
    pub fn id(&self) -> &SubmeshId {
        &self.id
    }

    /// The source segment for a channel slot, if the submesh participates in it.
    pub fn segment(&self, slot: usize) -> Option<Segment> {
        self.segments.get(slot).copied().flatten()
    }

    /// The source index segment, if the submesh is indexed.
    pub fn indices(&self) -> Option<&IndexSegment> {
        self.indices.as_ref()
    }

    /// Current offset in the assembled channel, or `-1` when not resident.
    pub fn current_offset(&self, slot: usize) -> i64 {
        self.offsets.get(slot).copied().unwrap_or(ABSENT)
    }

    /// Returns `true` if the submesh currently occupies bytes in the channel.
    pub fn is_resident_in(&self, slot: usize) -> bool {
        self.current_offset(slot) >= 0
    }

    /// The value currently added to this submesh's index words, while resident.
    pub fn index_base(&self) -> Option<u32> {
        self.index_base
    }

    /// Whether the processor has made this submesh visible (the visibility map).
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// The latest priority hints.
    pub fn hints(&self) -> PriorityHints {
        self.hints
    }

    /// The level of detail last requested by the host.
    pub fn requested_lod(&self) -> Option<u8> {
        self.requested_lod
    }

    /// Channel slots this submesh declares a segment for.
    pub fn participating_slots(&self) -> impl Iterator<Item = usize> + '_ {
        self.segments
            .iter()
            .enumerate()
            .filter_map(|(slot, s)| s.map(|_| slot))
    }
}

/// The per-mesh table of submeshes and their channel placements.
#[derive(Debug, Clone)]
pub struct SegmentIndex {
    channels: Vec<ChannelInfo>,
    index_slot: Option<usize>,
    entries: Vec<SubmeshEntry>,
    lookup: HashMap<SubmeshId, SubmeshKey>,
    // Resident submeshes of each channel, in ascending offset order.
    residency: Vec<Vec<SubmeshKey>>,
}

impl SegmentIndex {
    /// Validates a registration descriptor and builds the index.
    ///
    /// Every submesh starts non-resident in every channel and invisible.
    pub fn build(descriptor: &MeshDescriptor, format: IndexFormat) -> StreamResult<Self> {
        let mut channels = Vec::with_capacity(descriptor.channels.len());
        let mut slots: HashMap<&str, usize> = HashMap::new();
        let mut index_slot = None;

        for (slot, channel) in descriptor.channels.iter().enumerate() {
            if slots.insert(channel.name.as_str(), slot).is_some() {
                return Err(StreamError::invalid(format!(
                    "channel '{}' is declared twice",
                    channel.name
                )));
            }
            if channel.kind == ChannelKind::Index {
                if index_slot.is_some() {
                    return Err(StreamError::invalid("a mesh may declare one index channel"));
                }
                if channel.byte_length() % format.width() != 0 {
                    return Err(StreamError::invalid(format!(
                        "index channel '{}' is not a whole number of {:?} words",
                        channel.name, format
                    )));
                }
                index_slot = Some(slot);
            }
            channels.push(ChannelInfo {
                name: channel.name.clone(),
                kind: channel.kind,
            });
        }

        let mut entries = Vec::with_capacity(descriptor.submeshes.len());
        let mut lookup = HashMap::with_capacity(descriptor.submeshes.len());

        for submesh in &descriptor.submeshes {
            let mut segments = vec![None; channels.len()];

            for (name, segment) in &submesh.segments {
                let slot = *slots.get(name.as_str()).ok_or_else(|| {
                    StreamError::invalid(format!(
                        "submesh '{}' references unknown channel '{name}'",
                        submesh.id
                    ))
                })?;
                if Some(slot) == index_slot {
                    return Err(StreamError::invalid(format!(
                        "submesh '{}' must describe index channel '{name}' with an index segment",
                        submesh.id
                    )));
                }
                check_range(
                    &submesh.id,
                    name,
                    segment,
                    descriptor.channels[slot].byte_length(),
                )?;
                segments[slot] = Some(*segment);
            }

            if let Some(indices) = &submesh.indices {
                let slot = index_slot.ok_or_else(|| {
                    StreamError::invalid(format!(
                        "submesh '{}' has indices but the mesh has no index channel",
                        submesh.id
                    ))
                })?;
                let source = &descriptor.channels[slot];
                check_indices(&submesh.id, indices, &source.content, format)?;
                segments[slot] = Some(indices.segment());
            }

            if segments.iter().all(Option::is_none) {
                return Err(StreamError::invalid(format!(
                    "submesh '{}' participates in no channel",
                    submesh.id
                )));
            }

            let key = SubmeshKey(entries.len() as u32);
            if lookup.insert(submesh.id.clone(), key).is_some() {
                return Err(StreamError::invalid(format!(
                    "submesh '{}' is declared twice",
                    submesh.id
                )));
            }

            entries.push(SubmeshEntry {
                id: submesh.id.clone(),
                segments,
                indices: submesh.indices,
                offsets: vec![ABSENT; channels.len()],
                index_base: None,
                visible: false,
                hints: PriorityHints::default(),
                requested_lod: None,
            });
        }

        Ok(Self {
            residency: vec![Vec::new(); channels.len()],
            channels,
            index_slot,
            entries,
            lookup,
        })
    }

    /// The channels, in registration order.
    pub fn channels(&self) -> &[ChannelInfo] {
        &self.channels
    }

    /// The slot of a channel by name.
    pub fn channel_slot(&self, name: &str) -> Option<usize> {
        self.channels.iter().position(|c| c.name == name)
    }

    /// The slot of the index channel, if the mesh has one.
    pub fn index_slot(&self) -> Option<usize> {
        self.index_slot
    }

    /// The name of a channel slot. Unknown slots yield `"?"`.
    pub fn channel_name(&self, slot: usize) -> &str {
        self.channels.get(slot).map_or("?", |c| c.name.as_str())
    }

    /// Number of submeshes.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the mesh has no submeshes.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every key, in registration order.
    pub fn keys(&self) -> impl Iterator<Item = SubmeshKey> {
        (0..self.entries.len() as u32).map(SubmeshKey)
    }

    /// Resolves a submesh id.
    pub fn key_of(&self, id: &SubmeshId) -> Option<SubmeshKey> {
        self.lookup.get(id).copied()
    }

    /// Resolves a set of ids, silently skipping unknown ones.
    pub fn resolve<'a>(&self, ids: impl IntoIterator<Item = &'a SubmeshId>) -> HashSet<SubmeshKey> {
        ids.into_iter().filter_map(|id| self.key_of(id)).collect()
    }

    /// The entry of a submesh.
    pub fn entry(&self, key: SubmeshKey) -> &SubmeshEntry {
        &self.entries[key.index()]
    }

    /// Every entry, in registration order.
    pub fn entries(&self) -> &[SubmeshEntry] {
        &self.entries
    }

    /// Number of submeshes the processor has made visible.
    pub fn visible_count(&self) -> usize {
        self.entries.iter().filter(|e| e.visible).count()
    }

    /// Resident submeshes of a channel, in buffer order.
    pub fn resident_in(&self, slot: usize) -> &[SubmeshKey] {
        self.residency.get(slot).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Flips the visibility map entry of a submesh.
    pub fn set_visible(&mut self, key: SubmeshKey, visible: bool) {
        self.entries[key.index()].visible = visible;
    }

    /// Updates the priority hints of a submesh. `None` keeps the previous value.
    pub fn set_hints(&mut self, key: SubmeshKey, size: Option<f32>, distance: Option<f32>) {
        let hints = &mut self.entries[key.index()].hints;
        if let Some(size) = size {
            hints.size = size;
        }
        if let Some(distance) = distance {
            hints.distance = distance;
        }
    }

    /// Records a requested level of detail.
    pub fn set_requested_lod(&mut self, key: SubmeshKey, lod: u8) {
        self.entries[key.index()].requested_lod = Some(lod);
    }

    /// Records the value added to a submesh's index words.
    pub fn set_index_base(&mut self, key: SubmeshKey, base: Option<u32>) {
        self.entries[key.index()].index_base = base;
    }

    /// Records that a submesh's segment was appended to a channel at `offset`.
    ///
    /// Placements must arrive in ascending offset order (appends only).
    pub fn place(&mut self, key: SubmeshKey, slot: usize, offset: usize) -> StreamResult<()> {
        if let Some(&last) = self.residency[slot].last() {
            if self.entries[last.index()].current_offset(slot) >= offset as i64 {
                return Err(StreamError::inconsistency(
                    self.channel_name(slot),
                    format!("placement at {offset} is not past the last resident segment"),
                ));
            }
        }
        self.entries[key.index()].offsets[slot] = offset as i64;
        self.residency[slot].push(key);
        Ok(())
    }

    /// Removes a submesh from a channel's residency list.
    ///
    /// Every submesh placed after it moves down by `length` bytes and, when
    /// `index_shift` is non-zero, has its index base lowered by that amount.
    /// Returns the former offset.
    pub fn release(
        &mut self,
        key: SubmeshKey,
        slot: usize,
        length: usize,
        index_shift: u32,
    ) -> StreamResult<usize> {
        let offset = self.entries[key.index()].current_offset(slot);
        if offset < 0 {
            return Err(StreamError::inconsistency(
                self.channel_name(slot),
                format!("submesh '{}' is not resident", self.entries[key.index()].id),
            ));
        }

        let entries = &self.entries;
        let position = self.residency[slot]
            .binary_search_by_key(&offset, |k| entries[k.index()].current_offset(slot))
            .map_err(|_| {
                StreamError::inconsistency(
                    self.channel_name(slot),
                    format!("offset {offset} is missing from the residency list"),
                )
            })?;

        self.residency[slot].remove(position);
        for &moved in &self.residency[slot][position..] {
            let entry = &mut self.entries[moved.index()];
            entry.offsets[slot] -= length as i64;
            if index_shift > 0 {
                if let Some(base) = entry.index_base.as_mut() {
                    *base -= index_shift;
                }
            }
        }

        self.entries[key.index()].offsets[slot] = ABSENT;
        Ok(offset as usize)
    }
}

fn check_range(
    id: &SubmeshId,
    channel: &str,
    segment: &Segment,
    source_len: usize,
) -> StreamResult<()> {
    if segment.length_bytes == 0 {
        return Err(StreamError::invalid(format!(
            "submesh '{id}' has an empty segment in channel '{channel}'"
        )));
    }
    match segment.end_bytes() {
        Some(end) if end <= source_len => Ok(()),
        _ => Err(StreamError::invalid(format!(
            "submesh '{id}' segment {}+{} exceeds channel '{channel}' of {source_len} bytes",
            segment.start_bytes, segment.length_bytes
        ))),
    }
}

fn check_indices(
    id: &SubmeshId,
    indices: &IndexSegment,
    source: &[u8],
    format: IndexFormat,
) -> StreamResult<()> {
    if indices.count == 0 {
        return Err(StreamError::invalid(format!("submesh '{id}' has no indices")));
    }
    if indices.min_value > indices.max_value {
        return Err(StreamError::invalid(format!(
            "submesh '{id}' has min index {} above max index {}",
            indices.min_value, indices.max_value
        )));
    }
    if indices.length_bytes != indices.count as usize * format.width() {
        return Err(StreamError::invalid(format!(
            "submesh '{id}' declares {} indices in {} bytes",
            indices.count, indices.length_bytes
        )));
    }
    if indices.max_value > format.max_value() {
        return Err(StreamError::invalid(format!(
            "submesh '{id}' max index {} does not fit {format:?}",
            indices.max_value
        )));
    }

    let view = IndexView::new(source, indices.start_bytes, indices.length_bytes, format)?;
    if let Some(stray) = view
        .iter()
        .find(|v| *v < indices.min_value || *v > indices.max_value)
    {
        return Err(StreamError::invalid(format!(
            "submesh '{id}' index {stray} lies outside [{}, {}]",
            indices.min_value, indices.max_value
        )));
    }
    Ok(())
}
