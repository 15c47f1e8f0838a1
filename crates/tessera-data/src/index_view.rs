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


//! Checked views of index words inside a byte buffer.
//!
//! Index words are little-endian, as uploaded to the GPU. A view can only be
//! constructed over a window that lies inside its buffer and is aligned to the
//! word width, so every read and write after construction is in bounds.

use tessera_core::{IndexFormat, StreamError, StreamResult};

fn validate_window(
    buffer_len: usize,
    offset: usize,
    length: usize,
    format: IndexFormat,
) -> StreamResult<()> {
    let width = format.width();
    if offset % width != 0 || length % width != 0 {
        return Err(StreamError::invalid(format!(
            "index window {offset}+{length} is not aligned to {width}-byte words"
        )));
    }
    match offset.checked_add(length) {
        Some(end) if end <= buffer_len => Ok(()),
        _ => Err(StreamError::invalid(format!(
            "index window {offset}+{length} exceeds buffer of {buffer_len} bytes"
        ))),
    }
}

#[inline]
fn read_word(word: &[u8], format: IndexFormat) -> u32 {
    match format {
        IndexFormat::U16 => u16::from_le_bytes([word[0], word[1]]) as u32,
        IndexFormat::U32 => u32::from_le_bytes([word[0], word[1], word[2], word[3]]),
    }
}

#[inline]
fn write_word(word: &mut [u8], format: IndexFormat, value: u32) {
    match format {
        IndexFormat::U16 => word.copy_from_slice(&(value as u16).to_le_bytes()),
        IndexFormat::U32 => word.copy_from_slice(&value.to_le_bytes()),
    }
}

/// A read-only view of index words.
#[derive(Debug, Clone, Copy)]
pub struct IndexView<'a> {
    words: &'a [u8],
    format: IndexFormat,
}

impl<'a> IndexView<'a> {
    /// Creates a view over `buffer[offset..offset + length]`.
    ///
    /// Fails with `InvalidDescriptor` if the window is misaligned or out of bounds.
    pub fn new(
        buffer: &'a [u8],
        offset: usize,
        length: usize,
        format: IndexFormat,
    ) -> StreamResult<Self> {
        validate_window(buffer.len(), offset, length, format)?;
        Ok(Self {
            words: &buffer[offset..offset + length],
            format,
        })
    }

    /// Number of index words in the view.
    pub fn len(&self) -> usize {
        self.words.len() / self.format.width()
    }

    /// Returns `true` if the view holds no words.
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Reads one word.
    pub fn get(&self, i: usize) -> Option<u32> {
        let width = self.format.width();
        self.words
            .get(i * width..(i + 1) * width)
            .map(|w| read_word(w, self.format))
    }

    /// Iterates over every word.
    pub fn iter(&self) -> impl Iterator<Item = u32> + 'a {
        let format = self.format;
        let words: &'a [u8] = self.words;
        words
            .chunks_exact(format.width())
            .map(move |w| read_word(w, format))
    }

    /// The smallest and largest word, or `None` for an empty view.
    pub fn bounds(&self) -> Option<(u32, u32)> {
        self.iter().fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
    }
}

/// A mutable view of index words.
#[derive(Debug)]
pub struct IndexViewMut<'a> {
    words: &'a mut [u8],
    format: IndexFormat,
}

impl<'a> IndexViewMut<'a> {
    /// Creates a view over `buffer[offset..offset + length]`.
    ///
    /// Fails with `InvalidDescriptor` if the window is misaligned or out of bounds.
    pub fn new(
        buffer: &'a mut [u8],
        offset: usize,
        length: usize,
        format: IndexFormat,
    ) -> StreamResult<Self> {
        validate_window(buffer.len(), offset, length, format)?;
        Ok(Self {
            words: &mut buffer[offset..offset + length],
            format,
        })
    }

    /// Number of index words in the view.
    pub fn len(&self) -> usize {
        self.words.len() / self.format.width()
    }

    /// Returns `true` if the view holds no words.
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Reborrows as a read-only view.
    pub fn as_view(&self) -> IndexView<'_> {
        IndexView {
            words: self.words,
            format: self.format,
        }
    }

    /// Writes one word. Values wider than the format are truncated, so callers
    /// go through [`IndexViewMut::add_bias`] / [`IndexViewMut::sub_bias`] instead.
    pub fn set(&mut self, i: usize, value: u32) -> bool {
        let width = self.format.width();
        match self.words.get_mut(i * width..(i + 1) * width) {
            Some(word) => {
                write_word(word, self.format, value);
                true
            }
            None => false,
        }
    }

    /// Adds `bias` to every word.
    ///
    /// Nothing is written unless every result fits the format.
    pub fn add_bias(&mut self, bias: u32) -> StreamResult<()> {
        if bias == 0 {
            return Ok(());
        }
        if let Some((_, hi)) = self.as_view().bounds() {
            let required = hi as u64 + bias as u64;
            if required > self.format.max_value() as u64 {
                return Err(StreamError::inconsistency(
                    "index",
                    format!(
                        "biasing by {bias} produces {required}, beyond the {:?} limit",
                        self.format
                    ),
                ));
            }
        }
        self.apply(|v| v + bias);
        Ok(())
    }

    /// Subtracts `bias` from every word.
    ///
    /// Nothing is written unless every word is at least `bias`.
    pub fn sub_bias(&mut self, bias: u32) -> StreamResult<()> {
        if bias == 0 {
            return Ok(());
        }
        if let Some((lo, _)) = self.as_view().bounds() {
            if lo < bias {
                return Err(StreamError::inconsistency(
                    "index",
                    format!("index value {lo} cannot be lowered by {bias}"),
                ));
            }
        }
        self.apply(|v| v - bias);
        Ok(())
    }

    fn apply(&mut self, f: impl Fn(u32) -> u32) {
        let format = self.format;
        for word in self.words.chunks_exact_mut(format.width()) {
            let value = read_word(word, format);
            write_word(word, format, f(value));
        }
    }
}
