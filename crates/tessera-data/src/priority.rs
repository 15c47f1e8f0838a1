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


//! Admission priority and the near-sorted reorder of the add-queue.

use std::cmp::Ordering;

/// The hints the host attaches to a submesh in a visibility update.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PriorityHints {
    /// Size hint (e.g. projected screen area).
    pub size: f32,
    /// Distance hint (e.g. distance to the camera).
    pub distance: f32,
}

/// Weights of the admission priority function.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriorityWeights {
    /// `w1`, applied to the size hint.
    pub size: f32,
    /// `w2`, applied to the distance hint.
    pub distance: f32,
}

impl Default for PriorityWeights {
    fn default() -> Self {
        Self {
            size: 10.0,
            distance: 1.0,
        }
    }
}

impl PriorityWeights {
    /// `priority(a, b) = w1 * (size[a] - size[b]) + w2 * (distance[a] - distance[b])`.
    ///
    /// A negative value means `a` is admitted before `b`.
    pub fn priority(&self, a: &PriorityHints, b: &PriorityHints) -> f32 {
        self.size * (a.size - b.size) + self.distance * (a.distance - b.distance)
    }

    /// Orders two hints by the sign of [`PriorityWeights::priority`].
    /// NaN compares as equal so that it never moves an element.
    pub fn compare(&self, a: &PriorityHints, b: &PriorityHints) -> Ordering {
        self.priority(a, b)
            .partial_cmp(&0.0)
            .unwrap_or(Ordering::Equal)
    }
}

/// Stable in-place insertion sort.
///
/// The add-queue is reordered after every visibility update, and successive
/// updates only move a handful of elements, so the input is nearly sorted and
/// this runs in close to linear time (quadratic in the worst case).
pub fn insertion_sort_by<T, F>(items: &mut [T], mut compare: F)
where
    F: FnMut(&T, &T) -> Ordering,
{
    for i in 1..items.len() {
        let mut j = i;
        while j > 0 && compare(&items[j - 1], &items[j]) == Ordering::Greater {
            items.swap(j - 1, j);
            j -= 1;
        }
    }
}
