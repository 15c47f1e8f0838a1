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


//! Configuration for the stream processor.

use crate::format::IndexFormat;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the stream processor and its service thread.
///
/// Every field has a default, so a RON file only needs to name the values it
/// overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Target processing rate. The per-mesh frame budget is `1000 / ticks_per_second` ms.
    pub ticks_per_second: u32,
    /// Weight of the size hint in the admission priority (`w1`).
    pub size_weight: f32,
    /// Weight of the distance hint in the admission priority (`w2`).
    pub distance_weight: f32,
    /// Width of the words in every index channel.
    pub index_format: IndexFormat,
    /// Queue every submesh for admission as soon as its mesh is registered.
    pub admit_on_register: bool,
    /// Delay between ticks while no mesh has work to do, in milliseconds.
    pub idle_tick_delay_ms: u64,
    /// Capacity of the host-to-processor command channel.
    pub command_buffer_size: usize,
    /// A channel buffer is reallocated down once its used length falls below
    /// this fraction of its capacity.
    pub shrink_threshold: f32,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            ticks_per_second: 60,
            size_weight: 10.0,
            distance_weight: 1.0,
            index_format: IndexFormat::U16,
            admit_on_register: false,
            idle_tick_delay_ms: 4,
            command_buffer_size: 1024,
            shrink_threshold: 0.25,
        }
    }
}

impl StreamConfig {
    /// Parses a configuration from RON text.
    pub fn from_ron_str(text: &str) -> Result<Self, ron::error::SpannedError> {
        ron::from_str(text)
    }

    /// The soft per-tick deadline for one mesh.
    pub fn frame_budget(&self) -> Duration {
        Self::frame_budget_for(self.ticks_per_second)
    }

    /// The soft per-tick deadline for a given target rate.
    ///
    /// A rate of zero is treated as one tick per second.
    pub fn frame_budget_for(ticks_per_second: u32) -> Duration {
        if ticks_per_second == 0 {
            log::warn!("A rate of 0 ticks per second is treated as 1.");
        }
        Duration::from_secs_f64(1.0 / ticks_per_second.max(1) as f64)
    }

    /// The delay between ticks while the processor is idle.
    pub fn idle_tick_delay(&self) -> Duration {
        Duration::from_millis(self.idle_tick_delay_ms)
    }
}
