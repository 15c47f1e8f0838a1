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


//! Wall-clock abstraction used to enforce the per-tick time budget.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// A source of monotonic time.
pub trait Clock: Send + Sync {
    /// Returns the current instant.
    fn now(&self) -> Instant;
}

/// The real monotonic clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A deterministic clock that only moves when told to.
///
/// Each call to [`Clock::now`] first reads the current instant and then advances
/// it by the configured step, so a processing loop that samples the clock once
/// per submesh observes a fixed cost per submesh.
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    elapsed_nanos: AtomicU64,
    step_nanos: AtomicU64,
}

impl ManualClock {
    /// Creates a clock frozen at its origin.
    pub fn new() -> Self {
        Self::with_step(Duration::ZERO)
    }

    /// Creates a clock that advances by `step` on every read.
    pub fn with_step(step: Duration) -> Self {
        Self {
            origin: Instant::now(),
            elapsed_nanos: AtomicU64::new(0),
            step_nanos: AtomicU64::new(step.as_nanos() as u64),
        }
    }

    /// Moves the clock forward.
    pub fn advance(&self, by: Duration) {
        self.elapsed_nanos
            .fetch_add(by.as_nanos() as u64, Ordering::SeqCst);
    }

    /// Changes the amount the clock advances on every read.
    pub fn set_step(&self, step: Duration) {
        self.step_nanos
            .store(step.as_nanos() as u64, Ordering::SeqCst);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        let step = self.step_nanos.load(Ordering::SeqCst);
        let elapsed = self.elapsed_nanos.fetch_add(step, Ordering::SeqCst);
        self.origin + Duration::from_nanos(elapsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_steps_on_every_read() {
        let clock = ManualClock::with_step(Duration::from_millis(5));
        let first = clock.now();
        let second = clock.now();
        assert_eq!(second - first, Duration::from_millis(5));
    }

    #[test]
    fn manual_clock_advances_explicitly() {
        let clock = ManualClock::new();
        let first = clock.now();
        clock.advance(Duration::from_secs(1));
        assert_eq!(clock.now() - first, Duration::from_secs(1));
    }
}
