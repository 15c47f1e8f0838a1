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


//! # Tessera Core
//!
//! Foundational crate containing the identifiers, error taxonomy, configuration,
//! and protocol messages shared by every layer of the streaming engine.

#![warn(missing_docs)]

pub mod clock;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod format;
pub mod id;
pub mod protocol;
pub mod status;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::StreamConfig;
pub use error::{StreamError, StreamResult};
pub use format::{IndexFormat, PrimitiveTopology};
pub use id::{MeshId, SubmeshId};
