// Copyright 2022 Webb Technologies Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! # Sync Module 🔄
//!
//! Keeps the [`SensorStore`](crate::store::SensorStore) in step with the
//! registry contract:
//!
//! * [`snapshot`] reads every sensor and replaces the list in one step.
//! * [`listener`] patches single records as `DataSubmitted` events arrive.
//! * [`register`] mints a new sensor and refreshes the list afterwards.

/// Live patch listener.
pub mod listener;
/// Write path for registering new sensors.
pub mod register;
/// Full registry snapshots.
pub mod snapshot;

pub use listener::{ListenerHandle, NotificationSource, PatchListener, SensorNotification};
pub use register::{register_sensor, Registration};
pub use snapshot::{load_snapshot, refresh};
