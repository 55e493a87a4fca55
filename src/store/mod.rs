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

//! # Sensor Store Module 🕸️
//!
//! The single owned list of sensor records the dashboard reads from.
//!
//! ## Overview
//!
//! Only two transitions ever mutate the list: a full replacement after a
//! registry snapshot, and a patch of one record after a `DataSubmitted`
//! event. Each transition derives the next list from the previous one, so a
//! reader always observes either the old or the new list, never a mix.
//!
use std::sync::Arc;

use crate::sensor::{SensorPatch, SensorRecord};

/// A module for managing in-memory storage of the sensor list.
pub mod mem;

/// A store that uses in memory data structures as the backend.
pub use mem::InMemoryStore;

/// An immutable view of the sensor list at one point in time.
pub type SensorList = Arc<Vec<Arc<SensorRecord>>>;

/// Identifies one snapshot request. Results of a request are only committed
/// if no newer request has started since.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SnapshotTicket(pub(crate) u64);

/// The owned store of sensor records.
pub trait SensorStore: Clone + Send + Sync + 'static {
    /// The current list, in index order.
    fn sensors(&self) -> SensorList;

    /// Looks up one record by id.
    fn get(&self, id: u64) -> Option<Arc<SensorRecord>> {
        self.sensors().iter().find(|r| r.id == id).cloned()
    }

    /// Replaces the whole list unconditionally.
    fn replace_all(&self, records: Vec<SensorRecord>);

    /// Patches the record with the given id. Returns `false`, and changes
    /// nothing, if no such record exists.
    ///
    /// While a snapshot is in flight the patch is also kept and re-applied
    /// to that snapshot's records when it commits.
    fn patch(&self, id: u64, patch: SensorPatch) -> bool;

    /// Starts a snapshot request, superseding any request still in flight.
    fn begin_snapshot(&self) -> SnapshotTicket;

    /// Commits the result of a snapshot request, with the patches received
    /// since it started applied on top. Returns `false`, and changes
    /// nothing, if a newer request has started since `ticket` was issued.
    fn commit_snapshot(
        &self,
        ticket: SnapshotTicket,
        records: Vec<SensorRecord>,
    ) -> bool;

    /// Records the failure of a snapshot request, leaving the list as is.
    /// Stale failures are ignored.
    fn record_failure(&self, ticket: SnapshotTicket, error: String);

    /// The error of the most recent snapshot, if it failed.
    fn last_error(&self) -> Option<String>;
}

/// Derives the next list from `records` with one record patched.
///
/// All other records stay pointer-equal to their previous versions.
pub fn patch_records(
    records: &[Arc<SensorRecord>],
    id: u64,
    patch: SensorPatch,
) -> Option<Vec<Arc<SensorRecord>>> {
    let position = records.iter().position(|r| r.id == id)?;
    let mut next = records.to_vec();
    next[position] = Arc::new(records[position].patched(patch));
    Some(next)
}
