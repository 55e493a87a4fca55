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

use std::sync::Arc;

use parking_lot::RwLock;

use super::{patch_records, SensorList, SensorStore, SnapshotTicket};
use crate::sensor::{SensorPatch, SensorRecord};

#[derive(Default)]
struct State {
    sensors: SensorList,
    latest_ticket: u64,
    last_error: Option<String>,
    /// Patches seen since the latest snapshot started, `None` when no
    /// snapshot is in flight.
    pending: Option<Vec<(u64, SensorPatch)>>,
}

/// InMemoryStore keeps the sensor list in memory.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<State>>,
}

impl std::fmt::Debug for InMemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("InMemoryStore")
            .field("sensors", &state.sensors.len())
            .field("latest_ticket", &state.latest_ticket)
            .finish()
    }
}

impl InMemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

fn into_list(records: Vec<SensorRecord>) -> SensorList {
    Arc::new(records.into_iter().map(Arc::new).collect())
}

impl SensorStore for InMemoryStore {
    fn sensors(&self) -> SensorList {
        self.state.read().sensors.clone()
    }

    #[tracing::instrument(skip_all, fields(count = records.len()))]
    fn replace_all(&self, records: Vec<SensorRecord>) {
        let next = into_list(records);
        let mut guard = self.state.write();
        guard.sensors = next;
        guard.last_error = None;
    }

    #[tracing::instrument(skip(self))]
    fn patch(&self, id: u64, patch: SensorPatch) -> bool {
        let mut guard = self.state.write();
        if let Some(pending) = guard.pending.as_mut() {
            pending.push((id, patch));
        }
        match patch_records(&guard.sensors, id, patch) {
            Some(next) => {
                guard.sensors = Arc::new(next);
                true
            }
            None => false,
        }
    }

    fn begin_snapshot(&self) -> SnapshotTicket {
        let mut guard = self.state.write();
        guard.latest_ticket += 1;
        guard.pending = Some(Vec::new());
        SnapshotTicket(guard.latest_ticket)
    }

    #[tracing::instrument(skip(self, records), fields(count = records.len()))]
    fn commit_snapshot(
        &self,
        ticket: SnapshotTicket,
        records: Vec<SensorRecord>,
    ) -> bool {
        let mut next: Vec<_> = records.into_iter().map(Arc::new).collect();
        let mut guard = self.state.write();
        if ticket.0 != guard.latest_ticket {
            tracing::debug!(
                latest = guard.latest_ticket,
                "discarding stale snapshot result"
            );
            return false;
        }
        // the reads may predate these events.
        for (id, patch) in guard.pending.take().unwrap_or_default() {
            if let Some(patched) = patch_records(&next, id, patch) {
                next = patched;
            }
        }
        guard.sensors = Arc::new(next);
        guard.last_error = None;
        true
    }

    fn record_failure(&self, ticket: SnapshotTicket, error: String) {
        let mut guard = self.state.write();
        if ticket.0 == guard.latest_ticket {
            guard.pending = None;
            guard.last_error = Some(error);
        }
    }

    fn last_error(&self) -> Option<String> {
        self.state.read().last_error.clone()
    }
}
