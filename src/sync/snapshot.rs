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

use futures::future::try_join_all;

use crate::metric::Metrics;
use crate::probe;
use crate::registry::SensorRegistry;
use crate::sensor::SensorRecord;
use crate::store::SensorStore;
use crate::Result;

/// Reads the complete sensor list from the registry.
///
/// All `(ownerOf, sensorData)` pairs are requested at once and reassembled by
/// index. The first failing read fails the whole snapshot.
#[tracing::instrument(skip_all)]
pub async fn load_snapshot<R>(registry: &R) -> Result<Vec<SensorRecord>>
where
    R: SensorRegistry + ?Sized,
{
    let total = registry.total_supply().await?;
    tracing::debug!(total, "Reading sensors");
    let reads = (0..total).map(|id| async move {
        let (owner, data) = registry.sensor(id).await?;
        Ok::<_, crate::Error>(SensorRecord::new(id, owner, data))
    });
    try_join_all(reads).await
}

/// Loads a snapshot and commits it to the store.
///
/// On failure the previous list stays in place, a summary of the error is
/// recorded in the store and the error is returned. A result that was overtaken by a newer refresh is
/// discarded. Returns the number of sensors read.
#[tracing::instrument(skip_all)]
pub async fn refresh<R, S>(
    registry: &R,
    store: &S,
    metrics: &Metrics,
) -> Result<usize>
where
    R: SensorRegistry + ?Sized,
    S: SensorStore,
{
    let ticket = store.begin_snapshot();
    match load_snapshot(registry).await {
        Ok(records) => {
            let count = records.len();
            let committed = store.commit_snapshot(ticket, records);
            if committed {
                metrics.snapshots_loaded.inc();
            }
            tracing::event!(
                target: probe::TARGET,
                tracing::Level::DEBUG,
                kind = %probe::Kind::Snapshot,
                count,
                committed,
            );
            Ok(count)
        }
        Err(e) => {
            tracing::error!(error = %e, "Registry snapshot failed");
            tracing::event!(
                target: probe::TARGET,
                tracing::Level::DEBUG,
                kind = %probe::Kind::Snapshot,
                errored = true,
                error = %e,
            );
            metrics.snapshot_failures.inc();
            store.record_failure(
                ticket,
                format!("registry snapshot failed: {}", e.public_summary()),
            );
            Err(e)
        }
    }
}
