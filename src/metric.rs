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

use prometheus::core::{AtomicF64, GenericCounter};
use prometheus::{register_counter_with_registry, Encoder, Registry, TextEncoder};

/// A struct definition for collecting metrics in the node.
#[derive(Clone)]
pub struct Metrics {
    /// Registry all of the counters below live in.
    registry: Registry,
    /// Successful full registry snapshots.
    pub snapshots_loaded: GenericCounter<AtomicF64>,
    /// Snapshots that failed and left the previous list in place.
    pub snapshot_failures: GenericCounter<AtomicF64>,
    /// Sensor records patched from `DataSubmitted` events.
    pub patches_applied: GenericCounter<AtomicF64>,
    /// `DataSubmitted` events for unknown sensors.
    pub patches_dropped: GenericCounter<AtomicF64>,
    /// Sensors registered through this node.
    pub sensors_registered: GenericCounter<AtomicF64>,
    /// Readings submitted by the simulator.
    pub readings_submitted: GenericCounter<AtomicF64>,
    /// Token metadata requests served.
    pub metadata_requests: GenericCounter<AtomicF64>,
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics").finish_non_exhaustive()
    }
}

impl Metrics {
    /// Instantiates the various metrics and their counters, also creates a registry for the counters and
    /// registers the counters
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let snapshots_loaded = register_counter_with_registry!(
            "snapshots_loaded",
            "The total number of successful registry snapshots",
            registry
        )?;

        let snapshot_failures = register_counter_with_registry!(
            "snapshot_failures",
            "The total number of failed registry snapshots",
            registry
        )?;

        let patches_applied = register_counter_with_registry!(
            "patches_applied",
            "The total number of sensor records patched from events",
            registry
        )?;

        let patches_dropped = register_counter_with_registry!(
            "patches_dropped",
            "The total number of events for sensors not in the list",
            registry
        )?;

        let sensors_registered = register_counter_with_registry!(
            "sensors_registered",
            "The total number of sensors registered through this node",
            registry
        )?;

        let readings_submitted = register_counter_with_registry!(
            "readings_submitted",
            "The total number of simulated readings submitted",
            registry
        )?;

        let metadata_requests = register_counter_with_registry!(
            "metadata_requests",
            "The total number of token metadata requests",
            registry
        )?;

        Ok(Self {
            registry,
            snapshots_loaded,
            snapshot_failures,
            patches_applied,
            patches_dropped,
            sensors_registered,
            readings_submitted,
            metadata_requests,
        })
    }

    /// Gathers the whole node metrics
    pub fn gather_metrics(&self) -> Result<String, GatherMetricsError> {
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        // Gather the metrics.
        let metric_families = self.registry.gather();
        // Encode them to send.
        encoder.encode(&metric_families, &mut buffer)?;

        Ok(String::from_utf8(buffer)?)
    }
}

/// Errors while encoding the metrics for scraping.
#[derive(Debug, thiserror::Error)]
pub enum GatherMetricsError {
    /// Encoding failed.
    #[error(transparent)]
    PrometheusError(#[from] prometheus::Error),
    /// The encoded metrics were not valid UTF-8.
    #[error(transparent)]
    FromUtf8Error(#[from] std::string::FromUtf8Error),
}
