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

//! # Handlers Module 🕸️
//!
//! HTTP handlers of the `serve` command.

use std::sync::Arc;

use ethers::types::Address;
use serde::Serialize;

use crate::metric::Metrics;
use crate::registry::SensorRegistry;
use crate::sensor::serialize_checksummed;
use crate::store::InMemoryStore;

/// Node information endpoint.
pub mod info;
/// Token metadata endpoint.
pub mod metadata;
/// Prometheus metrics endpoint.
pub mod metric;
/// Sensor list endpoints.
pub mod sensors;

/// Public facts about the node.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeInfo {
    /// Name of the configured network.
    pub chain_name: String,
    /// Chain id of the configured network.
    pub chain_id: u32,
    /// The registry contract.
    #[serde(serialize_with = "serialize_checksummed")]
    pub contract: Address,
    /// Whether a signing key is configured.
    pub signer_configured: bool,
}

/// Everything the handlers need, shared by all requests.
#[derive(Clone)]
pub struct HandlerState {
    /// Read-only registry client.
    pub registry: Arc<dyn SensorRegistry>,
    /// The sensor list.
    pub store: InMemoryStore,
    /// Node metrics.
    pub metrics: Metrics,
    /// Image URL put into token metadata.
    pub image: String,
    /// Served by the info endpoint.
    pub info: NodeInfo,
}

impl std::fmt::Debug for HandlerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerState")
            .field("store", &self.store)
            .field("info", &self.info)
            .finish()
    }
}
