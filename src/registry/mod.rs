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

//! # Sensor Registry Module 🔗
//!
//! The contract surface the node talks to, split in a read-only half and a
//! signing half so that serving metadata never needs a private key.

use async_trait::async_trait;
use ethers::types::{Address, TxHash};

use crate::sensor::SensorData;
use crate::Result;

/// The ethers backed implementation of the registry traits.
pub mod evm;

pub use evm::{EvmNotificationSource, EvmSensorRegistry};

/// A confirmed state changing transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Confirmation {
    /// Hash of the mined transaction.
    pub tx_hash: TxHash,
    /// Block the transaction was included in.
    pub block_number: Option<u64>,
}

/// Read-only access to the sensor registry contract.
///
/// Every call is bounded by a request timeout. A call that reverts (like
/// `ownerOf` for a token that was never minted) fails with
/// [`Error::ContractReverted`](crate::Error::ContractReverted).
#[async_trait]
pub trait SensorRegistry: Send + Sync {
    /// Number of minted sensors.
    async fn total_supply(&self) -> Result<u64>;
    /// Owner of the sensor token.
    async fn owner_of(&self, id: u64) -> Result<Address>;
    /// Registration data and last reading of the sensor.
    async fn sensor_data(&self, id: u64) -> Result<SensorData>;
    /// Ids of every sensor owned by `owner`.
    async fn sensors_by_owner(&self, owner: Address) -> Result<Vec<u64>>;
    /// The contract owner (admin).
    async fn contract_owner(&self) -> Result<Address>;

    /// Issues `ownerOf(id)` and `sensorData(id)` concurrently.
    async fn sensor(&self, id: u64) -> Result<(Address, SensorData)> {
        futures::try_join!(self.owner_of(id), self.sensor_data(id))
    }
}

/// Signing access to the sensor registry contract.
///
/// Each call waits for the configured number of confirmations and never
/// retries on its own.
#[async_trait]
pub trait SensorRegistryWriter: SensorRegistry {
    /// Address of the signing account.
    fn signer(&self) -> Address;
    /// Mints a new sensor owned by the signer.
    async fn register_sensor(
        &self,
        latitude: String,
        longitude: String,
    ) -> Result<Confirmation>;
    /// Submits a PM2.5 reading for a sensor owned by the signer.
    async fn submit_data(&self, id: u64, pm25: u64) -> Result<Confirmation>;
    /// Sets the token metadata base URI. Owner only.
    async fn set_base_uri(&self, uri: String) -> Result<Confirmation>;
}
