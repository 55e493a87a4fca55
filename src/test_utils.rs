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

//! Network-free doubles for the registry contract and the event source.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ethers::types::{Address, H256};
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::registry::{Confirmation, SensorRegistry, SensorRegistryWriter};
use crate::sensor::SensorData;
use crate::sync::listener::{NotificationSource, SensorNotification};
use crate::{Error, Result};

#[derive(Debug, Default)]
struct MockState {
    sensors: Vec<(Address, SensorData)>,
    contract_owner: Address,
    owner_call_fails: bool,
    base_uri: Option<String>,
    submissions: Vec<(u64, u64)>,
    failing_reads: HashSet<u64>,
    stalled_reads: HashSet<u64>,
    reject_writes: bool,
    block: u64,
}

/// An in-memory registry contract that behaves like the deployed one.
#[derive(Debug)]
pub struct MockRegistry {
    signer: Address,
    state: Mutex<MockState>,
}

impl MockRegistry {
    /// A registry with `n` sensors owned by accounts other than the signer.
    pub fn with_sensors(n: u64) -> Self {
        let signer = Address::from_low_u64_be(0x5160);
        let registry = Self {
            signer,
            state: Mutex::new(MockState {
                contract_owner: signer,
                ..Default::default()
            }),
        };
        for i in 0..n {
            registry.mint(
                Self::default_owner(i),
                SensorData {
                    latitude: format!("{}.25", i),
                    longitude: format!("-{}.75", i),
                    reputation_score: 90 + i % 10,
                    uptime_score: 80 + i % 20,
                    last_pm25_value: 10 + i,
                    last_updated: 1_700_000_000 + i,
                },
            );
        }
        registry
    }

    fn default_owner(i: u64) -> Address {
        Address::from_low_u64_be(0x1000 + i)
    }

    /// Owner of the `i`-th pre-minted sensor.
    pub fn owner_at(&self, id: u64) -> Address {
        self.state.lock().sensors[id as usize].0
    }

    /// Mints a sensor and returns its id.
    pub fn mint(&self, owner: Address, data: SensorData) -> u64 {
        let mut state = self.state.lock();
        state.sensors.push((owner, data));
        state.sensors.len() as u64 - 1
    }

    /// Mints a sensor with default data.
    pub fn mint_default(&self, owner: Address) -> u64 {
        self.mint(owner, SensorData::default())
    }

    /// Makes every read of sensor `id` fail with a transport error.
    pub fn fail_reads_for(&self, id: u64) {
        self.state.lock().failing_reads.insert(id);
    }

    /// Makes every read of sensor `id` run into the request timeout.
    pub fn stall_reads_for(&self, id: u64) {
        self.state.lock().stalled_reads.insert(id);
    }

    /// Makes every write fail.
    pub fn reject_writes(&self) {
        self.state.lock().reject_writes = true;
    }

    /// Changes the contract owner.
    pub fn set_contract_owner(&self, owner: Address) {
        self.state.lock().contract_owner = owner;
    }

    /// Makes `owner()` fail with a transport error.
    pub fn fail_owner_call(&self) {
        self.state.lock().owner_call_fails = true;
    }

    /// Readings submitted so far, as `(sensor id, pm25)`.
    pub fn submissions(&self) -> Vec<(u64, u64)> {
        self.state.lock().submissions.clone()
    }

    /// The current base URI.
    pub fn base_uri(&self) -> Option<String> {
        self.state.lock().base_uri.clone()
    }

    fn check_read(
        state: &MockState,
        call: &'static str,
        id: u64,
    ) -> Result<()> {
        if state.failing_reads.contains(&id) {
            return Err(Error::Contract {
                call,
                reason: String::from("connection reset by peer"),
            });
        }
        if state.stalled_reads.contains(&id) {
            return Err(Error::RequestTimeout {
                call,
                timeout: Duration::from_millis(300),
            });
        }
        if id as usize >= state.sensors.len() {
            return Err(Error::ContractReverted {
                call,
                reason: String::from("execution reverted: ERC721: invalid token ID"),
            });
        }
        Ok(())
    }

    fn confirm(state: &mut MockState) -> Result<Confirmation> {
        if state.reject_writes {
            return Err(Error::WriteRejected {
                reason: String::from("execution reverted"),
            });
        }
        state.block += 1;
        Ok(Confirmation {
            tx_hash: H256::from_low_u64_be(state.block),
            block_number: Some(state.block),
        })
    }
}

#[async_trait::async_trait]
impl SensorRegistry for MockRegistry {
    async fn total_supply(&self) -> Result<u64> {
        Ok(self.state.lock().sensors.len() as u64)
    }

    async fn owner_of(&self, id: u64) -> Result<Address> {
        let state = self.state.lock();
        Self::check_read(&state, "ownerOf", id)?;
        Ok(state.sensors[id as usize].0)
    }

    async fn sensor_data(&self, id: u64) -> Result<SensorData> {
        let state = self.state.lock();
        Self::check_read(&state, "sensorData", id)?;
        Ok(state.sensors[id as usize].1.clone())
    }

    async fn sensors_by_owner(&self, owner: Address) -> Result<Vec<u64>> {
        let state = self.state.lock();
        Ok(state
            .sensors
            .iter()
            .enumerate()
            .filter(|(_, (o, _))| *o == owner)
            .map(|(id, _)| id as u64)
            .collect())
    }

    async fn contract_owner(&self) -> Result<Address> {
        let state = self.state.lock();
        if state.owner_call_fails {
            return Err(Error::Contract {
                call: "owner",
                reason: String::from("method not found"),
            });
        }
        Ok(state.contract_owner)
    }
}

#[async_trait::async_trait]
impl SensorRegistryWriter for MockRegistry {
    fn signer(&self) -> Address {
        self.signer
    }

    async fn register_sensor(
        &self,
        latitude: String,
        longitude: String,
    ) -> Result<Confirmation> {
        let mut state = self.state.lock();
        let confirmation = Self::confirm(&mut state)?;
        state.sensors.push((
            self.signer,
            SensorData {
                latitude,
                longitude,
                reputation_score: 100,
                uptime_score: 100,
                last_pm25_value: 0,
                last_updated: 0,
            },
        ));
        Ok(confirmation)
    }

    async fn submit_data(&self, id: u64, pm25: u64) -> Result<Confirmation> {
        let mut state = self.state.lock();
        let owned = state
            .sensors
            .get(id as usize)
            .map_or(false, |(owner, _)| *owner == self.signer);
        if !owned {
            return Err(Error::WriteRejected {
                reason: String::from("execution reverted: not the sensor owner"),
            });
        }
        let confirmation = Self::confirm(&mut state)?;
        let block = state.block;
        let data = &mut state.sensors[id as usize].1;
        data.last_pm25_value = pm25;
        data.last_updated = 1_700_000_000 + block;
        state.submissions.push((id, pm25));
        Ok(confirmation)
    }

    async fn set_base_uri(&self, uri: String) -> Result<Confirmation> {
        let mut state = self.state.lock();
        if state.contract_owner != self.signer {
            return Err(Error::WriteRejected {
                reason: String::from("execution reverted: caller is not the owner"),
            });
        }
        let confirmation = Self::confirm(&mut state)?;
        state.base_uri = Some(uri);
        Ok(confirmation)
    }
}

/// Counts how many times a [`ChannelSource`] was released.
#[derive(Debug, Clone, Default)]
pub struct ReleaseCounter(Arc<AtomicUsize>);

impl ReleaseCounter {
    /// Number of releases so far.
    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
struct ReleaseGuard(ReleaseCounter);

impl Drop for ReleaseGuard {
    fn drop(&mut self) {
        (self.0).0.fetch_add(1, Ordering::SeqCst);
    }
}

/// A notification source fed by the test through a channel.
#[derive(Debug)]
pub struct ChannelSource {
    events: mpsc::Receiver<SensorNotification>,
    _guard: ReleaseGuard,
}

impl ChannelSource {
    /// The source, the sender feeding it and a counter of its releases.
    pub fn new() -> (Self, mpsc::Sender<SensorNotification>, ReleaseCounter) {
        let (tx, rx) = mpsc::channel(16);
        let counter = ReleaseCounter::default();
        let source = Self {
            events: rx,
            _guard: ReleaseGuard(counter.clone()),
        };
        (source, tx, counter)
    }
}

#[async_trait::async_trait]
impl NotificationSource for ChannelSource {
    fn name(&self) -> &'static str {
        "channel"
    }

    async fn run(
        self: Box<Self>,
        sink: mpsc::Sender<SensorNotification>,
    ) -> Result<()> {
        let mut this = *self;
        while let Some(notification) = this.events.recv().await {
            if sink.send(notification).await.is_err() {
                break;
            }
        }
        Ok(())
    }
}

/// Handler state backed by `registry` and an empty store.
pub fn test_handler_state<R>(registry: R) -> Arc<crate::handlers::HandlerState>
where
    R: SensorRegistry + 'static,
{
    Arc::new(crate::handlers::HandlerState {
        registry: Arc::new(registry),
        store: crate::store::InMemoryStore::new(),
        metrics: crate::metric::Metrics::new().expect("metrics"),
        image: String::from("https://i.imgur.com/your-default-image.png"),
        info: crate::handlers::NodeInfo {
            chain_name: String::from("U2U Nebulas Testnet"),
            chain_id: 2484,
            contract: Address::from_low_u64_be(0xc0de),
            signer_configured: false,
        },
    })
}
