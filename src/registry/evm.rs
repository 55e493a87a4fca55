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

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ethers::abi::Detokenize;
use ethers::contract::{abigen, ContractCall, ContractError};
use ethers::middleware::SignerMiddleware;
use ethers::providers::{Middleware, Provider, Ws};
use ethers::signers::Signer;
use ethers::types::{Address, Filter, U256, U64};
use futures::{StreamExt, TryFutureExt};
use tokio::sync::mpsc;

use super::{Confirmation, SensorRegistry, SensorRegistryWriter};
use crate::probe;
use crate::sensor::{u256_to_u64, DataSubmitted, SensorData};
use crate::sync::listener::{NotificationSource, SensorNotification};
use crate::types::rpc_url::RpcUrl;
use crate::{Error, Result};

abigen!(
    AuracleRegistryContract,
    r#"[
        function totalSupply() external view returns (uint256)
        function ownerOf(uint256 tokenId) external view returns (address)
        function sensorData(uint256 tokenId) external view returns (string latitude, string longitude, uint256 reputationScore, uint256 uptimeScore, uint256 lastPm25Value, uint256 lastUpdated)
        function getSensorsByOwner(address account) external view returns (uint256[])
        function owner() external view returns (address)
        function registerSensor(string latitude, string longitude) external
        function submitData(uint256 sensorId, uint256 pm25Value) external
        function setBaseURI(string baseURI) external
    ]"#
);

/// Polling interval used while waiting for a transaction receipt.
const RECEIPT_POLL_INTERVAL: Duration = Duration::from_millis(1000);

/// The sensor registry contract, reached through an ethers middleware.
///
/// With a plain `Provider` this is the read-only client; with a
/// `SignerMiddleware` it is the signing client and implements
/// [`SensorRegistryWriter`] as well.
pub struct EvmSensorRegistry<M> {
    contract: AuracleRegistryContract<M>,
    request_timeout: Duration,
    confirmations: usize,
}

impl<M> fmt::Debug for EvmSensorRegistry<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvmSensorRegistry")
            .field("address", &self.contract.address())
            .field("request_timeout", &self.request_timeout)
            .field("confirmations", &self.confirmations)
            .finish()
    }
}

impl<M: Middleware + 'static> EvmSensorRegistry<M> {
    /// Creates a registry client for the contract at `address`.
    pub fn new(
        address: Address,
        client: Arc<M>,
        request_timeout: Duration,
        confirmations: usize,
    ) -> Self {
        Self {
            contract: AuracleRegistryContract::new(address, client),
            request_timeout,
            confirmations,
        }
    }

    /// Address of the registry contract.
    pub fn address(&self) -> Address {
        self.contract.address()
    }

    /// Runs a view call, bounded by the request timeout.
    async fn read<D>(&self, name: &'static str, call: ContractCall<M, D>) -> Result<D>
    where
        D: Detokenize + Send + Sync,
    {
        match tokio::time::timeout(self.request_timeout, call.call()).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(into_call_error(name, e)),
            Err(_) => Err(Error::RequestTimeout {
                call: name,
                timeout: self.request_timeout,
            }),
        }
    }

    /// Dry-runs, sends and waits for the transaction to be mined.
    #[tracing::instrument(skip(self, call), fields(address = ?self.address()))]
    async fn send(
        &self,
        name: &'static str,
        call: ContractCall<M, ()>,
    ) -> Result<Confirmation> {
        // reject early instead of paying for a reverting transaction.
        call.call().await.map_err(|e| {
            tracing::error!(call = name, error = %e, "dry run failed");
            Error::WriteRejected {
                reason: e.to_string(),
            }
        })?;

        let pending = call.send().await.map_err(|e| {
            tracing::event!(
                target: probe::TARGET,
                tracing::Level::DEBUG,
                kind = %probe::Kind::Write,
                call = name,
                errored = true,
                error = %e
            );
            Error::WriteRejected {
                reason: e.to_string(),
            }
        })?;

        let tx_hash = *pending;
        tracing::event!(
            target: probe::TARGET,
            tracing::Level::DEBUG,
            kind = %probe::Kind::Write,
            call = name,
            pending = true,
            ?tx_hash,
        );

        let receipt = pending
            .confirmations(self.confirmations)
            .interval(RECEIPT_POLL_INTERVAL)
            .await
            .map_err(|e| Error::WriteRejected {
                reason: e.to_string(),
            })?
            .ok_or(Error::TransactionDropped(tx_hash))?;

        if receipt.status == Some(U64::zero()) {
            return Err(Error::WriteRejected {
                reason: format!(
                    "transaction {:?} reverted on-chain",
                    receipt.transaction_hash
                ),
            });
        }

        tracing::event!(
            target: probe::TARGET,
            tracing::Level::DEBUG,
            kind = %probe::Kind::Write,
            call = name,
            finalized = true,
            tx_hash = ?receipt.transaction_hash,
        );
        Ok(Confirmation {
            tx_hash: receipt.transaction_hash,
            block_number: receipt.block_number.map(|n| n.as_u64()),
        })
    }
}

fn into_call_error<M: Middleware>(
    call: &'static str,
    e: ContractError<M>,
) -> Error {
    let reason = e.to_string();
    let reverted = matches!(e, ContractError::Revert(_))
        || reason.to_lowercase().contains("revert");
    if reverted {
        Error::ContractReverted { call, reason }
    } else {
        Error::Contract { call, reason }
    }
}

#[async_trait::async_trait]
impl<M: Middleware + 'static> SensorRegistry for EvmSensorRegistry<M> {
    async fn total_supply(&self) -> Result<u64> {
        let total = self
            .read("totalSupply", self.contract.total_supply())
            .await?;
        u256_to_u64(total, "totalSupply")
    }

    async fn owner_of(&self, id: u64) -> Result<Address> {
        self.read("ownerOf", self.contract.owner_of(U256::from(id)))
            .await
    }

    async fn sensor_data(&self, id: u64) -> Result<SensorData> {
        let raw = self
            .read("sensorData", self.contract.sensor_data(U256::from(id)))
            .await?;
        SensorData::from_raw(raw)
    }

    async fn sensors_by_owner(&self, owner: Address) -> Result<Vec<u64>> {
        let ids = self
            .read(
                "getSensorsByOwner",
                self.contract.get_sensors_by_owner(owner),
            )
            .await?;
        ids.into_iter()
            .map(|id| u256_to_u64(id, "getSensorsByOwner"))
            .collect()
    }

    async fn contract_owner(&self) -> Result<Address> {
        self.read("owner", self.contract.owner()).await
    }
}

#[async_trait::async_trait]
impl<P, S> SensorRegistryWriter for EvmSensorRegistry<SignerMiddleware<P, S>>
where
    P: Middleware + 'static,
    S: Signer + 'static,
{
    fn signer(&self) -> Address {
        self.contract.client().address()
    }

    async fn register_sensor(
        &self,
        latitude: String,
        longitude: String,
    ) -> Result<Confirmation> {
        self.send(
            "registerSensor",
            self.contract.register_sensor(latitude, longitude),
        )
        .await
    }

    async fn submit_data(&self, id: u64, pm25: u64) -> Result<Confirmation> {
        self.send(
            "submitData",
            self.contract
                .submit_data(U256::from(id), U256::from(pm25)),
        )
        .await
    }

    async fn set_base_uri(&self, uri: String) -> Result<Confirmation> {
        self.send("setBaseURI", self.contract.set_base_uri(uri))
            .await
    }
}

/// Pushes `DataSubmitted` events from a websocket log subscription.
///
/// The subscription is re-established with a constant backoff if the
/// connection drops, followed by a [`SensorNotification::Resubscribed`].
/// Logs that cannot be decoded are logged and skipped.
#[derive(Debug, Clone)]
pub struct EvmNotificationSource {
    endpoint: RpcUrl,
    address: Address,
}

impl EvmNotificationSource {
    /// Creates a source for the contract at `address`.
    pub fn new(endpoint: RpcUrl, address: Address) -> Self {
        Self { endpoint, address }
    }

    async fn watch_for_events(
        &self,
        sink: &mpsc::Sender<SensorNotification>,
        subscribed_before: &AtomicBool,
    ) -> std::result::Result<(), backoff::Error<Error>> {
        tracing::debug!(endpoint = %self.endpoint, "Connecting");
        let provider = Provider::<Ws>::connect(self.endpoint.as_url().as_str())
            .map_err(Error::from)
            .await?;
        let filter = Filter::new()
            .address(self.address)
            .topic0(DataSubmitted::signature());
        let mut stream = provider
            .subscribe_logs(&filter)
            .map_err(Error::from)
            .await?;
        tracing::event!(
            target: probe::TARGET,
            tracing::Level::DEBUG,
            kind = %probe::Kind::Subscription,
            address = ?self.address,
            subscribed = true,
        );
        if subscribed_before.swap(true, Ordering::SeqCst)
            && sink.send(SensorNotification::Resubscribed).await.is_err()
        {
            return Ok(());
        }
        // dropping the stream unsubscribes.
        while let Some(log) = stream.next().await {
            match DataSubmitted::try_from(&log) {
                Ok(event) => {
                    let notification = SensorNotification::DataSubmitted(event);
                    if sink.send(notification).await.is_err() {
                        // the listener is gone, nothing left to do.
                        return Ok(());
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        tx_hash = ?log.transaction_hash,
                        "Dropping malformed DataSubmitted log"
                    );
                }
            }
        }
        Err(backoff::Error::transient(Error::SubscriptionClosed(
            "DataSubmitted",
        )))
    }
}

#[async_trait::async_trait]
impl NotificationSource for EvmNotificationSource {
    fn name(&self) -> &'static str {
        "evm-data-submitted"
    }

    async fn run(
        self: Box<Self>,
        sink: mpsc::Sender<SensorNotification>,
    ) -> Result<()> {
        let backoff = backoff::backoff::Constant::new(Duration::from_secs(1));
        let subscribed_before = AtomicBool::new(false);
        let task =
            || async { self.watch_for_events(&sink, &subscribed_before).await };
        backoff::future::retry_notify(backoff, task, |e, after: Duration| {
            tracing::warn!(
                error = %e,
                retry_in = ?after,
                "Event subscription failed, reconnecting"
            );
        })
        .await
    }
}
