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

//! # Node Context Module 🕸️
//!
//! A module for managing the context of the node.
use std::sync::Arc;
use std::time::Duration;

use ethers::core::k256::SecretKey;
use ethers::middleware::SignerMiddleware;
use ethers::providers::{Http, Provider};
use ethers::signers::{LocalWallet, Signer};
use tokio::sync::broadcast;

use crate::config::AuracleConfig;
use crate::metric::Metrics;
use crate::registry::{EvmNotificationSource, EvmSensorRegistry};
use crate::store::InMemoryStore;
use crate::{Error, Result};

/// Polling interval of the HTTP provider.
const PROVIDER_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// The signing client: the HTTP provider wrapped with the configured wallet.
pub type SigningClient = SignerMiddleware<Provider<Http>, LocalWallet>;

/// AuracleContext contains the node's configuration, shared state and
/// shutdown signal.
#[derive(Clone)]
pub struct AuracleContext {
    /// The configuration of the node.
    pub config: AuracleConfig,
    /// Broadcasts a shutdown signal to all long running tasks.
    ///
    /// Each task holds a [`Shutdown`] subscribed to this sender. When a
    /// graceful shutdown is initiated a `()` is sent, every task reaches a
    /// safe terminal state and completes.
    notify_shutdown: broadcast::Sender<()>,
    /// Represents the metrics for the node
    pub metrics: Metrics,
    /// The sensor list the dashboard reads from.
    pub store: InMemoryStore,
}

impl AuracleContext {
    /// Creates a new AuracleContext.
    pub fn new(config: AuracleConfig) -> Result<Self> {
        let (notify_shutdown, _) = broadcast::channel(2);
        let metrics = Metrics::new()?;
        Ok(Self {
            config,
            notify_shutdown,
            metrics,
            store: InMemoryStore::new(),
        })
    }

    /// Returns a broadcast receiver handle for the shutdown signal.
    pub fn shutdown_signal(&self) -> Shutdown {
        Shutdown::new(self.notify_shutdown.subscribe())
    }

    /// Sends a shutdown signal to all subscribed tasks.
    pub fn shutdown(&self) {
        let _ = self.notify_shutdown.send(());
    }

    /// Returns a new HTTP provider for the configured chain.
    pub fn http_provider(&self) -> Result<Provider<Http>> {
        let provider =
            Provider::try_from(self.config.chain.http_endpoint.as_url().as_str())?
                .interval(PROVIDER_POLL_INTERVAL);
        Ok(provider)
    }

    /// Sets up and returns the wallet of the signing account.
    pub fn wallet(&self) -> Result<LocalWallet> {
        let private_key = self
            .config
            .chain
            .private_key
            .as_ref()
            .ok_or(Error::MissingSecrets)?;
        let key = SecretKey::from_bytes(private_key.as_bytes().into())?;
        let wallet =
            LocalWallet::from(key).with_chain_id(self.config.chain.chain_id);
        Ok(wallet)
    }

    /// The read-only registry client.
    pub fn registry(&self) -> Result<EvmSensorRegistry<Provider<Http>>> {
        Ok(EvmSensorRegistry::new(
            self.config.contract.address,
            Arc::new(self.http_provider()?),
            self.config.request_timeout(),
            self.config.chain.confirmations,
        ))
    }

    /// The signing registry client. Fails with
    /// [`Error::MissingSecrets`] if no private key is configured.
    pub fn signing_registry(&self) -> Result<EvmSensorRegistry<SigningClient>> {
        let client = SignerMiddleware::new(self.http_provider()?, self.wallet()?);
        Ok(EvmSensorRegistry::new(
            self.config.contract.address,
            Arc::new(client),
            self.config.request_timeout(),
            self.config.chain.confirmations,
        ))
    }

    /// The websocket `DataSubmitted` subscription.
    pub fn notification_source(&self) -> EvmNotificationSource {
        EvmNotificationSource::new(
            self.config.chain.ws_endpoint.clone(),
            self.config.contract.address,
        )
    }

    /// A link to the transaction on the configured block explorer, if any.
    pub fn explorer_tx_url(&self, tx_hash: ethers::types::TxHash) -> Option<String> {
        let explorer = self.config.chain.explorer.as_ref()?;
        explorer
            .join(&format!("tx/{tx_hash:?}"))
            .ok()
            .map(String::from)
    }
}

/// Listens for the shutdown signal.
///
/// Shutdown is signalled using a `broadcast::Receiver`. Only a single value is
/// ever sent. Once a value has been sent via the broadcast channel, the node
/// should shutdown.
///
/// The `Shutdown` struct listens for the signal and tracks that the signal has
/// been received. Callers may query for whether the shutdown signal has been
/// received or not.
#[derive(Debug)]
pub struct Shutdown {
    /// `true` if the shutdown signal has been received
    shutdown: bool,

    /// The receive half of the channel used to listen for shutdown.
    notify: broadcast::Receiver<()>,
}

impl Shutdown {
    /// Create a new `Shutdown` backed by the given `broadcast::Receiver`.
    pub fn new(notify: broadcast::Receiver<()>) -> Shutdown {
        Shutdown {
            shutdown: false,
            notify,
        }
    }

    /// Returns `true` if the shutdown signal has been received.
    pub fn is_shutdown(&self) -> bool {
        self.shutdown
    }

    /// Receive the shutdown notice, waiting if necessary.
    pub async fn recv(&mut self) {
        // If the shutdown signal has already been received, then return
        // immediately.
        if self.shutdown {
            return;
        }

        // Cannot receive a "lag error" as only one value is ever sent.
        let _ = self.notify.recv().await;

        // Remember that the signal has been received.
        self.shutdown = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_from_files;

    fn context(private_key: Option<&str>) -> AuracleContext {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("auracle.toml");
        let key = private_key
            .map(|k| format!("private-key = \"{k}\"\n"))
            .unwrap_or_default();
        std::fs::write(
            &path,
            format!(
                "[chain]\nhttp-endpoint = \"http://127.0.0.1:8545\"\nws-endpoint = \"ws://127.0.0.1:8546\"\nexplorer = \"https://testnet.u2uscan.xyz/\"\n{key}\n[contract]\naddress = \"0x5FbDB2315678afecb367f032d93F642f64180aa3\"\n"
            ),
        )
        .unwrap();
        AuracleContext::new(parse_from_files(&[path]).unwrap()).unwrap()
    }

    #[test]
    fn signing_requires_a_private_key() {
        let ctx = context(None);
        assert!(ctx.registry().is_ok());
        assert!(matches!(ctx.wallet(), Err(Error::MissingSecrets)));
        assert!(matches!(
            ctx.signing_registry(),
            Err(Error::MissingSecrets)
        ));
    }

    #[test]
    fn wallet_uses_the_configured_chain() {
        // the first well-known development account.
        let ctx = context(Some(
            "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80",
        ));
        let wallet = ctx.wallet().unwrap();
        assert_eq!(wallet.chain_id(), 2484);
        assert_eq!(
            wallet.address(),
            "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"
                .parse::<ethers::types::Address>()
                .unwrap()
        );
    }

    #[test]
    fn explorer_links() {
        let ctx = context(None);
        let link = ctx
            .explorer_tx_url(ethers::types::TxHash::zero())
            .unwrap();
        assert!(link.starts_with("https://testnet.u2uscan.xyz/tx/0x0000"));
    }

    #[tokio::test]
    async fn shutdown_reaches_every_subscriber() {
        let ctx = context(None);
        let mut a = ctx.shutdown_signal();
        let mut b = ctx.shutdown_signal();
        ctx.shutdown();
        a.recv().await;
        b.recv().await;
        assert!(a.is_shutdown() && b.is_shutdown());
        // subsequent calls return immediately
        a.recv().await;
    }
}
