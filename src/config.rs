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

//! # Node Configuration Module 🕸️
//!
//! A module for configuring the node.
//!
//! ## Overview
//!
//! Every `*.toml` and `*.json` file under the config directory is merged,
//! then environment variables prefixed with `AURACLE_` are layered on top.
//! Sections are separated by a double underscore and the dashes of a key are
//! written as underscores, so `AURACLE_CHAIN__PRIVATE_KEY` sets
//! `chain.private-key`.
//! Possible configuration include:
//! * `port`: The port the HTTP server will listen on. Defaults to 3000
//! * `request-timeout`: Upper bound of every chain read, in milliseconds.
//! * `chain`: The network the registry contract lives on.
//! * `contract`: The registry contract.
//! * `metadata`: Static parts of the token metadata.
//! * `simulator`: Settings of the reading simulator.

use std::path::{Path, PathBuf};
use std::time::Duration;

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, File, Source};
use ethers::types::Address;
use serde::{Deserialize, Serialize};

use crate::types::private_key::PrivateKey;
use crate::types::rpc_url::RpcUrl;
use crate::{Error, Result};

/// The default port the node will listen on. Defaults to 3000.
const fn default_port() -> u16 {
    3000
}
/// Chain reads time out after `10_000` ms by default.
const fn default_request_timeout() -> u64 {
    10_000
}
/// U2U Nebulas testnet.
const fn default_chain_id() -> u32 {
    2484
}
fn default_chain_name() -> String {
    String::from("U2U Nebulas Testnet")
}
/// Transactions are considered final after one confirmation by default.
const fn default_confirmations() -> usize {
    1
}
fn default_image() -> String {
    String::from("https://i.imgur.com/your-default-image.png")
}
fn default_base_uri() -> String {
    String::from("https://auracle-dapp.vercel.app/api/metadata/")
}
/// The simulator submits a reading every `15_000` ms by default.
const fn default_simulator_interval() -> u64 {
    15_000
}
const fn default_min_pm25() -> u64 {
    5
}
const fn default_max_pm25() -> u64 {
    50
}

/// AuracleConfig is the configuration for the auracle node.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct AuracleConfig {
    /// HTTP Server Port number
    ///
    /// default to 3000
    #[serde(default = "default_port", skip_serializing)]
    pub port: u16,
    /// Upper bound of every chain read, in milliseconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
    /// The network the registry contract is deployed on.
    pub chain: ChainConfig,
    /// The registry contract.
    pub contract: ContractConfig,
    /// Token metadata settings.
    #[serde(default)]
    pub metadata: MetadataConfig,
    /// Reading simulator settings.
    #[serde(default)]
    pub simulator: SimulatorConfig,
}

impl AuracleConfig {
    /// The request timeout as a [`Duration`].
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout)
    }
}

/// The chain configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ChainConfig {
    /// Human-readable name of the network.
    #[serde(default = "default_chain_name")]
    pub name: String,
    /// chain specific id (output of chainId opcode on EVM networks)
    #[serde(default = "default_chain_id")]
    pub chain_id: u32,
    /// Http(s) Endpoint for reads and writes
    #[serde(skip_serializing)]
    pub http_endpoint: RpcUrl,
    /// Websocket Endpoint for the event subscription
    #[serde(skip_serializing)]
    pub ws_endpoint: RpcUrl,
    /// Block Explorer for this chain.
    ///
    /// Optional, and only used for printing links to transactions.
    #[serde(skip_serializing)]
    pub explorer: Option<url::Url>,
    /// The Private Key of the signing account.
    ///
    /// Only needed by the commands that send transactions. Either a
    /// `0x` prefixed hex string, or `$NAME` to read it from the environment.
    #[serde(skip_serializing)]
    pub private_key: Option<PrivateKey>,
    /// Confirmations to wait for before a transaction counts as mined.
    #[serde(default = "default_confirmations")]
    pub confirmations: usize,
}

/// The registry contract configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ContractConfig {
    /// The address of the deployed sensor registry.
    pub address: Address,
}

/// Static parts of the token metadata.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct MetadataConfig {
    /// Image URL put into every token's metadata.
    #[serde(default = "default_image")]
    pub image: String,
    /// The base URI `set-base-uri` points the contract at.
    #[serde(default = "default_base_uri")]
    pub base_uri: String,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            image: default_image(),
            base_uri: default_base_uri(),
        }
    }
}

/// Reading simulator configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct SimulatorConfig {
    /// Time between two submissions, in milliseconds.
    #[serde(default = "default_simulator_interval")]
    pub interval: u64,
    /// Lowest simulated PM2.5 value (inclusive).
    #[serde(default = "default_min_pm25")]
    pub min_pm25: u64,
    /// Highest simulated PM2.5 value (exclusive).
    #[serde(default = "default_max_pm25")]
    pub max_pm25: u64,
}

impl SimulatorConfig {
    /// The interval as a [`Duration`].
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval)
    }
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            interval: default_simulator_interval(),
            min_pm25: default_min_pm25(),
            max_pm25: default_max_pm25(),
        }
    }
}

/// A helper function that will search for all config files in the given directory and return them as a vec
/// of the paths.
///
/// Supported file extensions are:
/// - `.toml`.
/// - `.json`.
pub fn search_config_files<P: AsRef<Path>>(base_dir: P) -> Result<Vec<PathBuf>> {
    // A pattern that covers all toml or json files in the config directory and subdirectories.
    let toml_pattern = format!("{}/**/*.toml", base_dir.as_ref().display());
    let json_pattern = format!("{}/**/*.json", base_dir.as_ref().display());
    tracing::trace!(
        "Loading config files from {} and {}",
        toml_pattern,
        json_pattern
    );
    let toml_files = glob::glob(&toml_pattern)?;
    let json_files = glob::glob(&json_pattern)?;
    toml_files
        .chain(json_files)
        .map(|v| v.map_err(Error::from))
        .collect()
}

/// Prefix of the environment variables merged over the config files.
const ENV_PREFIX: &str = "AURACLE";

/// Try to parse the [`AuracleConfig`] from the given config file(s).
pub fn parse_from_files(files: &[PathBuf]) -> Result<AuracleConfig> {
    parse_with_env_prefix(files, ENV_PREFIX)
}

fn parse_with_env_prefix(
    files: &[PathBuf],
    env_prefix: &str,
) -> Result<AuracleConfig> {
    let mut builder = Config::builder();
    for config_file in files {
        tracing::trace!("Loading config file: {}", config_file.display());
        let ext = config_file
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("");
        let format = match ext {
            "toml" => config::FileFormat::Toml,
            "json" => config::FileFormat::Json,
            _ => {
                tracing::warn!("Unknown file extension: {}", ext);
                continue;
            }
        };
        builder = builder
            .add_source(File::from(config_file.as_path()).format(format));
    }

    // also merge in the environment (with a prefix of AURACLE).
    let cfg = with_environment(builder, env_prefix)?.build()?;
    // and finally deserialize the config and post-process it
    let config: std::result::Result<
        AuracleConfig,
        serde_path_to_error::Error<config::ConfigError>,
    > = serde_path_to_error::deserialize(cfg);
    match config {
        Ok(c) => postloading_process(c),
        Err(e) => {
            tracing::error!("{}", e);
            Err(e.into())
        }
    }
}

/// Layers `<PREFIX>_SECTION__KEY` variables over `builder`, mapping the
/// underscores of each key back to the dashes of its kebab-case name.
fn with_environment(
    mut builder: ConfigBuilder<DefaultState>,
    prefix: &str,
) -> Result<ConfigBuilder<DefaultState>> {
    let environment = config::Environment::with_prefix(prefix)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true);
    for (key, value) in environment.collect()? {
        builder = builder.set_override(key.replace('_', "-"), value)?;
    }
    Ok(builder)
}

/// Load the configuration files from a directory.
///
/// it is the same as using the [`search_config_files`] and [`parse_from_files`] functions combined.
pub fn load<P: AsRef<Path>>(path: P) -> Result<AuracleConfig> {
    parse_from_files(&search_config_files(path)?)
}

/// The postloading_process exists to validate configuration and standardize
/// the format of the configuration
pub fn postloading_process(mut config: AuracleConfig) -> Result<AuracleConfig> {
    tracing::trace!("Checking configration sanity ...");
    if config.chain.chain_id == 0 {
        return Err(Error::InvalidConfig(String::from(
            "chain.chain-id must not be zero",
        )));
    }
    if config.request_timeout == 0 {
        return Err(Error::InvalidConfig(String::from(
            "request-timeout must not be zero",
        )));
    }
    if !config.chain.http_endpoint.is_http() {
        return Err(Error::InvalidConfig(format!(
            "chain.http-endpoint must be an http(s) url, got {}",
            config.chain.http_endpoint
        )));
    }
    if !config.chain.ws_endpoint.is_websocket() {
        return Err(Error::InvalidConfig(format!(
            "chain.ws-endpoint must be a ws(s) url, got {}",
            config.chain.ws_endpoint
        )));
    }
    if config.chain.confirmations == 0 {
        tracing::warn!("chain.confirmations is zero, waiting for one instead");
        config.chain.confirmations = 1;
    }
    if config.simulator.min_pm25 >= config.simulator.max_pm25 {
        return Err(Error::InvalidConfig(format!(
            "simulator.min-pm25 ({}) must be below simulator.max-pm25 ({})",
            config.simulator.min_pm25, config.simulator.max_pm25
        )));
    }
    if config.simulator.interval == 0 {
        return Err(Error::InvalidConfig(String::from(
            "simulator.interval must not be zero",
        )));
    }
    url::Url::parse(&config.metadata.base_uri)?;
    if !config.metadata.base_uri.ends_with('/') {
        tracing::warn!(
            base_uri = %config.metadata.base_uri,
            "metadata.base-uri does not end with a slash, token ids will be appended directly"
        );
    }
    Ok(config)
}
