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

#![deny(unsafe_code)]
#![warn(missing_docs)]

//! # Auracle Node Crate 🌫️
//!
//! A crate that keeps an off-chain view of the Auracle sensor registry and
//! serves the metadata of its sensor tokens.
//!
//! ## Overview
//!
//! Auracle is a network of air-quality sensors, each one minted as an
//! ERC-721 token on an EVM chain. The token stores where the sensor stands
//! and the last PM2.5 reading it submitted. The node plays three roles:
//!
//!   1. Sync: a full snapshot of every sensor is read from the contract and
//!      kept in memory, then individual sensors are patched as
//!      `DataSubmitted` events arrive over a websocket subscription.
//!   2. Metadata: `GET /api/metadata/{id}` renders the ERC-721 metadata
//!      document of a token straight from the chain.
//!   3. Administration: registering new sensors, simulating readings and
//!      pointing the contract at the metadata endpoint.
//!
//! Reads go through a [`registry::SensorRegistry`], writes through a
//! [`registry::SensorRegistryWriter`]. Both are traits, so every sync
//! component can run against an in-memory registry in tests.
//!
//! # Features
//!
//! * `integration-tests`: Log in JSON instead of the pretty format. By default, this is disabled.

/// Owner-only contract administration.
pub mod admin;
/// Command line options and logger setup.
pub mod cli;
/// Configuration loading and validation.
pub mod config;
/// A module for managing the context of the node.
pub mod context;
/// Error types of the node.
pub mod error;
/// HTTP handlers.
pub mod handlers;
/// Token metadata documents.
pub mod metadata;
/// Metrics functionality
pub mod metric;
/// A module used for debugging node lifecycle, sync state, or other node state.
pub mod probe;
/// The sensor registry contract.
pub mod registry;
/// Sensor records and events.
pub mod sensor;
/// HTTP server and background service assembly.
pub mod service;
/// Reading simulator.
pub mod simulator;
/// The in-memory sensor list.
pub mod store;
/// Snapshot, live patching and registration.
pub mod sync;
/// Configuration value types.
pub mod types;

#[cfg(test)]
mod test_utils;

pub use error::{Error, Result};
