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

use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use ethers::providers::ProviderError;
use serde::Serialize;

/// An enum of all possible errors that could be encountered while syncing,
/// serving or administering the Auracle sensor registry.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An Io error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// JSON Error occurred.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    /// Config loading error.
    #[error(transparent)]
    Config(#[from] config::ConfigError),
    /// Error while iterating over a glob pattern.
    #[error(transparent)]
    GlobPattern(#[from] glob::PatternError),
    /// Error from Glob Iterator.
    #[error(transparent)]
    Glob(#[from] glob::GlobError),
    /// Error while parsing a URL.
    #[error(transparent)]
    Url(#[from] url::ParseError),
    /// HTTP server error.
    #[error(transparent)]
    Hyper(#[from] hyper::Error),
    /// Error in Http/Ws Provider (ethers client).
    #[error(transparent)]
    EthersProvider(#[from] ProviderError),
    /// Elliptic Curve error.
    #[error(transparent)]
    EllipticCurve(#[from] ethers::core::k256::elliptic_curve::Error),
    /// Prometheus registry error.
    #[error(transparent)]
    Prometheus(#[from] prometheus::Error),
    /// Error while parsing the config files.
    #[error("Config parse error: {}", _0)]
    ParseConfig(#[from] serde_path_to_error::Error<config::ConfigError>),
    /// The config was parsed but does not make sense.
    #[error("Invalid config: {}", _0)]
    InvalidConfig(String),
    /// Missing signing key in the config.
    #[error("Missing required private-key in the config")]
    MissingSecrets,
    /// A token id that is not a non-negative integer.
    #[error("Invalid token id: {:?}", _0)]
    InvalidTokenId(String),
    /// Coordinates outside of the valid latitude/longitude range.
    #[error("Invalid coordinates: lat {lat}, lng {lng}")]
    InvalidCoordinates {
        /// Latitude in degrees.
        lat: f64,
        /// Longitude in degrees.
        lng: f64,
    },
    /// The contract call reverted, e.g. `ownerOf` for an unminted token.
    #[error("Call `{call}` reverted: {reason}")]
    ContractReverted {
        /// The contract method.
        call: &'static str,
        /// Revert reason, if the node gave one.
        reason: String,
    },
    /// The node did not answer in time.
    #[error("Call `{call}` timed out after {}ms", timeout.as_millis())]
    RequestTimeout {
        /// The contract method.
        call: &'static str,
        /// The configured request timeout.
        timeout: Duration,
    },
    /// Any other failure talking to the contract (transport, decoding, ...).
    #[error("Call `{call}` failed: {reason}")]
    Contract {
        /// The contract method.
        call: &'static str,
        /// Error description.
        reason: String,
    },
    /// A state changing call was rejected, reverted or failed to send.
    #[error("Transaction rejected: {reason}")]
    WriteRejected {
        /// Error description.
        reason: String,
    },
    /// The transaction was dropped from the mempool before confirmation.
    #[error("Transaction {0:?} was dropped from the mempool")]
    TransactionDropped(ethers::types::TxHash),
    /// A `DataSubmitted` log that could not be decoded.
    #[error("Malformed event: {}", _0)]
    MalformedEvent(String),
    /// An on-chain integer that does not fit the local representation.
    #[error("Value of `{field}` does not fit into 64 bits")]
    ValueOverflow {
        /// Field name.
        field: &'static str,
    },
    /// The signer does not own any sensor to simulate.
    #[error("Account {0:?} has no registered sensors")]
    NoSensorsForOwner(ethers::types::Address),
    /// The signer is not the owner of the contract.
    #[error("Account {signer:?} is not the contract owner ({owner:?})")]
    NotContractOwner {
        /// The configured signer.
        signer: ethers::types::Address,
        /// The actual contract owner.
        owner: ethers::types::Address,
    },
    /// The websocket subscription ended.
    #[error("Subscription to `{0}` closed")]
    SubscriptionClosed(&'static str),
}

impl Error {
    /// Whether this error means the requested token does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::ContractReverted { .. })
    }

    /// A short description that is safe to show to API clients.
    ///
    /// Transport errors can carry the node URL (including API keys in the
    /// query string), so only the failing call and the kind of failure are
    /// kept. The full error belongs in the logs.
    pub fn public_summary(&self) -> String {
        match self {
            Error::ContractReverted { call, .. } => format!("`{call}` reverted"),
            Error::RequestTimeout { call, timeout } => {
                format!("`{call}` timed out after {}ms", timeout.as_millis())
            }
            Error::Contract { call, .. } => format!("`{call}` failed"),
            Error::ValueOverflow { .. } => self.to_string(),
            _ => String::from("registry unavailable"),
        }
    }

    /// Whether this error was caused by bad input, before any chain call.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::InvalidTokenId(_) | Error::InvalidCoordinates { .. }
        )
    }
}

/// A type alias for the result for auracle node, that uses the `Error` enum.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for HTTP handlers
pub struct HandlerError(
    /// HTTP status code for response
    pub StatusCode,
    /// Response message
    pub String,
);

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
}

impl From<Error> for HandlerError {
    fn from(value: Error) -> Self {
        // the details only go to the logs.
        tracing::error!(error = %value, "request failed");
        HandlerError(
            StatusCode::INTERNAL_SERVER_ERROR,
            String::from("Internal Server Error"),
        )
    }
}

impl IntoResponse for HandlerError {
    fn into_response(self) -> Response {
        (self.0, Json(ErrorBody { error: &self.1 })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reverts_are_not_found() {
        let e = Error::ContractReverted {
            call: "ownerOf",
            reason: String::from("ERC721NonexistentToken"),
        };
        assert!(e.is_not_found());
        let e = Error::Contract {
            call: "ownerOf",
            reason: String::from("connection reset"),
        };
        assert!(!e.is_not_found());
    }

    #[test]
    fn internal_errors_do_not_leak() {
        let e = Error::Contract {
            call: "sensorData",
            reason: String::from("secret node url"),
        };
        let HandlerError(status, msg) = e.into();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!msg.contains("secret"));
    }

    #[test]
    fn public_summary_drops_transport_details() {
        let e = Error::Contract {
            call: "totalSupply",
            reason: String::from(
                "error sending request for url (http://node/rpc?apikey=SUPERSECRET)",
            ),
        };
        assert_eq!(e.public_summary(), "`totalSupply` failed");

        let e = Error::RequestTimeout {
            call: "ownerOf",
            timeout: Duration::from_millis(300),
        };
        assert_eq!(e.public_summary(), "`ownerOf` timed out after 300ms");

        let e = Error::EthersProvider(ProviderError::CustomError(String::from(
            "ws://node/?key=SUPERSECRET",
        )));
        assert!(!e.public_summary().contains("SUPERSECRET"));
    }
}
