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

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;

use super::HandlerState;
use crate::error::HandlerError;
use crate::metadata::TokenMetadata;
use crate::probe;
use crate::{Error, Result};

/// Advisory caching for CDNs in front of the endpoint.
pub const METADATA_CACHE_CONTROL: &str = "s-maxage=60, stale-while-revalidate";

/// Parses a token id path segment. Only plain decimal digits are accepted.
pub fn parse_token_id(raw: &str) -> Result<u64> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::InvalidTokenId(raw.to_string()));
    }
    raw.parse()
        .map_err(|_| Error::InvalidTokenId(raw.to_string()))
}

/// Handles token metadata requests
///
/// Returns the ERC-721 metadata document of the sensor token, read fresh
/// from the chain. Unminted tokens are a 404.
///
/// # Arguments
///
/// * `state` - Handler state holding the read-only registry client
/// * `id` - The token id path segment
#[tracing::instrument(skip(state))]
pub async fn handle_sensor_metadata(
    State(state): State<Arc<HandlerState>>,
    Path(id): Path<String>,
) -> std::result::Result<impl IntoResponse, HandlerError> {
    state.metrics.metadata_requests.inc();
    let id = parse_token_id(&id).map_err(|_| {
        HandlerError(
            StatusCode::BAD_REQUEST,
            String::from("Token ID is missing or invalid."),
        )
    })?;

    let (owner, data) = match state.registry.sensor(id).await {
        Ok(pair) => pair,
        Err(e) if e.is_not_found() => {
            tracing::debug!(id, error = %e, "Token not found");
            return Err(HandlerError(
                StatusCode::NOT_FOUND,
                String::from("Token not found"),
            ));
        }
        Err(e) => return Err(e.into()),
    };

    tracing::event!(
        target: probe::TARGET,
        tracing::Level::DEBUG,
        kind = %probe::Kind::Metadata,
        id,
    );
    let metadata = TokenMetadata::render(id, owner, data, &state.image);
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/json"),
            (header::CACHE_CONTROL, METADATA_CACHE_CONTROL),
        ],
        Json(metadata),
    ))
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::Request;
    use ethers::types::Address;
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;
    use crate::sensor::SensorData;
    use crate::service::build_router;
    use crate::test_utils::{test_handler_state, MockRegistry};

    async fn get(registry: MockRegistry, uri: &str) -> (StatusCode, axum::http::HeaderMap, Value) {
        let app = build_router(test_handler_state(registry));
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
        (status, headers, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn token_ids_are_plain_digits() {
        assert_eq!(parse_token_id("0").unwrap(), 0);
        assert_eq!(parse_token_id("999999").unwrap(), 999_999);
        for bad in ["", "-1", "+5", "1.5", "abc", " 3", "99999999999999999999999"] {
            assert!(parse_token_id(bad).is_err(), "{bad:?}");
        }
    }

    #[tokio::test]
    async fn minted_token_renders_metadata() {
        let registry = MockRegistry::with_sensors(5);
        let owner = Address::from_low_u64_be(0xabc);
        let id = registry.mint(
            owner,
            SensorData {
                latitude: "48.8566".into(),
                longitude: "2.3522".into(),
                reputation_score: 77,
                uptime_score: 64,
                last_pm25_value: 31,
                last_updated: 1_720_000_000,
            },
        );
        assert_eq!(id, 5);

        let (status, headers, body) = get(registry, "/api/metadata/5").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers[header::CONTENT_TYPE], "application/json");
        assert_eq!(headers[header::CACHE_CONTROL], METADATA_CACHE_CONTROL);
        assert_eq!(body["name"], "Auracle Sensor #5");
        assert_eq!(body["attributes"][2]["value"], 77);
        assert_eq!(body["attributes"][5]["value"], 1_720_000_000u64);
        assert_eq!(body["attributes"][0]["value"], "48.8566");
        assert_eq!(
            body["owner"].as_str().unwrap().to_lowercase(),
            format!("{owner:?}")
        );
    }

    #[tokio::test]
    async fn unminted_token_is_not_found() {
        let (status, _, body) =
            get(MockRegistry::with_sensors(3), "/api/metadata/999999").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Token not found");
    }

    #[tokio::test]
    async fn invalid_id_is_a_bad_request() {
        let (status, _, body) =
            get(MockRegistry::with_sensors(3), "/api/metadata/abc").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Token ID is missing or invalid.");
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn transport_failures_do_not_leak() {
        let registry = MockRegistry::with_sensors(3);
        registry.fail_reads_for(1);
        let (status, _, body) = get(registry, "/api/metadata/1").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Internal Server Error");
        assert!(logs_contain("connection reset by peer"));
    }

    #[tokio::test]
    async fn timeouts_are_server_errors_not_missing_tokens() {
        let registry = MockRegistry::with_sensors(3);
        registry.stall_reads_for(2);
        let (status, _, body) = get(registry, "/api/metadata/2").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Internal Server Error");
    }
}
