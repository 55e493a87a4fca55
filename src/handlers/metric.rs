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

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;

use super::HandlerState;
use crate::error::HandlerError;

/// Handles metric requests
///
/// Returns the node metrics in the prometheus text format.
pub async fn handle_metric_info(
    State(state): State<Arc<HandlerState>>,
) -> Result<impl IntoResponse, HandlerError> {
    let metrics = state.metrics.gather_metrics().map_err(|e| {
        tracing::error!(error = %e, "Failed to gather metrics");
        HandlerError(
            StatusCode::INTERNAL_SERVER_ERROR,
            String::from("Internal Server Error"),
        )
    })?;
    Ok((
        [(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)],
        metrics,
    ))
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    use crate::service::build_router;
    use crate::test_utils::{test_handler_state, MockRegistry};

    #[tokio::test]
    async fn metrics_and_info_are_served() {
        let state = test_handler_state(MockRegistry::with_sensors(1));
        state.metrics.metadata_requests.inc();
        let app = build_router(state);

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/api/v1/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.contains("metadata_requests 1"));

        let response = app
            .oneshot(Request::builder().uri("/api/v1/info").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
        let info: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(info["chainId"], 2484);
        assert_eq!(info["signerConfigured"], false);
        assert!(info.get("privateKey").is_none());
    }
}
