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
use axum::Json;
use serde::Serialize;

use super::HandlerState;
use crate::error::HandlerError;
use crate::store::{SensorList, SensorStore};
use crate::sync::snapshot;

/// The dashboard's read model.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorsResponse {
    sensors: SensorList,
    /// Set when the most recent snapshot failed; `sensors` is then the last
    /// good list.
    #[serde(skip_serializing_if = "Option::is_none")]
    last_error: Option<String>,
}

/// Handles sensor list requests
///
/// Returns the current in-memory sensor list, no chain call involved.
pub async fn handle_sensors(
    State(state): State<Arc<HandlerState>>,
) -> Json<SensorsResponse> {
    Json(SensorsResponse {
        sensors: state.store.sensors(),
        last_error: state.store.last_error(),
    })
}

/// Outcome of a manual refresh.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    count: usize,
}

/// Handles manual refresh requests
///
/// Re-reads the whole registry and replaces the list.
pub async fn handle_refresh(
    State(state): State<Arc<HandlerState>>,
) -> Result<Json<RefreshResponse>, HandlerError> {
    let count =
        snapshot::refresh(state.registry.as_ref(), &state.store, &state.metrics)
            .await?;
    Ok(Json(RefreshResponse { count }))
}
