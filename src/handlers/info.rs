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

use super::{HandlerState, NodeInfo};

/// Handles node info requests
///
/// Returns the network and contract the node is bound to. Never includes
/// secrets.
pub async fn handle_node_info(
    State(state): State<Arc<HandlerState>>,
) -> Json<NodeInfo> {
    Json(state.info.clone())
}
