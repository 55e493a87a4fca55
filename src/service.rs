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

//! # Node Service Module 🕸️
//!
//! A module for starting the HTTP server and the long-running sync tasks.
//!
//! ## Overview
//!
//! Services are tasks which the node constantly runs throughout its lifetime.
//! The sync services keep the sensor list up to date with the registry
//! contract; the web services expose it together with the token metadata.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::context::AuracleContext;
use crate::handlers::info::handle_node_info;
use crate::handlers::metadata::handle_sensor_metadata;
use crate::handlers::metric::handle_metric_info;
use crate::handlers::sensors::{handle_refresh, handle_sensors};
use crate::handlers::{HandlerState, NodeInfo};
use crate::probe;
use crate::registry::SensorRegistry;
use crate::sync::listener::{ListenerHandle, PatchListener};
use crate::sync::snapshot;

/// Builds the shared handler state from the context.
pub fn handler_state(ctx: &AuracleContext) -> crate::Result<Arc<HandlerState>> {
    let registry: Arc<dyn SensorRegistry> = Arc::new(ctx.registry()?);
    Ok(Arc::new(HandlerState {
        registry,
        store: ctx.store.clone(),
        metrics: ctx.metrics.clone(),
        image: ctx.config.metadata.image.clone(),
        info: NodeInfo {
            chain_name: ctx.config.chain.name.clone(),
            chain_id: ctx.config.chain.chain_id,
            contract: ctx.config.contract.address,
            signer_configured: ctx.config.chain.private_key.is_some(),
        },
    }))
}

/// Routes every endpoint of the node.
pub fn build_router(state: Arc<HandlerState>) -> Router {
    let api = Router::new()
        .route("/info", get(handle_node_info))
        .route("/metrics", get(handle_metric_info))
        .route("/sensors", get(handle_sensors))
        .route("/sensors/refresh", post(handle_refresh));

    Router::new()
        .route("/api/metadata/:id", get(handle_sensor_metadata))
        .nest("/api/v1", api)
        .layer(CorsLayer::new().allow_origin(Any))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Sets up the HTTP server. Resolves once the shutdown signal was received
/// and every in-flight request finished.
///
/// # Arguments
///
/// * `ctx` - AuracleContext reference that holds the configuration
/// * `state` - The shared handler state
pub async fn build_web_services(
    ctx: AuracleContext,
    state: Arc<HandlerState>,
) -> crate::Result<()> {
    let socket_addr = SocketAddr::new([0, 0, 0, 0].into(), ctx.config.port);
    let app = build_router(state).into_make_service();
    let mut shutdown = ctx.shutdown_signal();

    tracing::info!("Starting the server on {}", socket_addr);
    axum::Server::bind(&socket_addr)
        .serve(app)
        .with_graceful_shutdown(async move { shutdown.recv().await })
        .await?;
    Ok(())
}

/// Starts the sync services: an initial snapshot, then the live patch
/// listener.
///
/// A failing initial snapshot is logged and recorded, it does not prevent
/// the listener from starting. The listener lives as long as the returned
/// handle.
pub async fn ignite(
    ctx: &AuracleContext,
    state: &HandlerState,
) -> crate::Result<ListenerHandle> {
    tracing::trace!(
        "Node configuration: {}",
        serde_json::to_string_pretty(&ctx.config)?
    );
    match snapshot::refresh(state.registry.as_ref(), &state.store, &state.metrics)
        .await
    {
        Ok(count) => tracing::info!(count, "Loaded sensor registry"),
        Err(e) => tracing::warn!(
            error = %e,
            "Initial snapshot failed, serving an empty list until the next refresh"
        ),
    }
    let listener = PatchListener::new(state.store.clone())
        .with_metrics(state.metrics.clone())
        .with_resync(state.registry.clone(), state.metrics.clone())
        .spawn(Box::new(ctx.notification_source()));
    tracing::event!(
        target: probe::TARGET,
        tracing::Level::DEBUG,
        kind = %probe::Kind::Lifecycle,
        started = true,
    );
    Ok(listener)
}
