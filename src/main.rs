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

//! Auracle Node Binary.
#![deny(unsafe_code)]
#![warn(missing_docs)]

use anyhow::Context;
use structopt::StructOpt;
use tokio::signal::unix;

use auracle_node::cli::{load_config, setup_logger, Command, Opts};
use auracle_node::context::AuracleContext;
use auracle_node::registry::SensorRegistryWriter;
use auracle_node::store::SensorStore;
use auracle_node::{admin, probe, service, simulator, sync};

/// The main entry point for the node.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Opts::from_args();
    setup_logger(args.verbose)?;
    match dotenv::dotenv() {
        Ok(_) => {
            tracing::trace!("Loaded .env file");
        }
        Err(e) => {
            tracing::warn!("Failed to load .env file: {}", e);
        }
    }

    // The configuration is validated and configured from the given directory
    let config = load_config(args.config_dir.clone())?;

    // The AuracleContext takes a configuration, and populates objects that are needed
    // throughout the lifetime of the node. Items such as wallets and providers, as well
    // as a convenient place to access the configuration.
    let ctx = AuracleContext::new(config)?;

    match args.command {
        Command::Serve => serve(ctx).await,
        Command::Sensors => print_sensors(&ctx).await,
        Command::Register { lat, lng } => register(&ctx, lat, lng).await,
        Command::Simulate => simulate(&ctx).await,
        Command::SetBaseUri { uri } => {
            let uri = uri.unwrap_or_else(|| ctx.config.metadata.base_uri.clone());
            let writer = ctx.signing_registry()?;
            let confirmation = admin::set_base_uri(&writer, &uri)
                .await
                .context("setting the base URI")?;
            tracing::info!(%uri, tx_hash = ?confirmation.tx_hash, "Base URI updated");
            print_tx_link(&ctx, confirmation.tx_hash);
            Ok(())
        }
    }
}

async fn serve(ctx: AuracleContext) -> anyhow::Result<()> {
    let state = service::handler_state(&ctx)?;
    // start the server.
    let server_handle =
        tokio::spawn(service::build_web_services(ctx.clone(), state.clone()));
    // initial snapshot, then the live listener on a background task.
    let listener = service::ignite(&ctx, &state).await?;

    wait_for_signal().await?;
    tracing::event!(
        target: probe::TARGET,
        tracing::Level::DEBUG,
        kind = %probe::Kind::Lifecycle,
        shutdown = true
    );
    tracing::warn!("Shutting down...");
    // send shutdown signal to all of the application.
    ctx.shutdown();
    listener.unsubscribe().await;
    match server_handle.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!(error = %e, "Server stopped with an error"),
        Err(e) => tracing::error!(error = %e, "Server task failed"),
    }
    tracing::info!("Clean Exit ..");
    Ok(())
}

async fn print_sensors(ctx: &AuracleContext) -> anyhow::Result<()> {
    let registry = ctx.registry()?;
    let sensors = sync::load_snapshot(&registry)
        .await
        .context("reading the sensor registry")?;
    println!("{}", serde_json::to_string_pretty(&sensors)?);
    Ok(())
}

async fn register(ctx: &AuracleContext, lat: f64, lng: f64) -> anyhow::Result<()> {
    let writer = ctx.signing_registry()?;
    let outcome =
        sync::register_sensor(&writer, &ctx.store, &ctx.metrics, lat, lng)
            .await
            .context("registering the sensor")?;
    tracing::info!(
        tx_hash = ?outcome.confirmation.tx_hash,
        block = ?outcome.confirmation.block_number,
        owner = ?writer.signer(),
        "Sensor registered"
    );
    print_tx_link(ctx, outcome.confirmation.tx_hash);
    match outcome.refresh_error {
        None => println!("{}", serde_json::to_string_pretty(&*ctx.store.sensors())?),
        Some(e) => tracing::warn!(
            error = %e,
            "Run `auracle sensors` to see the new sensor once the node is reachable"
        ),
    }
    Ok(())
}

async fn simulate(ctx: &AuracleContext) -> anyhow::Result<()> {
    let writer = ctx.signing_registry()?;
    let simulation = simulator::run_simulator(
        &writer,
        &ctx.config.simulator,
        &ctx.metrics,
        ctx.shutdown_signal(),
    );
    tokio::pin!(simulation);
    tokio::select! {
        result = &mut simulation => result?,
        signal = wait_for_signal() => {
            signal?;
            ctx.shutdown();
            (&mut simulation).await?;
        }
    }
    Ok(())
}

fn print_tx_link(ctx: &AuracleContext, tx_hash: ethers::types::TxHash) {
    if let Some(link) = ctx.explorer_tx_url(tx_hash) {
        tracing::info!("View on explorer: {}", link);
    }
}

/// Resolves on the first SIGINT, SIGTERM or SIGQUIT.
async fn wait_for_signal() -> anyhow::Result<()> {
    let mut ctrlc_signal = unix::signal(unix::SignalKind::interrupt())?;
    let mut termination_signal = unix::signal(unix::SignalKind::terminate())?;
    let mut quit_signal = unix::signal(unix::SignalKind::quit())?;
    tokio::select! {
        _ = ctrlc_signal.recv() => {
            tracing::warn!("Interrupted (Ctrl+C) ...");
        },
        _ = termination_signal.recv() => {
            tracing::warn!("Got Terminate signal ...");
        },
        _ = quit_signal.recv() => {
            tracing::warn!("Quitting ...");
        },
    }
    Ok(())
}
