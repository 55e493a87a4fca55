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

//! # Reading Simulator 🌫️
//!
//! Stands in for a physical sensor: periodically submits a random PM2.5
//! reading for the first sensor owned by the signing account.

use rand::Rng;

use crate::config::SimulatorConfig;
use crate::context::Shutdown;
use crate::metric::Metrics;
use crate::probe;
use crate::registry::SensorRegistryWriter;
use crate::{Error, Result};

/// A random reading in `[min, max)`.
pub fn random_pm25(config: &SimulatorConfig) -> u64 {
    rand::thread_rng().gen_range(config.min_pm25..config.max_pm25)
}

/// Submits readings until `shutdown` fires.
///
/// Fails with [`Error::NoSensorsForOwner`] if the signer owns no sensor. A
/// failed submission is logged and the next tick is awaited as usual.
#[tracing::instrument(skip_all, fields(signer = ?writer.signer()))]
pub async fn run_simulator<W>(
    writer: &W,
    config: &SimulatorConfig,
    metrics: &Metrics,
    mut shutdown: Shutdown,
) -> Result<()>
where
    W: SensorRegistryWriter + ?Sized,
{
    let owner = writer.signer();
    let sensors = writer.sensors_by_owner(owner).await?;
    let sensor_id = *sensors.first().ok_or(Error::NoSensorsForOwner(owner))?;
    tracing::info!(
        sensor_id,
        owned = sensors.len(),
        interval = ?config.interval(),
        "Simulating readings"
    );

    let mut interval = tokio::time::interval(config.interval());
    // the first tick completes immediately.
    interval.tick().await;
    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                tracing::info!("Simulator stopped");
                return Ok(());
            }
            _ = interval.tick() => {
                let pm25 = random_pm25(config);
                match writer.submit_data(sensor_id, pm25).await {
                    Ok(confirmation) => {
                        metrics.readings_submitted.inc();
                        tracing::event!(
                            target: probe::TARGET,
                            tracing::Level::DEBUG,
                            kind = %probe::Kind::Write,
                            call = "submitData",
                            sensor_id,
                            pm25,
                            tx_hash = ?confirmation.tx_hash,
                        );
                        tracing::info!(sensor_id, pm25, "Reading submitted");
                    }
                    Err(e) => {
                        tracing::error!(sensor_id, pm25, error = %e, "Reading submission failed");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use ethers::types::Address;
    use tokio::sync::broadcast;

    use super::*;
    use crate::test_utils::MockRegistry;

    fn config() -> SimulatorConfig {
        SimulatorConfig {
            interval: 1_000,
            min_pm25: 5,
            max_pm25: 50,
        }
    }

    #[test]
    fn readings_stay_in_range() {
        let config = config();
        for _ in 0..1_000 {
            let v = random_pm25(&config);
            assert!((5..50).contains(&v));
        }
    }

    #[tokio::test]
    async fn signer_without_sensors_is_an_error() {
        let registry = MockRegistry::with_sensors(2);
        let (_tx, rx) = broadcast::channel(1);
        let metrics = Metrics::new().unwrap();
        let err = run_simulator(&registry, &config(), &metrics, Shutdown::new(rx))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NoSensorsForOwner(_)));
    }

    #[tokio::test(start_paused = true)]
    #[tracing_test::traced_test]
    async fn submits_on_every_tick_until_shutdown() {
        let registry = std::sync::Arc::new(MockRegistry::with_sensors(2));
        let first = registry.mint_default(registry.signer());
        registry.mint_default(registry.signer());
        registry.mint_default(Address::from_low_u64_be(7));

        let (tx, rx) = broadcast::channel(1);
        let metrics = Metrics::new().unwrap();
        let task = {
            let registry = registry.clone();
            let metrics = metrics.clone();
            tokio::spawn(async move {
                run_simulator(registry.as_ref(), &config(), &metrics, Shutdown::new(rx))
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(3_500)).await;
        tx.send(()).unwrap();
        task.await.unwrap().unwrap();

        let submissions = registry.submissions();
        assert!(submissions.len() >= 3, "{submissions:?}");
        assert!(submissions.iter().all(|(id, pm25)| *id == first && (5..50).contains(pm25)));
        assert_eq!(metrics.readings_submitted.get() as usize, submissions.len());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_submissions_do_not_stop_the_loop() {
        let registry = std::sync::Arc::new(MockRegistry::with_sensors(0));
        registry.mint_default(registry.signer());
        registry.reject_writes();

        let (tx, rx) = broadcast::channel(1);
        let metrics = Metrics::new().unwrap();
        let task = {
            let registry = registry.clone();
            let metrics = metrics.clone();
            tokio::spawn(async move {
                run_simulator(registry.as_ref(), &config(), &metrics, Shutdown::new(rx))
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(2_500)).await;
        assert!(!task.is_finished());
        tx.send(()).unwrap();
        assert!(task.await.unwrap().is_ok());
        assert!(registry.submissions().is_empty());
    }
}
