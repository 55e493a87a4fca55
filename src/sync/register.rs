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

use crate::metric::Metrics;
use crate::probe;
use crate::registry::{Confirmation, SensorRegistryWriter};
use crate::store::SensorStore;
use crate::{Error, Result};

/// Result of a successful registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    /// The mined `registerSensor` transaction.
    pub confirmation: Confirmation,
    /// Number of sensors after the follow-up refresh, if it succeeded.
    pub sensors: Option<usize>,
    /// Why the follow-up refresh failed, if it did. The sensor is minted
    /// either way.
    pub refresh_error: Option<String>,
}

/// Checks that the coordinates are finite degrees within range.
pub fn validate_coordinates(lat: f64, lng: f64) -> Result<()> {
    let valid = lat.is_finite()
        && lng.is_finite()
        && (-90.0..=90.0).contains(&lat)
        && (-180.0..=180.0).contains(&lng);
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidCoordinates { lat, lng })
    }
}

/// Registers a new sensor owned by the signer and refreshes the list.
///
/// Invalid coordinates are rejected before anything is sent. A rejected or
/// dropped transaction leaves the store untouched and is never retried.
#[tracing::instrument(skip(writer, store, metrics))]
pub async fn register_sensor<W, S>(
    writer: &W,
    store: &S,
    metrics: &Metrics,
    lat: f64,
    lng: f64,
) -> Result<Registration>
where
    W: SensorRegistryWriter + ?Sized,
    S: SensorStore,
{
    validate_coordinates(lat, lng)?;

    let confirmation = writer
        .register_sensor(lat.to_string(), lng.to_string())
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Sensor registration failed");
            e
        })?;
    metrics.sensors_registered.inc();
    tracing::event!(
        target: probe::TARGET,
        tracing::Level::DEBUG,
        kind = %probe::Kind::Write,
        call = "registerSensor",
        tx_hash = ?confirmation.tx_hash,
        owner = ?writer.signer(),
    );

    let (sensors, refresh_error) =
        match super::snapshot::refresh(writer, store, metrics).await {
            Ok(count) => (Some(count), None),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "Sensor registered but the list could not be refreshed"
                );
                (None, Some(e.to_string()))
            }
        };
    Ok(Registration {
        confirmation,
        sensors,
        refresh_error,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::registry::SensorRegistry;
    use crate::store::InMemoryStore;
    use crate::sync::snapshot::refresh;
    use crate::test_utils::MockRegistry;

    #[test]
    fn coordinates_are_range_checked() {
        assert!(validate_coordinates(-6.2088, 106.8456).is_ok());
        assert!(validate_coordinates(90.0, -180.0).is_ok());
        assert!(validate_coordinates(90.5, 0.0).is_err());
        assert!(validate_coordinates(0.0, 180.01).is_err());
        assert!(validate_coordinates(f64::NAN, 0.0).is_err());
        assert!(validate_coordinates(0.0, f64::INFINITY).is_err());
    }

    #[tokio::test]
    async fn registration_adds_exactly_one_sensor_owned_by_signer() {
        let registry = MockRegistry::with_sensors(4);
        let store = InMemoryStore::new();
        let metrics = Metrics::new().unwrap();
        refresh(&registry, &store, &metrics).await.unwrap();

        let outcome =
            register_sensor(&registry, &store, &metrics, -6.2088, 106.8456)
                .await
                .unwrap();
        assert_eq!(outcome.sensors, Some(5));
        assert_eq!(outcome.refresh_error, None);

        let sensors = store.sensors();
        assert_eq!(sensors.len(), 5);
        let newest = &sensors[4];
        assert_eq!(newest.id, 4);
        assert_eq!(newest.owner, registry.signer());
        assert_eq!(newest.latitude, "-6.2088");
        assert_eq!(newest.longitude, "106.8456");
        let owned = sensors
            .iter()
            .filter(|s| s.owner == registry.signer())
            .count();
        assert_eq!(owned, 1);
    }

    #[tokio::test]
    async fn invalid_coordinates_never_reach_the_chain() {
        let registry = MockRegistry::with_sensors(1);
        let store = InMemoryStore::new();
        let metrics = Metrics::new().unwrap();
        let err = register_sensor(&registry, &store, &metrics, 120.0, 0.0)
            .await
            .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(registry.total_supply().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn rejected_write_leaves_the_list_untouched() {
        let registry = MockRegistry::with_sensors(2);
        let store = InMemoryStore::new();
        let metrics = Metrics::new().unwrap();
        refresh(&registry, &store, &metrics).await.unwrap();
        let before = store.sensors();

        registry.reject_writes();
        let err = register_sensor(&registry, &store, &metrics, 1.0, 2.0)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::WriteRejected { .. }));
        assert!(Arc::ptr_eq(&before, &store.sensors()));
        assert_eq!(metrics.sensors_registered.get() as u64, 0);
    }

    #[tokio::test]
    async fn failed_refresh_is_reported_not_fatal() {
        let registry = MockRegistry::with_sensors(2);
        let store = InMemoryStore::new();
        let metrics = Metrics::new().unwrap();
        registry.fail_reads_for(0);

        let outcome = register_sensor(&registry, &store, &metrics, 1.0, 2.0)
            .await
            .unwrap();
        assert_eq!(outcome.sensors, None);
        assert!(outcome.refresh_error.is_some());
        assert_eq!(registry.total_supply().await.unwrap(), 3);
    }
}
