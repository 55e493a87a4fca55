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

//! # Sensor Records 🌫️
//!
//! The in-memory shape of a registered air-quality sensor, the raw contract
//! struct it is built from, and the `DataSubmitted` push notification.

use ethers::abi::{self, ParamType, Token};
use ethers::types::{Address, Log, H256, U256};
use ethers::utils::{keccak256, to_checksum};
use serde::{Serialize, Serializer};

use crate::{Error, Result};

/// Solidity signature of the only event the listener cares about.
pub const DATA_SUBMITTED_SIGNATURE: &str = "DataSubmitted(uint256,uint256)";

/// The struct returned by the contract's `sensorData(id)` getter.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SensorData {
    /// Latitude as registered, a decimal string.
    pub latitude: String,
    /// Longitude as registered, a decimal string.
    pub longitude: String,
    /// Reputation score, 0..=100.
    pub reputation_score: u64,
    /// Uptime score, 0..=100.
    pub uptime_score: u64,
    /// Last submitted PM2.5 reading.
    pub last_pm25_value: u64,
    /// Unix seconds of the last submission.
    pub last_updated: u64,
}

impl SensorData {
    /// Builds the struct from the raw ABI tuple, rejecting values that do not fit.
    pub fn from_raw(
        (latitude, longitude, reputation, uptime, pm25, updated): (
            String,
            String,
            U256,
            U256,
            U256,
            U256,
        ),
    ) -> Result<Self> {
        Ok(Self {
            latitude,
            longitude,
            reputation_score: u256_to_u64(reputation, "reputationScore")?,
            uptime_score: u256_to_u64(uptime, "uptimeScore")?,
            last_pm25_value: u256_to_u64(pm25, "lastPm25Value")?,
            last_updated: u256_to_u64(updated, "lastUpdated")?,
        })
    }
}

/// One registered sensor, as shown on the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorRecord {
    /// Token index, assigned by the contract at mint time.
    pub id: u64,
    /// Current token owner.
    #[serde(serialize_with = "serialize_checksummed")]
    pub owner: Address,
    /// Latitude as registered.
    pub latitude: String,
    /// Longitude as registered.
    pub longitude: String,
    /// Last PM2.5 reading.
    pub last_pm25_value: u64,
    /// Unix seconds of the last reading.
    pub last_updated: u64,
}

impl SensorRecord {
    /// Assembles a record from one paired `(ownerOf, sensorData)` read.
    pub fn new(id: u64, owner: Address, data: SensorData) -> Self {
        Self {
            id,
            owner,
            latitude: data.latitude,
            longitude: data.longitude,
            last_pm25_value: data.last_pm25_value,
            last_updated: data.last_updated,
        }
    }

    /// Returns a copy of this record with the patch applied.
    pub fn patched(&self, patch: SensorPatch) -> Self {
        Self {
            last_pm25_value: patch.last_pm25_value,
            last_updated: patch.last_updated,
            ..self.clone()
        }
    }
}

/// The fields a push notification is allowed to change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorPatch {
    /// New PM2.5 reading.
    pub last_pm25_value: u64,
    /// Local wall-clock seconds at which the reading was observed.
    pub last_updated: u64,
}

/// A decoded `DataSubmitted(sensorId, pm25Value)` log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataSubmitted {
    /// The sensor the reading belongs to.
    pub sensor_id: u64,
    /// The submitted PM2.5 value.
    pub pm25_value: u64,
}

impl DataSubmitted {
    /// `topic0` of the event.
    pub fn signature() -> H256 {
        H256::from(keccak256(DATA_SUBMITTED_SIGNATURE.as_bytes()))
    }
}

impl TryFrom<&Log> for DataSubmitted {
    type Error = Error;

    /// Decodes the log, accepting both the indexed and the non-indexed
    /// `sensorId` layout.
    fn try_from(log: &Log) -> Result<Self> {
        match log.topics.first() {
            Some(topic) if *topic == Self::signature() => {}
            other => {
                return Err(Error::MalformedEvent(format!(
                    "unexpected topic0 {other:?}"
                )))
            }
        }
        let (sensor_id, pm25_value) = match log.topics.len() {
            2 => {
                let sensor_id = U256::from_big_endian(log.topics[1].as_bytes());
                let pm25 = decode_uints(&log.data, 1)?;
                (sensor_id, pm25[0])
            }
            1 => {
                let values = decode_uints(&log.data, 2)?;
                (values[0], values[1])
            }
            n => {
                return Err(Error::MalformedEvent(format!(
                    "expected 1 or 2 topics, got {n}"
                )))
            }
        };
        let sensor_id = u256_to_u64(sensor_id, "sensorId")
            .map_err(|e| Error::MalformedEvent(e.to_string()))?;
        let pm25_value = u256_to_u64(pm25_value, "pm25Value")
            .map_err(|e| Error::MalformedEvent(e.to_string()))?;
        Ok(Self {
            sensor_id,
            pm25_value,
        })
    }
}

fn decode_uints(data: &[u8], count: usize) -> Result<Vec<U256>> {
    let types = vec![ParamType::Uint(256); count];
    let tokens = abi::decode(&types, data)
        .map_err(|e| Error::MalformedEvent(e.to_string()))?;
    tokens
        .into_iter()
        .map(|t| match t {
            Token::Uint(v) => Ok(v),
            other => Err(Error::MalformedEvent(format!(
                "expected uint256, got {other:?}"
            ))),
        })
        .collect()
}

/// Narrows an on-chain `uint256` to `u64`.
pub(crate) fn u256_to_u64(value: U256, field: &'static str) -> Result<u64> {
    if value.bits() > 64 {
        return Err(Error::ValueOverflow { field });
    }
    Ok(value.low_u64())
}

/// Serializes an address in its EIP-55 checksummed form.
pub(crate) fn serialize_checksummed<S>(
    address: &Address,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&to_checksum(address, None))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::types::Bytes;

    fn log(topics: Vec<H256>, data: Vec<Token>) -> Log {
        Log {
            topics,
            data: Bytes::from(abi::encode(&data)),
            ..Default::default()
        }
    }

    fn uint(v: u64) -> Token {
        Token::Uint(U256::from(v))
    }

    #[test]
    fn decodes_indexed_sensor_id() {
        let id_topic = H256::from_low_u64_be(7);
        let l = log(vec![DataSubmitted::signature(), id_topic], vec![uint(42)]);
        let ev = DataSubmitted::try_from(&l).unwrap();
        assert_eq!(
            ev,
            DataSubmitted {
                sensor_id: 7,
                pm25_value: 42
            }
        );
    }

    #[test]
    fn decodes_non_indexed_layout() {
        let l = log(vec![DataSubmitted::signature()], vec![uint(3), uint(18)]);
        let ev = DataSubmitted::try_from(&l).unwrap();
        assert_eq!(ev.sensor_id, 3);
        assert_eq!(ev.pm25_value, 18);
    }

    #[test]
    fn rejects_foreign_and_truncated_logs() {
        let foreign = log(vec![H256::zero()], vec![uint(1), uint(2)]);
        assert!(matches!(
            DataSubmitted::try_from(&foreign),
            Err(Error::MalformedEvent(_))
        ));

        let truncated = Log {
            topics: vec![DataSubmitted::signature()],
            data: Bytes::from(vec![0u8; 16]),
            ..Default::default()
        };
        assert!(DataSubmitted::try_from(&truncated).is_err());
    }

    #[test]
    fn oversized_values_are_rejected() {
        let l = log(
            vec![DataSubmitted::signature()],
            vec![Token::Uint(U256::MAX), uint(1)],
        );
        assert!(DataSubmitted::try_from(&l).is_err());
        assert!(matches!(
            u256_to_u64(U256::from(u64::MAX) + 1, "x"),
            Err(Error::ValueOverflow { field: "x" })
        ));
        assert_eq!(u256_to_u64(U256::from(u64::MAX), "x").unwrap(), u64::MAX);
    }

    #[test]
    fn records_serialize_camel_case_with_checksummed_owner() {
        let owner: Address = "0x60ac7e3e0e7d498fca1d7f526bb21f90d1e43d5f"
            .parse()
            .unwrap();
        let record = SensorRecord::new(
            0,
            owner,
            SensorData {
                latitude: "-6.2088".into(),
                longitude: "106.8456".into(),
                reputation_score: 100,
                uptime_score: 100,
                last_pm25_value: 12,
                last_updated: 1_700_000_000,
            },
        );
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["owner"], "0x60aC7E3E0e7D498fCa1d7F526BB21F90d1E43D5F");
        assert_eq!(json["lastPm25Value"], 12);
        assert_eq!(json["latitude"], "-6.2088");
    }

    #[test]
    fn patch_only_touches_reading_fields() {
        let record = SensorRecord::new(1, Address::zero(), SensorData::default());
        let patched = record.patched(SensorPatch {
            last_pm25_value: 30,
            last_updated: 99,
        });
        assert_eq!(patched.id, record.id);
        assert_eq!(patched.latitude, record.latitude);
        assert_eq!(patched.last_pm25_value, 30);
        assert_eq!(patched.last_updated, 99);
    }
}
