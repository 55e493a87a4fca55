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

//! # Token Metadata 🏷️
//!
//! The ERC-721 metadata document served for every sensor token, in the
//! OpenSea attribute format.

use ethers::types::Address;
use serde::Serialize;

use crate::sensor::{serialize_checksummed, SensorData};

/// Description shared by every sensor token.
pub const TOKEN_DESCRIPTION: &str =
    "A dynamic NFT representing a real-world air quality sensor in the Auracle network.";

/// Upper bound of the reputation and uptime scores.
pub const MAX_SCORE: u64 = 100;

/// The metadata document of one sensor token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenMetadata {
    /// `Auracle Sensor #<id>`.
    pub name: String,
    /// Fixed collection description.
    pub description: String,
    /// Static image URL.
    pub image: String,
    /// Current token owner.
    #[serde(serialize_with = "serialize_checksummed")]
    pub owner: Address,
    /// Sensor traits, in a fixed order.
    pub attributes: Vec<Attribute>,
}

/// One entry of the `attributes` array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attribute {
    /// Rendering hint, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_type: Option<DisplayType>,
    /// Attribute name.
    pub trait_type: &'static str,
    /// Attribute value.
    pub value: AttributeValue,
    /// Upper bound, for scores.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_value: Option<u64>,
}

/// How marketplaces should render a numeric attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayType {
    /// A plain number.
    Number,
    /// Unix seconds.
    Date,
}

/// A string or integer attribute value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum AttributeValue {
    /// A string value.
    Text(String),
    /// An integer value.
    Integer(u64),
}

impl Attribute {
    fn text(trait_type: &'static str, value: String) -> Self {
        Self {
            display_type: None,
            trait_type,
            value: AttributeValue::Text(value),
            max_value: None,
        }
    }

    fn score(trait_type: &'static str, value: u64) -> Self {
        Self {
            display_type: None,
            trait_type,
            value: AttributeValue::Integer(value),
            max_value: Some(MAX_SCORE),
        }
    }

    fn displayed(
        display_type: DisplayType,
        trait_type: &'static str,
        value: u64,
    ) -> Self {
        Self {
            display_type: Some(display_type),
            trait_type,
            value: AttributeValue::Integer(value),
            max_value: None,
        }
    }
}

impl TokenMetadata {
    /// Renders the document for token `id` from one paired read.
    pub fn render(id: u64, owner: Address, data: SensorData, image: &str) -> Self {
        Self {
            name: format!("Auracle Sensor #{id}"),
            description: TOKEN_DESCRIPTION.to_string(),
            image: image.to_string(),
            owner,
            attributes: vec![
                Attribute::text("Latitude", data.latitude),
                Attribute::text("Longitude", data.longitude),
                Attribute::score("Reputation", data.reputation_score),
                Attribute::score("Uptime Score", data.uptime_score),
                Attribute::displayed(
                    DisplayType::Number,
                    "Last PM2.5 Value",
                    data.last_pm25_value,
                ),
                Attribute::displayed(
                    DisplayType::Date,
                    "Last Updated",
                    data.last_updated,
                ),
            ],
        }
    }
}
