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

//! # Administration 🔑
//!
//! Owner-only maintenance of the registry contract.

use crate::probe;
use crate::registry::{Confirmation, SensorRegistryWriter};
use crate::{Error, Result};

/// Points the contract's token URIs at `uri`.
///
/// Checks `owner()` first and refuses to send if the signer is not the
/// owner. If the owner cannot be read the transaction is sent anyway and the
/// contract has the last word.
#[tracing::instrument(skip(writer), fields(signer = ?writer.signer()))]
pub async fn set_base_uri<W>(writer: &W, uri: &str) -> Result<Confirmation>
where
    W: SensorRegistryWriter + ?Sized,
{
    url::Url::parse(uri)?;
    let signer = writer.signer();
    match writer.contract_owner().await {
        Ok(owner) if owner != signer => {
            return Err(Error::NotContractOwner { signer, owner });
        }
        Ok(_) => {}
        Err(e) => {
            tracing::warn!(error = %e, "Could not read the contract owner, sending anyway");
        }
    }

    let confirmation = writer.set_base_uri(uri.to_string()).await?;
    tracing::event!(
        target: probe::TARGET,
        tracing::Level::DEBUG,
        kind = %probe::Kind::Write,
        call = "setBaseURI",
        %uri,
        tx_hash = ?confirmation.tx_hash,
    );
    Ok(confirmation)
}
