// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Hold-token issuance metadata.
//!
//! Deposit-created issuances carry the rate they lock in `additional_info`.
//! The ledger stores the encoded record as an opaque blob; the settlement leg
//! reads it back to recover the locked rate.

use crate::base::TxHash;
use crate::error::SwapError;
use crate::rate::ExchangeRate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuanceMetadata {
    pub ticker: String,
    pub name: String,
    pub desc: String,
    pub asset_class: String,
    pub asset_subclass: String,
    pub issuer_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_info: Option<RateLock>,
}

/// Rate locked at deposit time and the deposit it was locked for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLock {
    pub rate: u64,
    pub scale: u32,
    pub txn_hash: TxHash,
}

impl IssuanceMetadata {
    /// Metadata for the hold token issued against deposit `origin`.
    pub fn hold_token(rate: ExchangeRate, origin: &TxHash) -> Self {
        Self {
            ticker: "HOLDT".to_string(),
            name: "XRP USD hold token".to_string(),
            desc: "Holds a fixed exchange rate between XRP and USD for a specified period"
                .to_string(),
            asset_class: "defi".to_string(),
            asset_subclass: "other".to_string(),
            issuer_name: "unmined.ca".to_string(),
            additional_info: Some(RateLock {
                rate: rate.value(),
                scale: rate.scale(),
                txn_hash: origin.clone(),
            }),
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, SwapError> {
        serde_json::to_vec(self).map_err(|e| SwapError::Metadata(e.to_string()))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, SwapError> {
        serde_json::from_slice(bytes).map_err(|e| SwapError::Metadata(e.to_string()))
    }

    /// Rate locked by the deposit that created this issuance.
    pub fn locked_rate(&self) -> Result<ExchangeRate, SwapError> {
        let lock = self
            .additional_info
            .as_ref()
            .ok_or_else(|| SwapError::Metadata("issuance carries no rate lock".to_string()))?;
        ExchangeRate::with_scale(lock.rate, lock.scale).ok_or_else(|| {
            SwapError::Metadata(format!(
                "invalid locked rate {} at scale {}",
                lock.rate, lock.scale
            ))
        })
    }
}
