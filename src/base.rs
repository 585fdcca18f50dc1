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

//! Core identifier types for accounts, transactions and hold issuances.

use crate::error::LedgerError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Classic ledger address (base58check, ripple alphabet).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(transparent)]
pub struct AccountId(pub String);

impl AccountId {
    /// Version byte prefixed to account ids before base58check encoding.
    const VERSION: u8 = 0x00;

    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Decodes the classic address into its 20-byte account id.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Malformed`] if the address is not valid
    /// base58check or does not carry a 20-byte payload.
    pub fn decode(&self) -> Result<[u8; 20], LedgerError> {
        let payload = bs58::decode(&self.0)
            .with_alphabet(bs58::Alphabet::RIPPLE)
            .with_check(Some(Self::VERSION))
            .into_vec()
            .map_err(|e| LedgerError::Malformed(format!("address {}: {e}", self.0)))?;

        // The decoded payload still carries the version byte.
        match payload.as_slice() {
            [Self::VERSION, rest @ ..] => <[u8; 20]>::try_from(rest).map_err(|_| {
                LedgerError::Malformed(format!(
                    "address {}: expected 20 account bytes, got {}",
                    self.0,
                    rest.len()
                ))
            }),
            _ => Err(LedgerError::Malformed(format!(
                "address {}: missing version byte",
                self.0
            ))),
        }
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Compact transaction identifier, the deduplication key for ledger events.
///
/// Globally unique and orderable within an account.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(transparent)]
pub struct TransactionId(pub String);

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Transaction hash, used to re-query a transaction and recorded in issuance metadata.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(transparent)]
pub struct TxHash(pub String);

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a hold-token issuance.
///
/// 48 uppercase hex characters: the creating transaction's sequence number
/// followed by the issuer's 20-byte account id, left-padded with `0`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(transparent)]
pub struct IssuanceId(pub String);

impl IssuanceId {
    pub const LEN: usize = 48;

    /// Derives the issuance id created by `account` at `sequence`.
    pub fn derive(sequence: u32, account: &[u8; 20]) -> Self {
        let raw = format!("{sequence:X}{}", hex::encode_upper(account));
        Self(format!("{raw:0>width$}", width = Self::LEN))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the trailing account bytes name `account` as issuer.
    pub fn is_issued_by(&self, account: &[u8; 20]) -> bool {
        self.0.len() == Self::LEN && self.0.ends_with(&hex::encode_upper(account))
    }
}

impl fmt::Display for IssuanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GENESIS: &str = "rHb9CJAWyB4rj91VRWn96DkukG4bwdtyTh";
    const GENESIS_HEX: &str = "B5F762798A53D543A014CAF8B297CFF8F2F937E8";

    #[test]
    fn issuance_id_pads_sequence_to_48_chars() {
        let account = [0xAB; 20];
        let id = IssuanceId::derive(5, &account);

        assert_eq!(id.as_str().len(), IssuanceId::LEN);
        assert_eq!(&id.as_str()[..8], "00000005");
        assert_eq!(&id.as_str()[8..], "AB".repeat(20));
    }

    #[test]
    fn issuance_id_is_uppercase_hex() {
        let account: [u8; 20] = core::array::from_fn(|i| i as u8 * 13);
        let id = IssuanceId::derive(0xBEEF, &account);

        assert!(id.as_str().starts_with("0000BEEF"));
        assert!(
            id.as_str()
                .chars()
                .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase())
        );
    }

    #[test]
    fn issuance_id_uses_full_sequence_width() {
        let id = IssuanceId::derive(u32::MAX, &[0; 20]);
        assert_eq!(id.as_str(), format!("FFFFFFFF{}", "0".repeat(40)));
    }

    #[test]
    fn issuer_is_read_from_trailing_bytes() {
        let id = IssuanceId::derive(7, &[0x11; 20]);
        assert!(id.is_issued_by(&[0x11; 20]));
        assert!(!id.is_issued_by(&[0x22; 20]));
        assert!(!IssuanceId("11".repeat(20)).is_issued_by(&[0x11; 20]));
    }

    #[test]
    fn decode_genesis_account() {
        let bytes = AccountId::new(GENESIS).decode().unwrap();
        assert_eq!(hex::encode_upper(bytes), GENESIS_HEX);
    }

    #[test]
    fn decode_account_zero() {
        let bytes = AccountId::new("rrrrrrrrrrrrrrrrrrrrrhoLvTp").decode().unwrap();
        assert_eq!(bytes, [0u8; 20]);
    }

    #[test]
    fn decode_rejects_bad_checksum() {
        let result = AccountId::new("rHb9CJAWyB4rj91VRWn96DkukG4bwdtyTi").decode();
        assert!(matches!(result, Err(LedgerError::Malformed(_))));
    }

    #[test]
    fn identifiers_display_raw_value() {
        assert_eq!(AccountId::new(GENESIS).to_string(), GENESIS);
        assert_eq!(TransactionId("C000000100000000".into()).to_string(), "C000000100000000");
        assert_eq!(TxHash("ABCD".into()).to_string(), "ABCD");
    }
}
