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

//! Ledger transaction records and their classification.
//!
//! Every record the poller dispatches falls into exactly one [`EventClass`]:
//! - a native payment into the service account is a deposit
//! - an issued payment into the service account is a return
//! - an issuance authorization by a depositor acknowledges a hold token
//! - the service's own issuance creation is acknowledged and ignored

use crate::base::{AccountId, IssuanceId, TransactionId, TxHash};
use crate::error::LedgerError;
use serde::{Deserialize, Serialize};

/// Seconds between the Unix epoch and the ledger epoch (2000-01-01T00:00:00Z).
pub const LEDGER_EPOCH_OFFSET: i64 = 946_684_800;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionKind {
    Payment,
    IssuanceCreate,
    IssuanceAuthorize,
    Other(String),
}

impl TransactionKind {
    /// Maps a ledger `TransactionType` name onto a kind.
    pub fn from_ledger_name(name: &str) -> Self {
        match name {
            "Payment" => Self::Payment,
            "MPTokenIssuanceCreate" => Self::IssuanceCreate,
            "MPTokenAuthorize" => Self::IssuanceAuthorize,
            other => Self::Other(other.to_string()),
        }
    }
}

/// Amount delivered by a payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeliveredAmount {
    /// Plain quantity of the volatile asset, in its smallest unit.
    Native(u64),
    /// Quantity of a hold-token issuance.
    Issued { issuance: IssuanceId, quantity: u64 },
}

/// One settled ledger entry. Immutable once observed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerTransaction {
    pub id: TransactionId,
    pub hash: TxHash,
    /// Close time in seconds since the ledger epoch.
    pub timestamp: i64,
    pub kind: TransactionKind,
    pub account: AccountId,
    pub destination: Option<AccountId>,
    pub delivered: Option<DeliveredAmount>,
    /// Issuance referenced by an authorization.
    pub issuance: Option<IssuanceId>,
}

/// What the swap state machine should do with a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventClass {
    Deposit { quantity: u64 },
    Return { issuance: IssuanceId, quantity: u64 },
    Authorize { issuance: IssuanceId },
    IssuanceCreated,
    Ignored,
}

impl LedgerTransaction {
    /// Close time as Unix seconds.
    pub fn unix_time(&self) -> i64 {
        self.timestamp + LEDGER_EPOCH_OFFSET
    }

    /// Classifies the transaction from the point of view of `service`.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Malformed`] when a payment into the service
    /// carries no delivered amount or an authorization names no issuance.
    pub fn classify(&self, service: &AccountId) -> Result<EventClass, LedgerError> {
        match &self.kind {
            TransactionKind::Payment => {
                if self.destination.as_ref() != Some(service) {
                    return Ok(EventClass::Ignored);
                }
                match &self.delivered {
                    Some(DeliveredAmount::Native(quantity)) => Ok(EventClass::Deposit {
                        quantity: *quantity,
                    }),
                    Some(DeliveredAmount::Issued { issuance, quantity }) => {
                        Ok(EventClass::Return {
                            issuance: issuance.clone(),
                            quantity: *quantity,
                        })
                    }
                    None => Err(LedgerError::Malformed(format!(
                        "payment {} has no delivered amount",
                        self.id
                    ))),
                }
            }
            TransactionKind::IssuanceCreate => Ok(EventClass::IssuanceCreated),
            TransactionKind::IssuanceAuthorize => {
                // The service authorizing holders of its own issuances is not an ack.
                if &self.account == service {
                    return Ok(EventClass::Ignored);
                }
                let issuance = self.issuance.clone().ok_or_else(|| {
                    LedgerError::Malformed(format!("authorization {} names no issuance", self.id))
                })?;
                Ok(EventClass::Authorize { issuance })
            }
            TransactionKind::Other(_) => Ok(EventClass::Ignored),
        }
    }
}
