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

//! Boundary to the external ledger.
//!
//! The swap engine never signs or encodes transactions itself. It hands a
//! [`TxIntent`] to a [`Ledger`] implementation and reads back the outcome.

use crate::base::{AccountId, IssuanceId, TxHash};
use crate::error::LedgerError;
use crate::transaction::LedgerTransaction;
use async_trait::async_trait;
use rust_decimal::Decimal;

/// A fully described transaction for the collaborator to sign and submit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxIntent {
    /// Create a hold-token issuance carrying `metadata`.
    CreateIssuance { metadata: Vec<u8> },
    /// Send `quantity` units of a hold token.
    TransferIssuance {
        issuance: IssuanceId,
        destination: AccountId,
        quantity: u64,
    },
    /// Send `quantity` units of the volatile asset.
    Pay {
        destination: AccountId,
        quantity: u64,
    },
}

impl TxIntent {
    pub fn label(&self) -> &'static str {
        match self {
            Self::CreateIssuance { .. } => "issuance creation",
            Self::TransferIssuance { .. } => "hold transfer",
            Self::Pay { .. } => "payout",
        }
    }
}

/// Result of a submission as reported by the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitOutcome {
    pub engine_result: String,
    /// Submitting account, read back from the submitted transaction.
    pub account: AccountId,
    /// Sequence number the submission consumed.
    pub sequence: u32,
    pub hash: TxHash,
}

impl SubmitOutcome {
    pub const SUCCESS: &'static str = "tesSUCCESS";

    pub fn is_success(&self) -> bool {
        self.engine_result == Self::SUCCESS
    }

    /// `ter` results (e.g. `terQUEUED`) are held by the ledger and can still
    /// apply in a later ledger.
    pub fn may_still_apply(&self) -> bool {
        self.engine_result.starts_with("ter")
    }
}

/// Designated on-ledger price oracle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OracleRef {
    pub account: AccountId,
    pub document_id: u32,
    pub base_asset: String,
    pub quote_asset: String,
}

/// Aggregate of the oracle's price set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregatePrice {
    pub mean: Decimal,
    /// Number of prices the mean was computed over.
    pub size: u32,
}

/// Operations the swap service needs from the ledger.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Transactions touching `account`, in the order the ledger returns them.
    async fn account_transactions(
        &self,
        account: &AccountId,
    ) -> Result<Vec<LedgerTransaction>, LedgerError>;

    /// A single transaction by hash.
    async fn transaction(&self, hash: &TxHash) -> Result<LedgerTransaction, LedgerError>;

    /// Raw metadata blob of an issuance.
    async fn issuance_metadata(&self, issuance: &IssuanceId) -> Result<Vec<u8>, LedgerError>;

    /// Signs and submits `intent` on behalf of the service account.
    async fn submit(&self, intent: TxIntent) -> Result<SubmitOutcome, LedgerError>;

    /// Aggregate price published by `oracle`.
    async fn aggregate_price(&self, oracle: &OracleRef) -> Result<AggregatePrice, LedgerError>;
}
