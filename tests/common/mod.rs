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

//! In-memory ledger shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use peg_swap::{
    AccountId, AggregatePrice, DeliveredAmount, IssuanceId, LEDGER_EPOCH_OFFSET, Ledger,
    LedgerError, LedgerRateOracle, LedgerTransaction, OracleRef, SubmitOutcome, SwapEngine,
    TransactionId, TransactionKind, TxHash, TxIntent,
};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;

/// Genesis account, used as the service so its address decodes.
pub const SERVICE: &str = "rHb9CJAWyB4rj91VRWn96DkukG4bwdtyTh";
pub const SERVICE_HEX: &str = "B5F762798A53D543A014CAF8B297CFF8F2F937E8";

pub const ALICE: &str = "rAlice";
pub const BOB: &str = "rBob";

/// Fixed "now" used by poller tests, in Unix seconds.
pub const NOW: i64 = 1_750_000_000;

#[derive(Default)]
struct State {
    history: Vec<LedgerTransaction>,
    by_hash: HashMap<TxHash, LedgerTransaction>,
    metadata: HashMap<IssuanceId, Vec<u8>>,
    submitted: Vec<TxIntent>,
    sequence: u32,
    engine_result: Option<String>,
    refusal: Option<String>,
    price: Option<AggregatePrice>,
    failing_polls: usize,
}

/// Scriptable [`Ledger`]: a mutable account history, recorded submissions and
/// a single oracle price.
#[derive(Default)]
pub struct FakeLedger {
    state: Mutex<State>,
}

impl FakeLedger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// A ledger whose oracle publishes `mean` from one provider.
    pub fn with_rate(mean: Decimal) -> Arc<Self> {
        let ledger = Self::new();
        ledger.set_rate(mean);
        ledger
    }

    pub fn set_rate(&self, mean: Decimal) {
        self.state.lock().price = Some(AggregatePrice { mean, size: 1 });
    }

    pub fn set_price(&self, price: AggregatePrice) {
        self.state.lock().price = Some(price);
    }

    pub fn clear_rate(&self) {
        self.state.lock().price = None;
    }

    /// Every later submission comes back with `code`.
    pub fn reject_with(&self, code: &str) {
        self.state.lock().engine_result = Some(code.to_string());
    }

    /// Every later submit request is refused by the node with `message`,
    /// before any transaction is formed.
    pub fn refuse_submissions(&self, message: &str) {
        self.state.lock().refusal = Some(message.to_string());
    }

    pub fn accept_submissions(&self) {
        let mut state = self.state.lock();
        state.engine_result = None;
        state.refusal = None;
    }

    /// The next `n` history queries fail.
    pub fn fail_next_polls(&self, n: usize) {
        self.state.lock().failing_polls = n;
    }

    /// Appends `tx` to the service account history.
    pub fn push(&self, tx: LedgerTransaction) {
        let mut state = self.state.lock();
        state.by_hash.insert(tx.hash.clone(), tx.clone());
        state.history.push(tx);
    }

    /// Makes `tx` retrievable by hash without it showing up in the history.
    pub fn archive(&self, tx: LedgerTransaction) {
        self.state.lock().by_hash.insert(tx.hash.clone(), tx);
    }

    pub fn set_metadata(&self, issuance: IssuanceId, metadata: Vec<u8>) {
        self.state.lock().metadata.insert(issuance, metadata);
    }

    pub fn submitted(&self) -> Vec<TxIntent> {
        self.state.lock().submitted.clone()
    }

    pub fn submission_count(&self) -> usize {
        self.state.lock().submitted.len()
    }
}

#[async_trait]
impl Ledger for FakeLedger {
    async fn account_transactions(
        &self,
        _account: &AccountId,
    ) -> Result<Vec<LedgerTransaction>, LedgerError> {
        let mut state = self.state.lock();
        if state.failing_polls > 0 {
            state.failing_polls -= 1;
            return Err(LedgerError::Rpc {
                method: "account_tx",
                message: "tooBusy: the server is too busy".to_string(),
            });
        }
        Ok(state.history.clone())
    }

    async fn transaction(&self, hash: &TxHash) -> Result<LedgerTransaction, LedgerError> {
        self.state
            .lock()
            .by_hash
            .get(hash)
            .cloned()
            .ok_or_else(|| LedgerError::NotFound(format!("transaction {hash}")))
    }

    async fn issuance_metadata(&self, issuance: &IssuanceId) -> Result<Vec<u8>, LedgerError> {
        self.state
            .lock()
            .metadata
            .get(issuance)
            .cloned()
            .ok_or_else(|| LedgerError::NotFound(format!("issuance {issuance}")))
    }

    async fn submit(&self, intent: TxIntent) -> Result<SubmitOutcome, LedgerError> {
        let mut state = self.state.lock();
        if let Some(message) = &state.refusal {
            return Err(LedgerError::Rpc {
                method: "submit",
                message: message.clone(),
            });
        }
        state.sequence += 1;
        let sequence = state.sequence;
        let engine_result = state
            .engine_result
            .clone()
            .unwrap_or_else(|| SubmitOutcome::SUCCESS.to_string());

        if engine_result == SubmitOutcome::SUCCESS {
            if let TxIntent::CreateIssuance { metadata } = &intent {
                state
                    .metadata
                    .insert(issuance_for(sequence), metadata.clone());
            }
        }
        state.submitted.push(intent);

        Ok(SubmitOutcome {
            engine_result,
            account: AccountId::new(SERVICE),
            sequence,
            hash: TxHash(format!("SUBMITTED{sequence:08}")),
        })
    }

    async fn aggregate_price(&self, _oracle: &OracleRef) -> Result<AggregatePrice, LedgerError> {
        self.state
            .lock()
            .price
            .clone()
            .ok_or_else(|| LedgerError::NotFound("oracle document".to_string()))
    }
}

/// Issuance id the service gets for its submission with `sequence`.
pub fn issuance_for(sequence: u32) -> IssuanceId {
    IssuanceId(format!("{sequence:08X}{SERVICE_HEX}"))
}

pub fn service() -> AccountId {
    AccountId::new(SERVICE)
}

pub fn oracle_ref() -> OracleRef {
    OracleRef {
        account: service(),
        document_id: 1,
        base_asset: "XRP".to_string(),
        quote_asset: "USD".to_string(),
    }
}

/// Engine wired to `ledger` for both submissions and rates.
pub fn engine(ledger: &Arc<FakeLedger>) -> SwapEngine {
    let as_ledger: Arc<dyn Ledger> = ledger.clone();
    let oracle = Arc::new(LedgerRateOracle::new(as_ledger.clone(), oracle_ref()));
    SwapEngine::new(service(), as_ledger, oracle)
}

/// Ledger-epoch close time `age` seconds before [`NOW`].
pub fn closed_ago(age: i64) -> i64 {
    NOW - age - LEDGER_EPOCH_OFFSET
}

fn base(n: u32, kind: TransactionKind, account: &str) -> LedgerTransaction {
    LedgerTransaction {
        id: TransactionId(format!("C{n:015X}")),
        hash: TxHash(format!("HASH{n:08}")),
        timestamp: closed_ago(0),
        kind,
        account: AccountId::new(account),
        destination: None,
        delivered: None,
        issuance: None,
    }
}

pub fn deposit(n: u32, from: &str, drops: u64) -> LedgerTransaction {
    LedgerTransaction {
        destination: Some(service()),
        delivered: Some(DeliveredAmount::Native(drops)),
        ..base(n, TransactionKind::Payment, from)
    }
}

pub fn authorize(n: u32, from: &str, issuance: &IssuanceId) -> LedgerTransaction {
    LedgerTransaction {
        issuance: Some(issuance.clone()),
        ..base(n, TransactionKind::IssuanceAuthorize, from)
    }
}

pub fn hold_return(n: u32, from: &str, issuance: &IssuanceId, quantity: u64) -> LedgerTransaction {
    LedgerTransaction {
        destination: Some(service()),
        delivered: Some(DeliveredAmount::Issued {
            issuance: issuance.clone(),
            quantity,
        }),
        ..base(n, TransactionKind::Payment, from)
    }
}

pub fn issuance_create(n: u32) -> LedgerTransaction {
    base(n, TransactionKind::IssuanceCreate, SERVICE)
}

/// Outgoing payment from the service, as it shows up in its own history.
pub fn payout(n: u32, to: &str, drops: u64) -> LedgerTransaction {
    LedgerTransaction {
        destination: Some(AccountId::new(to)),
        delivered: Some(DeliveredAmount::Native(drops)),
        ..base(n, TransactionKind::Payment, SERVICE)
    }
}

/// Same transaction, closed `age` seconds before [`NOW`].
pub fn aged(mut tx: LedgerTransaction, age: i64) -> LedgerTransaction {
    tx.timestamp = closed_ago(age);
    tx
}
