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

//! Swap state machine.
//!
//! The [`SwapEngine`] reacts to one classified ledger event at a time and
//! drives the peg-swap protocol for it.
//!
//! # Protocol
//!
//! - **Deposit**: volatile asset arrives. The fee spread is deducted, the
//!   current rate is locked into a new hold-token issuance, and the depositor
//!   is recorded in the pending issuance directory.
//! - **Authorization**: the depositor opts into the issuance. The net deposit
//!   quantity is transferred to them in hold units.
//! - **Return**: hold units come back. The volatile asset is paid out at the
//!   ratio of the locked rate to the current rate. Partial returns are each
//!   paid; the swap settles once every issued hold unit is back.
//!
//! Each step is tracked per swap in the [`SwapBook`]; steps arriving out of
//! order for a tracked swap are rejected without submitting anything.

use crate::audit::{AuditLog, AuditRecord, Leg};
use crate::base::{AccountId, IssuanceId};
use crate::directory::PendingIssuanceDirectory;
use crate::error::{LedgerError, SwapError};
use crate::ledger::{Ledger, SubmitOutcome, TxIntent};
use crate::metadata::IssuanceMetadata;
use crate::oracle::RateOracle;
use crate::rate::{ExchangeRate, FeeSchedule, settlement_payout};
use crate::swap::{Swap, SwapBook, SwapEvent};
use crate::transaction::{EventClass, LedgerTransaction};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// What handling an event did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// A hold issuance was created for a deposit.
    Issued {
        issuance: IssuanceId,
        net_quantity: u64,
        locked_rate: ExchangeRate,
    },
    /// Hold units were sent to an authorizing depositor.
    Transferred {
        issuance: IssuanceId,
        destination: AccountId,
        quantity: u64,
    },
    /// Returned hold units were paid out.
    Settled {
        issuance: IssuanceId,
        destination: AccountId,
        payout: u64,
    },
    /// The service's own issuance creation showed up.
    Acknowledged,
    Ignored,
}

/// Peg-swap protocol driver for the service account.
///
/// Expects events one at a time from a single poll loop; the directory and
/// swap book may be read concurrently from elsewhere.
pub struct SwapEngine {
    service: AccountId,
    ledger: Arc<dyn Ledger>,
    oracle: Arc<dyn RateOracle>,
    fees: FeeSchedule,
    directory: Arc<PendingIssuanceDirectory>,
    swaps: Arc<SwapBook>,
    audit: Option<Arc<AuditLog>>,
}

impl SwapEngine {
    /// Creates an engine with the default fee and an empty directory and swap book.
    pub fn new(service: AccountId, ledger: Arc<dyn Ledger>, oracle: Arc<dyn RateOracle>) -> Self {
        Self {
            service,
            ledger,
            oracle,
            fees: FeeSchedule::default(),
            directory: Arc::new(PendingIssuanceDirectory::new()),
            swaps: Arc::new(SwapBook::new()),
            audit: None,
        }
    }

    pub fn with_fees(mut self, fees: FeeSchedule) -> Self {
        self.fees = fees;
        self
    }

    pub fn with_directory(mut self, directory: Arc<PendingIssuanceDirectory>) -> Self {
        self.directory = directory;
        self
    }

    pub fn with_swaps(mut self, swaps: Arc<SwapBook>) -> Self {
        self.swaps = swaps;
        self
    }

    pub fn with_audit(mut self, audit: Arc<AuditLog>) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn service(&self) -> &AccountId {
        &self.service
    }

    pub fn directory(&self) -> &Arc<PendingIssuanceDirectory> {
        &self.directory
    }

    pub fn swaps(&self) -> &Arc<SwapBook> {
        &self.swaps
    }

    /// Classifies `tx` and executes the protocol step it triggers.
    ///
    /// # Errors
    ///
    /// - [`SwapError::Ledger`] - malformed record or ledger query failure.
    /// - [`SwapError::Oracle`] - no usable current rate.
    /// - [`SwapError::SubmissionRejected`] - the ledger refused a submission.
    /// - [`SwapError::SubmissionQueued`] - the ledger held a submission that may still apply.
    /// - [`SwapError::UnknownIssuance`], [`SwapError::AccountMismatch`],
    ///   [`SwapError::OutOfOrder`] - the event does not fit a tracked swap.
    /// - [`SwapError::InvalidQuantity`] - nothing to issue or pay out.
    pub async fn handle(&self, tx: &LedgerTransaction) -> Result<Outcome, SwapError> {
        match tx.classify(&self.service)? {
            EventClass::Deposit { quantity } => self.deposit(tx, quantity).await,
            EventClass::Authorize { issuance } => self.authorize(tx, issuance).await,
            EventClass::Return { issuance, quantity } => {
                self.settle(tx, issuance, quantity).await
            }
            EventClass::IssuanceCreated => {
                debug!(tx = %tx.id, "issuance creation acknowledged");
                Ok(Outcome::Acknowledged)
            }
            EventClass::Ignored => Ok(Outcome::Ignored),
        }
    }

    async fn deposit(
        &self,
        tx: &LedgerTransaction,
        delivered: u64,
    ) -> Result<Outcome, SwapError> {
        let net_quantity = self.fees.net_quantity(delivered)?;
        if net_quantity == 0 {
            return Err(SwapError::InvalidQuantity);
        }

        let locked_rate = self.oracle.current_rate().await?;
        let metadata = IssuanceMetadata::hold_token(locked_rate, &tx.hash).encode()?;
        let outcome = self.submit(TxIntent::CreateIssuance { metadata }).await?;

        // Sequence and issuer come back from the submission itself.
        let issuance = IssuanceId::derive(outcome.sequence, &outcome.account.decode()?);
        self.swaps.track(
            issuance.clone(),
            Swap::new(tx.account.clone(), tx.hash.clone(), net_quantity, locked_rate),
        );
        self.swaps.advance(&issuance, SwapEvent::IssuanceAccepted)?;
        self.directory.set(tx.account.clone(), issuance.clone());

        info!(
            tx = %tx.id,
            depositor = %tx.account,
            delivered,
            net_quantity,
            rate = %locked_rate,
            issuance = %issuance,
            "hold issuance created"
        );
        self.audit(AuditRecord {
            transaction_id: tx.id.clone(),
            leg: Leg::Deposit,
            account: tx.account.clone(),
            issuance_id: Some(issuance.clone()),
            quantity: delivered,
            locked_rate: Some(locked_rate.as_decimal()),
            current_rate: None,
            payout: net_quantity,
        });

        Ok(Outcome::Issued {
            issuance,
            net_quantity,
            locked_rate,
        })
    }

    async fn authorize(
        &self,
        tx: &LedgerTransaction,
        issuance: IssuanceId,
    ) -> Result<Outcome, SwapError> {
        let swap = self.swaps.authorization_target(&issuance, &tx.account)?;

        self.submit(TxIntent::TransferIssuance {
            issuance: issuance.clone(),
            destination: tx.account.clone(),
            quantity: swap.net_quantity,
        })
        .await?;
        self.swaps.advance(&issuance, SwapEvent::Authorize)?;

        info!(
            tx = %tx.id,
            depositor = %tx.account,
            issuance = %issuance,
            quantity = swap.net_quantity,
            "hold units transferred"
        );
        self.audit(AuditRecord {
            transaction_id: tx.id.clone(),
            leg: Leg::Transfer,
            account: tx.account.clone(),
            issuance_id: Some(issuance.clone()),
            quantity: swap.net_quantity,
            locked_rate: Some(swap.locked_rate.as_decimal()),
            current_rate: None,
            payout: swap.net_quantity,
        });

        Ok(Outcome::Transferred {
            issuance,
            destination: tx.account.clone(),
            quantity: swap.net_quantity,
        })
    }

    async fn settle(
        &self,
        tx: &LedgerTransaction,
        issuance: IssuanceId,
        returned: u64,
    ) -> Result<Outcome, SwapError> {
        if returned == 0 {
            return Err(SwapError::InvalidQuantity);
        }
        let tracked = self.swaps.return_target(&issuance)?;

        // The ledger copy of the rate lock is authoritative.
        let metadata =
            IssuanceMetadata::decode(&self.ledger.issuance_metadata(&issuance).await?)?;
        let locked_rate = metadata.locked_rate()?;
        if tracked.is_none() {
            self.verify_untracked(&issuance, &metadata).await?;
            warn!(issuance = %issuance, "settling issuance not tracked by this process");
        }

        let current_rate = self.oracle.current_rate().await?;
        let payout = settlement_payout(returned, locked_rate, current_rate)?;
        if payout == 0 {
            return Err(SwapError::InvalidQuantity);
        }

        self.submit(TxIntent::Pay {
            destination: tx.account.clone(),
            quantity: payout,
        })
        .await?;
        let state = self
            .swaps
            .advance(&issuance, SwapEvent::Return { quantity: returned })?;

        info!(
            tx = %tx.id,
            account = %tx.account,
            issuance = %issuance,
            returned,
            locked_rate = %locked_rate,
            current_rate = %current_rate,
            payout,
            state = ?state,
            "return paid out"
        );
        self.audit(AuditRecord {
            transaction_id: tx.id.clone(),
            leg: Leg::Settlement,
            account: tx.account.clone(),
            issuance_id: Some(issuance.clone()),
            quantity: returned,
            locked_rate: Some(locked_rate.as_decimal()),
            current_rate: Some(current_rate.as_decimal()),
            payout,
        });

        Ok(Outcome::Settled {
            issuance,
            destination: tx.account.clone(),
            payout,
        })
    }

    /// Checks that an issuance unknown to this process is one of ours and was
    /// created against a deposit into the service account.
    async fn verify_untracked(
        &self,
        issuance: &IssuanceId,
        metadata: &IssuanceMetadata,
    ) -> Result<(), SwapError> {
        if !issuance.is_issued_by(&self.service.decode()?) {
            return Err(SwapError::UnknownIssuance(issuance.clone()));
        }
        let lock = metadata
            .additional_info
            .as_ref()
            .ok_or_else(|| SwapError::Metadata("issuance carries no rate lock".to_string()))?;
        let origin = self.ledger.transaction(&lock.txn_hash).await?;
        match origin.classify(&self.service)? {
            EventClass::Deposit { .. } => Ok(()),
            _ => Err(SwapError::Metadata(format!(
                "issuance {issuance} origin {} is not a deposit",
                lock.txn_hash
            ))),
        }
    }

    async fn submit(&self, intent: TxIntent) -> Result<SubmitOutcome, SwapError> {
        let label = intent.label();
        let outcome = match self.ledger.submit(intent).await {
            Ok(outcome) => outcome,
            // Refused before it reached the ledger.
            Err(LedgerError::Rpc {
                method: "submit",
                message,
            }) => {
                return Err(SwapError::SubmissionRejected {
                    engine_result: message,
                    intent: label,
                });
            }
            Err(e) => return Err(e.into()),
        };
        if outcome.may_still_apply() {
            error!(
                intent = label,
                engine_result = %outcome.engine_result,
                hash = %outcome.hash,
                sequence = outcome.sequence,
                "submission held by ledger and may still apply, reconcile manually"
            );
            return Err(SwapError::SubmissionQueued {
                engine_result: outcome.engine_result,
                intent: label,
                hash: outcome.hash,
            });
        }
        if !outcome.is_success() {
            return Err(SwapError::SubmissionRejected {
                engine_result: outcome.engine_result,
                intent: label,
            });
        }
        debug!(intent = label, hash = %outcome.hash, sequence = outcome.sequence, "submitted");
        Ok(outcome)
    }

    fn audit(&self, record: AuditRecord) {
        if let Some(audit) = &self.audit {
            // Never fails the event: the ledger action has already been submitted.
            if let Err(e) = audit.record(&record) {
                error!(error = %e, tx = %record.transaction_id, "audit write failed");
            }
        }
    }
}
