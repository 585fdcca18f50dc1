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

//! Error types for ledger access, rate lookups and swap processing.
//!
//! None of these is fatal to the poll loop: the poller logs the error of a
//! single event and moves on to the next one.

use crate::base::{AccountId, IssuanceId, TxHash};
use crate::swap::SwapState;
use rust_decimal::Decimal;
use thiserror::Error;

/// Failures reported by the ledger collaborator.
#[derive(Error, Debug)]
pub enum LedgerError {
    /// The ledger endpoint could not be reached or answered garbage.
    #[error("ledger transport failure: {0}")]
    Transport(#[from] reqwest::Error),

    /// The ledger answered with an RPC-level error.
    #[error("{method} failed: {message}")]
    Rpc { method: &'static str, message: String },

    /// A record did not have the expected shape.
    #[error("malformed ledger record: {0}")]
    Malformed(String),

    /// The requested transaction or ledger object does not exist.
    #[error("not found: {0}")]
    NotFound(String),
}

/// The rate oracle could not produce a usable rate.
#[derive(Error, Debug)]
pub enum OracleError {
    #[error("oracle unavailable: {0}")]
    Unavailable(#[from] LedgerError),

    #[error("oracle price set is empty")]
    EmptyPriceSet,

    /// Rates must be strictly positive.
    #[error("oracle reported non-positive rate {0}")]
    NonPositive(Decimal),

    #[error("oracle rate does not fit the fixed-point range")]
    Overflow,
}

/// Swap processing errors.
#[derive(Error, Debug)]
pub enum SwapError {
    #[error(transparent)]
    Oracle(#[from] OracleError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// The ledger did not accept a submitted transaction.
    #[error("{intent} rejected by ledger: {engine_result}")]
    SubmissionRejected {
        engine_result: String,
        intent: &'static str,
    },

    /// The ledger queued a submission instead of applying it. It may still
    /// apply later, so the outcome has to be reconciled by hand.
    #[error("{intent} queued by ledger ({engine_result}) as {hash}, outcome unknown")]
    SubmissionQueued {
        engine_result: String,
        intent: &'static str,
        hash: TxHash,
    },

    /// Issuance metadata could not be encoded or decoded.
    #[error("issuance metadata: {0}")]
    Metadata(String),

    /// No swap is tracked for the issuance an authorization refers to.
    #[error("no swap tracked for issuance {0}")]
    UnknownIssuance(IssuanceId),

    /// The event's account is not the swap's depositor.
    #[error("account {actual} does not own the swap (depositor {expected})")]
    AccountMismatch {
        expected: AccountId,
        actual: AccountId,
    },

    /// The event does not follow the swap's current state.
    #[error("{event} for issuance {issuance} arrived in state {state:?}")]
    OutOfOrder {
        issuance: IssuanceId,
        state: SwapState,
        event: &'static str,
    },

    /// A quantity was zero or could not be parsed.
    #[error("invalid quantity")]
    InvalidQuantity,

    /// Fixed-point arithmetic overflowed or divided by zero.
    #[error("settlement arithmetic overflow")]
    Arithmetic,
}
