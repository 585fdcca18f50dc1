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

//! # Peg Swap
//!
//! This library reconciles asynchronous, duplicate-prone events from an
//! append-only ledger into a rate-locked token swap: a depositor sends the
//! volatile asset, receives a hold token whose value is locked at the current
//! exchange rate, and on return is paid out at the then-current rate.
//!
//! ## Core Components
//!
//! - [`Poller`]: polls the service account and dispatches each fresh event once
//! - [`SwapEngine`]: classifies events and executes the protocol steps
//! - [`SwapBook`]: per-swap state (`Deposited → IssuanceCreated → Authorized → Settled`)
//! - [`PendingIssuanceDirectory`]: depositor to issuance id, served by [`server`]
//! - [`RateOracle`]: current exchange rate from the on-ledger price oracle
//! - [`Ledger`]: boundary to the external ledger, implemented by [`JsonRpcLedger`]
//!
//! ## Example
//!
//! ```
//! use peg_swap::{ExchangeRate, FeeSchedule, settlement_payout};
//!
//! // Deposit 1000 units at 1.5000, keep 995 after the 0.5% spread.
//! let net = FeeSchedule::default().net_quantity(1000).unwrap();
//! assert_eq!(net, 995);
//!
//! // Return them when the rate has fallen to 1.0000.
//! let locked = ExchangeRate::new(15_000).unwrap();
//! let current = ExchangeRate::new(10_000).unwrap();
//! assert_eq!(settlement_payout(net, locked, current).unwrap(), 1492);
//! ```
//!
//! ## Thread Safety
//!
//! Events are processed strictly sequentially by one poll loop. The directory
//! and swap book are concurrent maps, so the query interface can read them
//! while the loop writes.

pub mod audit;
mod base;
pub mod config;
mod dedup;
mod directory;
mod engine;
pub mod error;
mod ledger;
mod metadata;
mod oracle;
mod poller;
mod rate;
pub mod rpc;
pub mod server;
mod swap;
mod transaction;

pub use audit::{AuditLog, AuditRecord, Leg};
pub use base::{AccountId, IssuanceId, TransactionId, TxHash};
pub use config::Config;
pub use dedup::DedupRecord;
pub use directory::PendingIssuanceDirectory;
pub use engine::{Outcome, SwapEngine};
pub use error::{LedgerError, OracleError, SwapError};
pub use ledger::{AggregatePrice, Ledger, OracleRef, SubmitOutcome, TxIntent};
pub use metadata::{IssuanceMetadata, RateLock};
pub use oracle::{LedgerRateOracle, RateOracle};
pub use poller::{PollReport, Poller};
pub use rate::{ExchangeRate, FeeSchedule, RATE_SCALE, settlement_payout};
pub use rpc::JsonRpcLedger;
pub use swap::{Swap, SwapBook, SwapEvent, SwapSnapshot, SwapState};
pub use transaction::{
    DeliveredAmount, EventClass, LEDGER_EPOCH_OFFSET, LedgerTransaction, TransactionKind,
};
