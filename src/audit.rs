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

//! CSV audit trail of every money-moving step.
//!
//! # CSV Format
//!
//! Columns: `transaction_id, leg, account, issuance_id, quantity, locked_rate, current_rate, payout`
//!
//! ```csv
//! transaction_id,leg,account,issuance_id,quantity,locked_rate,current_rate,payout
//! C000000100010000,deposit,rDepositor,00000005B5F7...,1000,1.5000,,995
//! C000000300010000,settlement,rDepositor,00000005B5F7...,995,1.5000,1.0000,1492
//! ```

use crate::base::{AccountId, IssuanceId, TransactionId};
use csv::{Writer, WriterBuilder};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Leg {
    /// Volatile asset received, hold issuance created.
    Deposit,
    /// Hold units sent to the authorizing depositor.
    Transfer,
    /// Hold units returned, volatile asset paid out.
    Settlement,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditRecord {
    pub transaction_id: TransactionId,
    pub leg: Leg,
    pub account: AccountId,
    pub issuance_id: Option<IssuanceId>,
    /// Quantity received: volatile units for deposits, hold units otherwise.
    pub quantity: u64,
    pub locked_rate: Option<Decimal>,
    pub current_rate: Option<Decimal>,
    /// Quantity sent in response.
    pub payout: u64,
}

/// Append-only CSV sink shared by the swap engine.
pub struct AuditLog {
    writer: Mutex<Writer<Box<dyn Write + Send>>>,
}

impl AuditLog {
    /// Opens `path` for appending, writing the header row only to a new file.
    pub fn append_to(path: impl AsRef<Path>) -> Result<Self, csv::Error> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let fresh = file.metadata()?.len() == 0;
        let writer = WriterBuilder::new()
            .has_headers(fresh)
            .from_writer(Box::new(file) as Box<dyn Write + Send>);
        Ok(Self {
            writer: Mutex::new(writer),
        })
    }

    pub fn from_writer(writer: impl Write + Send + 'static) -> Self {
        Self {
            writer: Mutex::new(Writer::from_writer(
                Box::new(writer) as Box<dyn Write + Send>
            )),
        }
    }

    /// Appends and flushes one record.
    pub fn record(&self, record: &AuditRecord) -> Result<(), csv::Error> {
        let mut writer = self.writer.lock();
        writer.serialize(record)?;
        writer.flush()?;
        Ok(())
    }
}
