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

//! Service configuration from command-line flags and the environment.

use crate::base::AccountId;
use crate::error::LedgerError;
use crate::ledger::OracleRef;
use crate::rate::FeeSchedule;
use clap::Parser;
use rust_decimal::Decimal;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("fee rate {0} must be at least 0 and below 1")]
    InvalidFeeRate(Decimal),

    #[error("poll interval must be positive")]
    ZeroInterval,

    #[error("invalid service account: {0}")]
    InvalidAccount(#[from] LedgerError),
}

/// Peg-swap service
///
/// Watches the service account on the ledger, issues rate-locked hold tokens
/// for deposits and settles returned hold tokens at the current rate.
#[derive(Parser, Debug, Clone)]
#[command(name = "peg-swap")]
#[command(about = "Rate-locked peg-swap service", long_about = None)]
pub struct Config {
    /// Ledger JSON-RPC endpoint
    #[arg(long, env = "LEDGER_URL", default_value = "https://s.altnet.rippletest.net:51234")]
    pub ledger_url: String,

    /// Classic address of the service account
    #[arg(long, env = "SERVICE_ACCOUNT")]
    pub service_account: String,

    /// Secret the ledger node signs service submissions with
    #[arg(long, env = "SERVICE_SECRET", hide_env_values = true)]
    pub service_secret: String,

    /// Poll interval in milliseconds
    #[arg(long, env = "POLL_INTERVAL_MS", default_value_t = 1000)]
    pub poll_interval_ms: u64,

    /// Events older than this many seconds are not acted on
    #[arg(long, env = "MINIMUM_TIME_SECS", default_value_t = 30)]
    pub minimum_time_secs: i64,

    /// Spread deducted from deposits
    #[arg(long, env = "FEE_RATE", default_value = "0.005")]
    pub fee_rate: Decimal,

    /// Account publishing the price oracle (defaults to the service account)
    #[arg(long, env = "ORACLE_ACCOUNT")]
    pub oracle_account: Option<String>,

    /// Oracle document id
    #[arg(long, env = "ORACLE_DOCUMENT_ID", default_value_t = 1)]
    pub oracle_document_id: u32,

    #[arg(long, env = "BASE_ASSET", default_value = "XRP")]
    pub base_asset: String,

    #[arg(long, env = "QUOTE_ASSET", default_value = "USD")]
    pub quote_asset: String,

    /// Listen address of the query interface
    #[arg(long, env = "LISTEN_ADDR", default_value = "127.0.0.1:5000")]
    pub listen: SocketAddr,

    /// Bound the dedup record to this many transaction ids
    #[arg(long, env = "DEDUP_CAPACITY")]
    pub dedup_capacity: Option<usize>,

    /// Append a CSV audit trail to this file
    #[arg(long, env = "AUDIT_LOG", value_name = "FILE")]
    pub audit_log: Option<PathBuf>,
}

impl Config {
    /// Checks values clap cannot check on its own.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.fees()?;
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::ZeroInterval);
        }
        self.service_account().decode()?;
        Ok(())
    }

    pub fn service_account(&self) -> AccountId {
        AccountId::new(self.service_account.clone())
    }

    pub fn fees(&self) -> Result<FeeSchedule, ConfigError> {
        FeeSchedule::new(self.fee_rate).ok_or(ConfigError::InvalidFeeRate(self.fee_rate))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn oracle(&self) -> OracleRef {
        OracleRef {
            account: AccountId::new(
                self.oracle_account
                    .clone()
                    .unwrap_or_else(|| self.service_account.clone()),
            ),
            document_id: self.oracle_document_id,
            base_asset: self.base_asset.clone(),
            quote_asset: self.quote_asset.clone(),
        }
    }
}
