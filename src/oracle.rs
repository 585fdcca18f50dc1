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

//! Current exchange rate, read from the designated on-ledger price oracle.

use crate::error::OracleError;
use crate::ledger::{Ledger, OracleRef};
use crate::rate::ExchangeRate;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Source of the current volatile-to-stable exchange rate.
#[async_trait]
pub trait RateOracle: Send + Sync {
    /// Returns the current rate at the deployment scale.
    ///
    /// Fails rather than falling back to a stale or default value.
    async fn current_rate(&self) -> Result<ExchangeRate, OracleError>;
}

/// Reads the mean of a single oracle's price set on every call. No caching.
pub struct LedgerRateOracle {
    ledger: Arc<dyn Ledger>,
    oracle: OracleRef,
}

impl LedgerRateOracle {
    pub fn new(ledger: Arc<dyn Ledger>, oracle: OracleRef) -> Self {
        Self { ledger, oracle }
    }
}

#[async_trait]
impl RateOracle for LedgerRateOracle {
    async fn current_rate(&self) -> Result<ExchangeRate, OracleError> {
        let price = self.ledger.aggregate_price(&self.oracle).await?;
        if price.size == 0 {
            return Err(OracleError::EmptyPriceSet);
        }
        let rate = ExchangeRate::from_decimal(price.mean)?;
        debug!(
            oracle = %self.oracle.account,
            document = self.oracle.document_id,
            mean = %price.mean,
            rate = %rate,
            "oracle rate"
        );
        Ok(rate)
    }
}
