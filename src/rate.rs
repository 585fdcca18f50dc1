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

//! Fixed-point exchange rates and the swap's money arithmetic.
//!
//! Rates are integers over `10^scale`. Deposits lose the fee spread once;
//! settlements convert hold units back at the ratio of locked rate to current
//! rate. Both results are truncated to whole units, never rounded.

use crate::error::{OracleError, SwapError};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Scale used for every rate this deployment publishes.
pub const RATE_SCALE: u32 = 4;

/// Largest scale accepted from issuance metadata.
const MAX_SCALE: u32 = 18;

/// Units of stable value per unit of volatile asset, as `value / 10^scale`.
///
/// Invariant: `value > 0`, `value <= i64::MAX`, `scale <= 18`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExchangeRate {
    value: u64,
    scale: u32,
}

impl ExchangeRate {
    /// Creates a rate at the deployment scale.
    pub fn new(value: u64) -> Option<Self> {
        Self::with_scale(value, RATE_SCALE)
    }

    /// Creates a rate at an explicit scale, as recorded in issuance metadata.
    pub fn with_scale(value: u64, scale: u32) -> Option<Self> {
        if value == 0 || value > i64::MAX as u64 || scale > MAX_SCALE {
            return None;
        }
        Some(Self { value, scale })
    }

    /// Converts a decimal price into a rate at the deployment scale,
    /// truncating digits beyond it.
    ///
    /// # Errors
    ///
    /// [`OracleError::NonPositive`] if the truncated rate is not positive,
    /// [`OracleError::Overflow`] if it does not fit.
    pub fn from_decimal(price: Decimal) -> Result<Self, OracleError> {
        let scaled = price
            .checked_mul(Decimal::from(10u64.pow(RATE_SCALE)))
            .ok_or(OracleError::Overflow)?
            .trunc();
        if scaled <= Decimal::ZERO {
            return Err(OracleError::NonPositive(price));
        }
        let value = scaled.to_u64().ok_or(OracleError::Overflow)?;
        Self::new(value).ok_or(OracleError::Overflow)
    }

    pub fn value(&self) -> u64 {
        self.value
    }

    pub fn scale(&self) -> u32 {
        self.scale
    }

    pub fn as_decimal(&self) -> Decimal {
        Decimal::new(self.value as i64, self.scale)
    }
}

impl fmt::Display for ExchangeRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_decimal())
    }
}

/// Spread deducted from the deposit leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeSchedule {
    rate: Decimal,
}

impl FeeSchedule {
    pub const DEFAULT_RATE: Decimal = dec!(0.005);

    /// Returns `None` unless `0 <= rate < 1`.
    pub fn new(rate: Decimal) -> Option<Self> {
        (rate >= Decimal::ZERO && rate < Decimal::ONE).then_some(Self { rate })
    }

    pub fn rate(&self) -> Decimal {
        self.rate
    }

    /// `floor(delivered * (1 - rate))`.
    pub fn net_quantity(&self, delivered: u64) -> Result<u64, SwapError> {
        Decimal::from(delivered)
            .checked_mul(Decimal::ONE - self.rate)
            .ok_or(SwapError::Arithmetic)?
            .floor()
            .to_u64()
            .ok_or(SwapError::Arithmetic)
    }
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            rate: Self::DEFAULT_RATE,
        }
    }
}

/// Volatile-asset units paid out for `returned` hold units.
///
/// `floor(returned * (locked / 10^ls) / (current / 10^cs))`, evaluated as one
/// exact integer ratio so lock-time and settlement-time values never drift.
pub fn settlement_payout(
    returned: u64,
    locked: ExchangeRate,
    current: ExchangeRate,
) -> Result<u64, SwapError> {
    let numerator = u128::from(returned)
        .checked_mul(u128::from(locked.value))
        .and_then(|n| n.checked_mul(10u128.pow(current.scale)))
        .ok_or(SwapError::Arithmetic)?;
    let denominator = u128::from(current.value)
        .checked_mul(10u128.pow(locked.scale))
        .ok_or(SwapError::Arithmetic)?;
    if denominator == 0 {
        return Err(SwapError::Arithmetic);
    }
    u64::try_from(numerator / denominator).map_err(|_| SwapError::Arithmetic)
}
