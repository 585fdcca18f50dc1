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

//! Per-swap state.
//!
//! Each deposit opens one swap instance, keyed by the issuance id created for
//! it. The authorization and return events carry that id, so they correlate
//! with their own deposit instead of whatever deposit happened last.
//!
//! # Example
//!
//! ```
//! use peg_swap::{AccountId, ExchangeRate, Swap, SwapEvent, SwapState, TxHash};
//!
//! let swap = Swap::new(
//!     AccountId::new("rDepositor"),
//!     TxHash("DEPOSIT".into()),
//!     995,
//!     ExchangeRate::new(15_000).unwrap(),
//! );
//! assert_eq!(swap.state(), SwapState::Deposited);
//! assert_eq!(swap.apply(SwapEvent::IssuanceAccepted), Ok(SwapState::IssuanceCreated));
//! ```

use crate::base::{AccountId, IssuanceId, TxHash};
use crate::error::SwapError;
use crate::rate::ExchangeRate;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

//  Deposited ──issuance accepted──► IssuanceCreated ──authorize──► Authorized ──return──► Settled
//                                                                  ▲        │
//                                                                  └partial─┘
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SwapState {
    Deposited,
    IssuanceCreated,
    Authorized,
    /// Every issued hold unit has come back.
    Settled,
}

/// Protocol steps that advance a swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapEvent {
    /// The ledger accepted the hold-token issuance.
    IssuanceAccepted,
    /// The hold units were transferred after the depositor authorized them.
    Authorize,
    /// `quantity` returned hold units were paid out.
    Return { quantity: u64 },
}

impl SwapEvent {
    fn label(self) -> &'static str {
        match self {
            Self::IssuanceAccepted => "issuance acceptance",
            Self::Authorize => "authorization",
            Self::Return { .. } => "return",
        }
    }

    fn allowed_from(self, state: SwapState) -> bool {
        matches!(
            (state, self),
            (SwapState::Deposited, Self::IssuanceAccepted)
                | (SwapState::IssuanceCreated, Self::Authorize)
                | (SwapState::Authorized, Self::Return { .. })
        )
    }
}

/// Point-in-time copy of a swap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapSnapshot {
    pub depositor: AccountId,
    pub origin: TxHash,
    /// Hold units owed to the depositor once they authorize the issuance.
    pub net_quantity: u64,
    pub locked_rate: ExchangeRate,
    /// Hold units paid out so far, across partial returns.
    pub returned: u64,
    pub state: SwapState,
}

#[derive(Debug)]
struct SwapData {
    depositor: AccountId,
    origin: TxHash,
    net_quantity: u64,
    locked_rate: ExchangeRate,
    returned: u64,
    state: SwapState,
}

/// One peg-swap instance.
#[derive(Debug)]
pub struct Swap {
    inner: Mutex<SwapData>,
}

impl Swap {
    pub fn new(
        depositor: AccountId,
        origin: TxHash,
        net_quantity: u64,
        locked_rate: ExchangeRate,
    ) -> Self {
        Self {
            inner: Mutex::new(SwapData {
                depositor,
                origin,
                net_quantity,
                locked_rate,
                returned: 0,
                state: SwapState::Deposited,
            }),
        }
    }

    pub fn state(&self) -> SwapState {
        self.inner.lock().state
    }

    pub fn snapshot(&self) -> SwapSnapshot {
        let data = self.inner.lock();
        SwapSnapshot {
            depositor: data.depositor.clone(),
            origin: data.origin.clone(),
            net_quantity: data.net_quantity,
            locked_rate: data.locked_rate,
            returned: data.returned,
            state: data.state,
        }
    }

    /// Whether `event` can be applied in the current state.
    pub fn permits(&self, event: SwapEvent) -> bool {
        event.allowed_from(self.inner.lock().state)
    }

    /// Advances the swap, returning the new state or the unchanged current one.
    ///
    /// A return keeps the swap `Authorized` until the returned total reaches
    /// the issued quantity.
    pub fn apply(&self, event: SwapEvent) -> Result<SwapState, SwapState> {
        let mut data = self.inner.lock();
        if !event.allowed_from(data.state) {
            return Err(data.state);
        }
        let next = match event {
            SwapEvent::IssuanceAccepted => SwapState::IssuanceCreated,
            SwapEvent::Authorize => SwapState::Authorized,
            SwapEvent::Return { quantity } => {
                data.returned = data.returned.saturating_add(quantity);
                if data.returned >= data.net_quantity {
                    SwapState::Settled
                } else {
                    SwapState::Authorized
                }
            }
        };
        data.state = next;
        Ok(next)
    }
}

/// Open swaps indexed by issuance id.
#[derive(Debug, Default)]
pub struct SwapBook {
    swaps: DashMap<IssuanceId, Swap>,
}

impl SwapBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts tracking `swap` under `issuance`.
    pub fn track(&self, issuance: IssuanceId, swap: Swap) {
        self.swaps.insert(issuance, swap);
    }

    pub fn snapshot(&self, issuance: &IssuanceId) -> Option<SwapSnapshot> {
        self.swaps.get(issuance).map(|swap| swap.snapshot())
    }

    pub fn len(&self) -> usize {
        self.swaps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.swaps.is_empty()
    }

    /// Validates an authorization by `account` and returns the swap it unlocks.
    ///
    /// # Errors
    ///
    /// - [`SwapError::UnknownIssuance`] - no swap is tracked for `issuance`.
    /// - [`SwapError::OutOfOrder`] - the issuance is not awaiting authorization.
    /// - [`SwapError::AccountMismatch`] - `account` is not the depositor.
    pub fn authorization_target(
        &self,
        issuance: &IssuanceId,
        account: &AccountId,
    ) -> Result<SwapSnapshot, SwapError> {
        let swap = self
            .swaps
            .get(issuance)
            .ok_or_else(|| SwapError::UnknownIssuance(issuance.clone()))?;
        let snapshot = swap.snapshot();
        Self::check_order(issuance, &snapshot, SwapEvent::Authorize)?;
        if &snapshot.depositor != account {
            return Err(SwapError::AccountMismatch {
                expected: snapshot.depositor,
                actual: account.clone(),
            });
        }
        Ok(snapshot)
    }

    /// Validates a return against the tracked swap, if any.
    ///
    /// Returns `Ok(None)` for an issuance this process does not track, e.g.
    /// one created before a restart.
    pub fn return_target(&self, issuance: &IssuanceId) -> Result<Option<SwapSnapshot>, SwapError> {
        let Some(swap) = self.swaps.get(issuance) else {
            return Ok(None);
        };
        let snapshot = swap.snapshot();
        Self::check_order(issuance, &snapshot, SwapEvent::Return { quantity: 0 })?;
        Ok(Some(snapshot))
    }

    /// Applies `event` to a tracked swap; untracked issuances are left alone.
    pub fn advance(
        &self,
        issuance: &IssuanceId,
        event: SwapEvent,
    ) -> Result<Option<SwapState>, SwapError> {
        let Some(swap) = self.swaps.get(issuance) else {
            return Ok(None);
        };
        swap.apply(event)
            .map(Some)
            .map_err(|state| SwapError::OutOfOrder {
                issuance: issuance.clone(),
                state,
                event: event.label(),
            })
    }

    fn check_order(
        issuance: &IssuanceId,
        snapshot: &SwapSnapshot,
        event: SwapEvent,
    ) -> Result<(), SwapError> {
        if event.allowed_from(snapshot.state) {
            return Ok(());
        }
        Err(SwapError::OutOfOrder {
            issuance: issuance.clone(),
            state: snapshot.state,
            event: event.label(),
        })
    }
}
