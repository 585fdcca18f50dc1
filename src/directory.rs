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

//! Pending issuance directory.
//!
//! Maps a depositor to the hold-token issuance created for their latest
//! deposit, so a depositor who never sees the creation transaction can poll
//! for the id they must authorize. The ledger stays authoritative; this is a
//! convenience index only.

use crate::base::{AccountId, IssuanceId};
use dashmap::DashMap;

/// Last-write-wins map from depositor to issuance id.
///
/// Written only by the poll loop, read concurrently by the query interface.
#[derive(Debug, Default)]
pub struct PendingIssuanceDirectory {
    entries: DashMap<AccountId, IssuanceId>,
}

impl PendingIssuanceDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `issuance` for `depositor`, replacing any earlier entry.
    pub fn set(&self, depositor: AccountId, issuance: IssuanceId) {
        self.entries.insert(depositor, issuance);
    }

    pub fn get(&self, depositor: &AccountId) -> Option<IssuanceId> {
        self.entries.get(depositor).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
