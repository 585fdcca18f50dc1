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

//! Record of ledger events already handed to the swap state machine.
//!
//! The ledger delivers at least once: the same transaction shows up in every
//! poll until it falls out of the account history. Recording each id before
//! dispatch turns that into at-most-once handling per process lifetime.

use crate::base::TransactionId;
use crossbeam::queue::SegQueue;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

/// A thread-safe set of processed transaction ids.
///
/// Combines a [`DashMap`] for O(1) membership checks with a [`SegQueue`]
/// that remembers insertion order, so a bounded record can evict its oldest
/// ids first.
#[derive(Debug)]
pub struct DedupRecord {
    seen: DashMap<TransactionId, ()>,
    order: SegQueue<TransactionId>,
    /// Maximum number of ids retained; `None` grows without bound.
    capacity: Option<usize>,
}

impl DedupRecord {
    /// Creates an unbounded record.
    pub fn new() -> Self {
        Self {
            seen: DashMap::new(),
            order: SegQueue::new(),
            capacity: None,
        }
    }

    /// Creates a record that keeps at most `capacity` ids.
    ///
    /// The capacity must exceed the number of transactions a single poll can
    /// return inside the staleness window, otherwise an evicted id that is
    /// still fresh would be dispatched again.
    pub fn bounded(capacity: usize) -> Self {
        Self {
            capacity: Some(capacity.max(1)),
            ..Self::new()
        }
    }

    /// Records `id`, returning `false` if it was already present.
    pub fn insert(&self, id: TransactionId) -> bool {
        // Entry API keeps check-and-insert atomic.
        match self.seen.entry(id.clone()) {
            Entry::Occupied(_) => return false,
            Entry::Vacant(entry) => {
                entry.insert(());
                self.order.push(id);
            }
        }
        self.evict();
        true
    }

    pub fn contains(&self, id: &TransactionId) -> bool {
        self.seen.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    fn evict(&self) {
        let Some(capacity) = self.capacity else {
            return;
        };
        while self.seen.len() > capacity {
            match self.order.pop() {
                Some(oldest) => {
                    self.seen.remove(&oldest);
                }
                None => break,
            }
        }
    }
}

impl Default for DedupRecord {
    fn default() -> Self {
        Self::new()
    }
}
