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

//! Deduplicating poller.
//!
//! Polls the service account's history on a fixed interval and hands each
//! fresh, not yet seen transaction to the [`SwapEngine`], strictly one after
//! another in the order the ledger returned them.
//!
//! An id is recorded before dispatch, so an event whose handling fails is
//! dropped rather than retried on the next poll.

use crate::dedup::DedupRecord;
use crate::engine::{Outcome, SwapEngine};
use crate::error::{LedgerError, SwapError};
use crate::ledger::Ledger;
use crate::transaction::LedgerTransaction;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Counters for one poll.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollReport {
    /// Transactions the ledger returned.
    pub seen: usize,
    /// Already recorded in the dedup record.
    pub duplicates: usize,
    /// Too old to act on.
    pub stale: usize,
    /// Handed to the engine and handled without error.
    pub dispatched: usize,
    /// Handed to the engine and failed.
    pub failed: usize,
}

pub struct Poller {
    engine: Arc<SwapEngine>,
    ledger: Arc<dyn Ledger>,
    dedup: Arc<DedupRecord>,
    interval: Duration,
    /// Maximum event age in seconds.
    minimum_time: i64,
}

impl Poller {
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);
    pub const DEFAULT_MINIMUM_TIME: i64 = 30;

    pub fn new(engine: Arc<SwapEngine>, ledger: Arc<dyn Ledger>) -> Self {
        Self {
            engine,
            ledger,
            dedup: Arc::new(DedupRecord::new()),
            interval: Self::DEFAULT_INTERVAL,
            minimum_time: Self::DEFAULT_MINIMUM_TIME,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Sets the staleness window in seconds.
    pub fn with_minimum_time(mut self, seconds: i64) -> Self {
        self.minimum_time = seconds;
        self
    }

    pub fn with_dedup(mut self, dedup: Arc<DedupRecord>) -> Self {
        self.dedup = dedup;
        self
    }

    pub fn dedup(&self) -> &Arc<DedupRecord> {
        &self.dedup
    }

    /// Whether `tx` closed more than the staleness window before `now`.
    pub fn is_stale(&self, tx: &LedgerTransaction, now: i64) -> bool {
        now - tx.unix_time() > self.minimum_time
    }

    /// Polls once using the wall clock.
    pub async fn poll_once(&self) -> Result<PollReport, LedgerError> {
        self.poll_once_at(chrono::Utc::now().timestamp()).await
    }

    /// Polls once as if the current Unix time were `now`.
    ///
    /// # Errors
    ///
    /// Only the history query itself can fail; per-event failures are logged
    /// and counted in the report.
    pub async fn poll_once_at(&self, now: i64) -> Result<PollReport, LedgerError> {
        let batch = self
            .ledger
            .account_transactions(self.engine.service())
            .await?;
        let mut report = PollReport {
            seen: batch.len(),
            ..PollReport::default()
        };

        for tx in &batch {
            if !self.dedup.insert(tx.id.clone()) {
                report.duplicates += 1;
                continue;
            }
            if self.is_stale(tx, now) {
                debug!(tx = %tx.id, age = now - tx.unix_time(), "skipping stale event");
                report.stale += 1;
                continue;
            }

            match self.engine.handle(tx).await {
                Ok(outcome) => {
                    if outcome != Outcome::Ignored {
                        debug!(tx = %tx.id, ?outcome, "event handled");
                    }
                    report.dispatched += 1;
                }
                Err(e) => {
                    Self::log_failure(tx, &e);
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }

    /// Polls until `shutdown` resolves. A failed poll is retried on the next tick.
    pub async fn run(&self, shutdown: impl Future<Output = ()>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        info!(
            account = %self.engine.service(),
            interval_ms = self.interval.as_millis() as u64,
            minimum_time = self.minimum_time,
            "poller started"
        );
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.poll_once().await {
                        warn!(error = %e, "ledger poll failed, retrying next interval");
                    }
                }
            }
        }
        info!(processed = self.dedup.len(), "poller stopped");
    }

    fn log_failure(tx: &LedgerTransaction, e: &SwapError) {
        match e {
            SwapError::SubmissionRejected { .. } => {
                error!(tx = %tx.id, account = %tx.account, error = %e, "submission rejected, event dropped");
            }
            SwapError::SubmissionQueued { .. } => {
                error!(tx = %tx.id, account = %tx.account, error = %e, "submission outcome unknown, event needs reconciliation");
            }
            _ => {
                warn!(tx = %tx.id, account = %tx.account, error = %e, "event skipped");
            }
        }
    }
}
