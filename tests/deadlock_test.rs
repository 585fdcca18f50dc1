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

//! Deadlock detection tests using parking_lot's built-in deadlock detector.
//!
//! The swap book, directory, dedup record and audit log are shared between
//! the poll loop and the query interface. These tests hammer them from many
//! threads with the `deadlock_detection` feature enabled, so any cycle in the
//! lock graph is reported.

use parking_lot::deadlock;
use peg_swap::{
    AccountId, AuditLog, AuditRecord, DedupRecord, ExchangeRate, IssuanceId, Leg,
    PendingIssuanceDirectory, Swap, SwapBook, SwapEvent, SwapState, TransactionId, TxHash,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

// === Deadlock Detection Infrastructure ===

/// Starts a background thread that checks for deadlocks.
/// Returns a handle to stop the detector.
fn start_deadlock_detector() -> Arc<AtomicBool> {
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = running.clone();

    thread::spawn(move || {
        while running_clone.load(Ordering::SeqCst) {
            thread::sleep(Duration::from_millis(100));
            let deadlocks = deadlock::check_deadlock();
            if !deadlocks.is_empty() {
                eprintln!("\n=== DEADLOCK DETECTED ===");
                for (i, threads) in deadlocks.iter().enumerate() {
                    eprintln!("\nDeadlock #{}", i + 1);
                    for t in threads {
                        eprintln!("Thread ID: {:?}", t.thread_id());
                        eprintln!("Backtrace:\n{:#?}", t.backtrace());
                    }
                }
                panic!("Deadlock detected! See output above for details.");
            }
        }
    });

    running
}

/// Stops the deadlock detector.
fn stop_deadlock_detector(running: Arc<AtomicBool>) {
    running.store(false, Ordering::SeqCst);
    thread::sleep(Duration::from_millis(150));
}

fn issuance(n: usize) -> IssuanceId {
    IssuanceId::derive(n as u32, &[0xB5; 20])
}

fn swap(depositor: &str) -> Swap {
    Swap::new(
        AccountId::new(depositor),
        TxHash(format!("DEPOSIT-{depositor}")),
        995,
        ExchangeRate::new(15_000).unwrap(),
    )
}

// === Tests ===

/// Each thread drives its own swaps through the lifecycle while reading others.
#[test]
fn no_deadlock_independent_lifecycles() {
    let detector = start_deadlock_detector();
    let book = Arc::new(SwapBook::new());

    const NUM_THREADS: usize = 32;
    const SWAPS_PER_THREAD: usize = 50;

    let mut handles = Vec::with_capacity(NUM_THREADS);
    for t in 0..NUM_THREADS {
        let book = book.clone();
        handles.push(thread::spawn(move || {
            let depositor = format!("rDepositor{t}");
            for s in 0..SWAPS_PER_THREAD {
                let id = issuance(t * SWAPS_PER_THREAD + s);
                book.track(id.clone(), swap(&depositor));
                book.advance(&id, SwapEvent::IssuanceAccepted).unwrap();
                book.authorization_target(&id, &AccountId::new(depositor.as_str()))
                    .unwrap();
                book.advance(&id, SwapEvent::Authorize).unwrap();
                book.return_target(&id).unwrap();
                book.advance(&id, SwapEvent::Return { quantity: 500 }).unwrap();
                book.return_target(&id).unwrap();
                book.advance(&id, SwapEvent::Return { quantity: 495 }).unwrap();

                // Peek at a neighbour's swap, whatever state it is in.
                let _ = book.snapshot(&issuance((t + 1) % NUM_THREADS * SWAPS_PER_THREAD));
            }
        }));
    }

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    stop_deadlock_detector(detector);

    assert_eq!(book.len(), NUM_THREADS * SWAPS_PER_THREAD);
    for n in 0..NUM_THREADS * SWAPS_PER_THREAD {
        assert_eq!(book.snapshot(&issuance(n)).unwrap().state, SwapState::Settled);
    }
}

/// Racing the same step on one swap lets exactly one thread through.
#[test]
fn no_deadlock_racing_same_transition() {
    let detector = start_deadlock_detector();
    let book = Arc::new(SwapBook::new());
    let id = issuance(1);
    book.track(id.clone(), swap("rDepositor"));
    book.advance(&id, SwapEvent::IssuanceAccepted).unwrap();

    let winners = Arc::new(AtomicUsize::new(0));
    let mut handles = Vec::new();
    for _ in 0..50 {
        let book = book.clone();
        let id = id.clone();
        let winners = winners.clone();
        handles.push(thread::spawn(move || {
            if book.advance(&id, SwapEvent::Authorize).is_ok() {
                winners.fetch_add(1, Ordering::SeqCst);
            }
        }));
    }

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    stop_deadlock_detector(detector);

    assert_eq!(winners.load(Ordering::SeqCst), 1);
    assert_eq!(book.snapshot(&id).unwrap().state, SwapState::Authorized);
}

/// Concurrent partial returns against one swap. Only returns up to the issued
/// quantity are accepted and none of them is lost.
#[test]
fn no_deadlock_concurrent_partial_returns() {
    let detector = start_deadlock_detector();
    let book = Arc::new(SwapBook::new());
    let id = issuance(1);
    book.track(id.clone(), swap("rDepositor"));
    book.advance(&id, SwapEvent::IssuanceAccepted).unwrap();
    book.advance(&id, SwapEvent::Authorize).unwrap();

    let accepted = Arc::new(AtomicUsize::new(0));
    let mut handles = Vec::new();
    for _ in 0..60 {
        let book = book.clone();
        let id = id.clone();
        let accepted = accepted.clone();
        handles.push(thread::spawn(move || {
            if book.advance(&id, SwapEvent::Return { quantity: 20 }).is_ok() {
                accepted.fetch_add(1, Ordering::SeqCst);
            }
        }));
    }

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    stop_deadlock_detector(detector);

    // 50 * 20 is the first total to reach 995.
    assert_eq!(accepted.load(Ordering::SeqCst), 50);
    let snapshot = book.snapshot(&id).unwrap();
    assert_eq!(snapshot.state, SwapState::Settled);
    assert_eq!(snapshot.returned, 1000);
}

/// Directory lookups from the query side while the poll side overwrites entries.
#[test]
fn no_deadlock_directory_reads_during_writes() {
    let detector = start_deadlock_detector();
    let directory = Arc::new(PendingIssuanceDirectory::new());
    let running = Arc::new(AtomicBool::new(true));

    let mut handles = Vec::new();
    for writer in 0..4 {
        let directory = directory.clone();
        handles.push(thread::spawn(move || {
            for n in 0..500 {
                let depositor = AccountId::new(format!("rDepositor{}", n % 20));
                directory.set(depositor, issuance(writer * 1000 + n));
                thread::yield_now();
            }
        }));
    }

    let lookups = Arc::new(AtomicUsize::new(0));
    for _ in 0..8 {
        let directory = directory.clone();
        let running = running.clone();
        let lookups = lookups.clone();
        handles.push(thread::spawn(move || {
            while running.load(Ordering::SeqCst) {
                for n in 0..20 {
                    if let Some(id) = directory.get(&AccountId::new(format!("rDepositor{n}"))) {
                        assert_eq!(id.as_str().len(), IssuanceId::LEN);
                    }
                    lookups.fetch_add(1, Ordering::Relaxed);
                }
                thread::yield_now();
            }
        }));
    }

    thread::sleep(Duration::from_millis(300));
    running.store(false, Ordering::SeqCst);

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    stop_deadlock_detector(detector);

    assert_eq!(directory.len(), 20);
    assert!(lookups.load(Ordering::Relaxed) > 0);
}

/// Overlapping redeliveries from many threads are accepted once in total.
#[test]
fn no_deadlock_concurrent_redelivery() {
    let detector = start_deadlock_detector();
    let dedup = Arc::new(DedupRecord::new());
    let accepted = Arc::new(AtomicUsize::new(0));

    const DISTINCT: usize = 1_000;

    let mut handles = Vec::new();
    for _ in 0..16 {
        let dedup = dedup.clone();
        let accepted = accepted.clone();
        handles.push(thread::spawn(move || {
            for n in 0..DISTINCT {
                if dedup.insert(TransactionId(format!("C{n:015X}"))) {
                    accepted.fetch_add(1, Ordering::SeqCst);
                }
            }
        }));
    }

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    stop_deadlock_detector(detector);

    assert_eq!(accepted.load(Ordering::SeqCst), DISTINCT);
    assert_eq!(dedup.len(), DISTINCT);
}

/// Concurrent audit writes never interleave within a row.
#[test]
fn no_deadlock_concurrent_audit_writes() {
    let detector = start_deadlock_detector();
    let file = tempfile::NamedTempFile::new().unwrap();
    let log = Arc::new(AuditLog::append_to(file.path()).unwrap());

    const NUM_THREADS: usize = 8;
    const ROWS_PER_THREAD: usize = 100;

    let mut handles = Vec::new();
    for t in 0..NUM_THREADS {
        let log = log.clone();
        handles.push(thread::spawn(move || {
            for n in 0..ROWS_PER_THREAD {
                log.record(&AuditRecord {
                    transaction_id: TransactionId(format!("C{t}-{n}")),
                    leg: Leg::Transfer,
                    account: AccountId::new(format!("rDepositor{t}")),
                    issuance_id: Some(issuance(t)),
                    quantity: 995,
                    locked_rate: None,
                    current_rate: None,
                    payout: 995,
                })
                .unwrap();
            }
        }));
    }

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    stop_deadlock_detector(detector);

    let content = std::fs::read_to_string(file.path()).unwrap();
    let rows: Vec<_> = content.lines().skip(1).collect();
    assert_eq!(rows.len(), NUM_THREADS * ROWS_PER_THREAD);
    assert!(rows.iter().all(|row| row.split(',').count() == 8));
}
