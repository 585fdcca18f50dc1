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

use anyhow::Context;
use clap::Parser;
use peg_swap::{
    AuditLog, Config, DedupRecord, JsonRpcLedger, Ledger, LedgerRateOracle,
    PendingIssuanceDirectory, Poller, SwapEngine, server,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Config::parse();
    config.validate().context("invalid configuration")?;

    let service = config.service_account();
    let rpc = JsonRpcLedger::new(
        config.ledger_url.clone(),
        service.clone(),
        config.service_secret.clone(),
    );
    rpc.check_account().await.with_context(|| {
        format!("cannot reach service account {service} at {}", config.ledger_url)
    })?;
    let ledger: Arc<dyn Ledger> = Arc::new(rpc);

    let oracle = Arc::new(LedgerRateOracle::new(Arc::clone(&ledger), config.oracle()));
    let directory = Arc::new(PendingIssuanceDirectory::new());
    let mut engine = SwapEngine::new(service.clone(), Arc::clone(&ledger), oracle)
        .with_fees(config.fees()?)
        .with_directory(Arc::clone(&directory));
    if let Some(path) = &config.audit_log {
        let audit = AuditLog::append_to(path)
            .with_context(|| format!("cannot open audit log {}", path.display()))?;
        engine = engine.with_audit(Arc::new(audit));
    }

    let dedup = match config.dedup_capacity {
        Some(capacity) => DedupRecord::bounded(capacity),
        None => DedupRecord::new(),
    };
    let poller = Poller::new(Arc::new(engine), ledger)
        .with_interval(config.poll_interval())
        .with_minimum_time(config.minimum_time_secs)
        .with_dedup(Arc::new(dedup));

    let listener = TcpListener::bind(config.listen)
        .await
        .with_context(|| format!("cannot bind {}", config.listen))?;
    info!(addr = %config.listen, "query interface listening");

    let (stop_tx, stop_rx) = watch::channel(false);
    let mut server_stop = stop_rx.clone();
    let server = tokio::spawn(server::serve(listener, directory, async move {
        let _ = server_stop.wait_for(|stop| *stop).await;
    }));

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            // Keep the sender alive: dropping it would stop the service.
            error!(error = %e, "cannot listen for shutdown signal");
            std::future::pending::<()>().await;
        }
        info!("shutting down");
        let _ = stop_tx.send(true);
    });

    let mut poller_stop = stop_rx;
    poller
        .run(async move {
            let _ = poller_stop.wait_for(|stop| *stop).await;
        })
        .await;

    server.await?.context("query interface failed")?;
    Ok(())
}
