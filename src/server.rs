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

//! Query interface over the pending issuance directory.
//!
//! ## Endpoints
//!
//! - `GET /iss?iss_id=<depositor>` - issuance created for the depositor's latest deposit
//!
//! ```bash
//! curl 'http://127.0.0.1:5000/iss?iss_id=rDepositor'
//! # {"mpt":"00000005B5F762798A53D543A014CAF8B297CFF8F2F937E8"}
//! curl 'http://127.0.0.1:5000/iss?iss_id=rUnknown'
//! # {"mpt":0}
//! ```
//!
//! Unauthenticated and not rate limited: the directory only holds data the
//! ledger already makes public.

use crate::base::{AccountId, IssuanceId};
use crate::directory::PendingIssuanceDirectory;
use axum::{
    Json, Router,
    extract::{Query, State},
    routing::get,
};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::debug;

/// Shared state handed to the handlers.
#[derive(Clone)]
pub struct AppState {
    pub directory: Arc<PendingIssuanceDirectory>,
}

/// Query string of `GET /iss`.
#[derive(Debug, Deserialize)]
pub struct IssuanceQuery {
    /// Directory key; the depositor's account, despite the name.
    pub iss_id: Option<String>,
}

/// `"<issuance id>"` on a hit, `0` on a miss.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MptField {
    Issued(IssuanceId),
    Missing(u8),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuanceResponse {
    pub mpt: MptField,
}

impl IssuanceResponse {
    pub fn hit(issuance: IssuanceId) -> Self {
        Self {
            mpt: MptField::Issued(issuance),
        }
    }

    pub fn miss() -> Self {
        Self {
            mpt: MptField::Missing(0),
        }
    }
}

/// GET /iss - Look up the pending issuance of a depositor.
async fn get_issuance(
    State(state): State<AppState>,
    Query(query): Query<IssuanceQuery>,
) -> Json<IssuanceResponse> {
    let found = query
        .iss_id
        .map(AccountId)
        .and_then(|depositor| state.directory.get(&depositor));

    match found {
        Some(issuance) => Json(IssuanceResponse::hit(issuance)),
        None => {
            debug!("no pending issuance");
            Json(IssuanceResponse::miss())
        }
    }
}

pub fn router(directory: Arc<PendingIssuanceDirectory>) -> Router {
    Router::new()
        .route("/iss", get(get_issuance))
        .with_state(AppState { directory })
}

/// Serves the query interface on `listener` until `shutdown` resolves.
pub async fn serve(
    listener: TcpListener,
    directory: Arc<PendingIssuanceDirectory>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    axum::serve(listener, router(directory))
        .with_graceful_shutdown(shutdown)
        .await
}
