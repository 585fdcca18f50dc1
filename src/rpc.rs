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

//! JSON-RPC implementation of the [`Ledger`] boundary.
//!
//! Submissions use the server's sign-and-submit mode: the node autofills
//! sequence and fee and signs with the service secret, so no key material is
//! handled here beyond passing the secret along.

use crate::base::{AccountId, IssuanceId, TransactionId, TxHash};
use crate::error::LedgerError;
use crate::ledger::{AggregatePrice, Ledger, OracleRef, SubmitOutcome, TxIntent};
use crate::transaction::{DeliveredAmount, LedgerTransaction, TransactionKind};
use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{Value, json};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

/// Ledger API version the parsers below expect.
const API_VERSION: u8 = 2;

/// Upper bound on transactions fetched per history query.
const HISTORY_LIMIT: u32 = 200;

pub struct JsonRpcLedger {
    http: Client,
    url: String,
    account: AccountId,
    secret: String,
}

impl fmt::Debug for JsonRpcLedger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonRpcLedger")
            .field("url", &self.url)
            .field("account", &self.account)
            .finish_non_exhaustive()
    }
}

impl JsonRpcLedger {
    pub fn new(url: impl Into<String>, account: AccountId, secret: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            url: url.into(),
            account,
            secret: secret.into(),
        }
    }

    /// Confirms the endpoint is reachable and the service account exists.
    pub async fn check_account(&self) -> Result<(), LedgerError> {
        self.call(
            "account_info",
            json!({
                "account": self.account,
                "ledger_index": "validated",
                "strict": true,
            }),
        )
        .await
        .map(|_| ())
    }

    async fn call(&self, method: &'static str, params: Value) -> Result<Value, LedgerError> {
        debug!(method, "ledger request");
        let response: RpcResponse = self
            .http
            .post(&self.url)
            .json(&json!({ "method": method, "params": [params] }))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        check_status(method, response.result)
    }

    fn tx_json(&self, intent: &TxIntent) -> Value {
        match intent {
            TxIntent::CreateIssuance { metadata } => json!({
                "TransactionType": "MPTokenIssuanceCreate",
                "Account": self.account,
                "MPTokenMetadata": hex::encode_upper(metadata),
            }),
            TxIntent::TransferIssuance {
                issuance,
                destination,
                quantity,
            } => json!({
                "TransactionType": "Payment",
                "Account": self.account,
                "Destination": destination,
                "Amount": {
                    "mpt_issuance_id": issuance,
                    "value": quantity.to_string(),
                },
            }),
            TxIntent::Pay {
                destination,
                quantity,
            } => json!({
                "TransactionType": "Payment",
                "Account": self.account,
                "Destination": destination,
                "Amount": quantity.to_string(),
            }),
        }
    }
}

#[async_trait]
impl Ledger for JsonRpcLedger {
    async fn account_transactions(
        &self,
        account: &AccountId,
    ) -> Result<Vec<LedgerTransaction>, LedgerError> {
        let result = self
            .call(
                "account_tx",
                json!({
                    "account": account,
                    "ledger_index_min": -1,
                    "ledger_index_max": -1,
                    "limit": HISTORY_LIMIT,
                    "api_version": API_VERSION,
                }),
            )
            .await?;
        let entries = result
            .get("transactions")
            .and_then(Value::as_array)
            .ok_or_else(|| LedgerError::Malformed("account_tx without transactions".into()))?;

        // A single unreadable record must not hide the rest of the batch.
        let mut transactions = Vec::with_capacity(entries.len());
        for entry in entries {
            match parse_transaction(entry) {
                Ok(tx) => transactions.push(tx),
                Err(e) => warn!(error = %e, "skipping unreadable ledger record"),
            }
        }
        Ok(transactions)
    }

    async fn transaction(&self, hash: &TxHash) -> Result<LedgerTransaction, LedgerError> {
        let result = self
            .call(
                "tx",
                json!({ "transaction": hash, "api_version": API_VERSION }),
            )
            .await?;
        parse_transaction(&result)
    }

    async fn issuance_metadata(&self, issuance: &IssuanceId) -> Result<Vec<u8>, LedgerError> {
        let result = self
            .call(
                "ledger_entry",
                json!({ "mpt_issuance": issuance, "ledger_index": "validated" }),
            )
            .await?;
        let encoded = result
            .pointer("/node/MPTokenMetadata")
            .and_then(Value::as_str)
            .ok_or_else(|| LedgerError::Malformed(format!("issuance {issuance} has no metadata")))?;
        hex::decode(encoded)
            .map_err(|e| LedgerError::Malformed(format!("issuance {issuance} metadata: {e}")))
    }

    async fn submit(&self, intent: TxIntent) -> Result<SubmitOutcome, LedgerError> {
        let result = self
            .call(
                "submit",
                json!({ "tx_json": self.tx_json(&intent), "secret": self.secret }),
            )
            .await?;
        parse_submit(&result)
    }

    async fn aggregate_price(&self, oracle: &OracleRef) -> Result<AggregatePrice, LedgerError> {
        let result = self
            .call(
                "get_aggregate_price",
                json!({
                    "base_asset": oracle.base_asset,
                    "quote_asset": oracle.quote_asset,
                    "oracles": [{
                        "account": oracle.account,
                        "oracle_document_id": oracle.document_id,
                    }],
                    "ledger_index": "validated",
                }),
            )
            .await?;
        parse_aggregate(&result)
    }
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: Value,
}

fn check_status(method: &'static str, result: Value) -> Result<Value, LedgerError> {
    if result.get("status").and_then(Value::as_str) != Some("error") {
        return Ok(result);
    }
    let code = result
        .get("error")
        .and_then(Value::as_str)
        .unwrap_or("unknown")
        .to_string();
    let not_found = matches!(
        code.as_str(),
        "txnNotFound" | "entryNotFound" | "objectNotFound" | "actNotFound"
    );
    if not_found {
        return Err(LedgerError::NotFound(format!("{method}: {code}")));
    }
    let message = match result.get("error_message").and_then(Value::as_str) {
        Some(detail) => format!("{code}: {detail}"),
        None => code,
    };
    Err(LedgerError::Rpc { method, message })
}

/// Transaction body as returned under `tx_json`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawTx {
    transaction_type: String,
    account: String,
    destination: Option<String>,
    deliver_max: Option<RawAmount>,
    amount: Option<RawAmount>,
    #[serde(rename = "MPTokenIssuanceID")]
    issuance_id: Option<String>,
    #[serde(rename = "date")]
    date: Option<i64>,
    #[serde(rename = "ctid")]
    ctid: Option<String>,
    #[serde(rename = "hash")]
    hash: Option<String>,
}

/// History entry: `tx_json` plus the fields the node adds around it.
#[derive(Debug, Deserialize)]
struct RawEntry {
    tx_json: RawTx,
    meta: Option<RawMeta>,
    hash: Option<String>,
    ctid: Option<String>,
    date: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct RawMeta {
    delivered_amount: Option<RawAmount>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RawAmount {
    Drops(String),
    Issued {
        mpt_issuance_id: String,
        value: String,
    },
    Other(serde::de::IgnoredAny),
}

fn parse_quantity(value: &str) -> Result<u64, LedgerError> {
    value
        .parse()
        .map_err(|_| LedgerError::Malformed(format!("unparseable quantity {value:?}")))
}

fn parse_amount(amount: RawAmount) -> Result<Option<DeliveredAmount>, LedgerError> {
    match amount {
        RawAmount::Drops(drops) => Ok(Some(DeliveredAmount::Native(parse_quantity(&drops)?))),
        RawAmount::Issued {
            mpt_issuance_id,
            value,
        } => Ok(Some(DeliveredAmount::Issued {
            issuance: IssuanceId(mpt_issuance_id),
            quantity: parse_quantity(&value)?,
        })),
        // Trust-line currencies are not part of the swap.
        RawAmount::Other(_) => Ok(None),
    }
}

fn parse_transaction(value: &Value) -> Result<LedgerTransaction, LedgerError> {
    let entry: RawEntry = serde_json::from_value(value.clone())
        .map_err(|e| LedgerError::Malformed(format!("transaction record: {e}")))?;
    let raw = entry.tx_json;

    let hash = entry
        .hash
        .or(raw.hash)
        .ok_or_else(|| LedgerError::Malformed("transaction without hash".into()))?;
    // Older ledgers carry no compact id; the hash is just as unique.
    let id = entry.ctid.or(raw.ctid).unwrap_or_else(|| hash.clone());
    let timestamp = entry
        .date
        .or(raw.date)
        .ok_or_else(|| LedgerError::Malformed(format!("transaction {hash} without date")))?;

    // Delivered amount accounts for partial payments; fall back to the request.
    let delivered = match entry
        .meta
        .and_then(|meta| meta.delivered_amount)
        .or(raw.deliver_max)
        .or(raw.amount)
    {
        Some(amount) => parse_amount(amount)?,
        None => None,
    };

    Ok(LedgerTransaction {
        id: TransactionId(id),
        hash: TxHash(hash),
        timestamp,
        kind: TransactionKind::from_ledger_name(&raw.transaction_type),
        account: AccountId(raw.account),
        destination: raw.destination.map(AccountId),
        delivered,
        issuance: raw.issuance_id.map(IssuanceId),
    })
}

fn parse_submit(result: &Value) -> Result<SubmitOutcome, LedgerError> {
    let field = |pointer: &str| {
        result
            .pointer(pointer)
            .ok_or_else(|| LedgerError::Malformed(format!("submit result without {pointer}")))
    };
    let engine_result = field("/engine_result")?
        .as_str()
        .unwrap_or_default()
        .to_string();
    let account = field("/tx_json/Account")?
        .as_str()
        .map(AccountId::new)
        .ok_or_else(|| LedgerError::Malformed("submit account is not a string".into()))?;
    let sequence = field("/tx_json/Sequence")?
        .as_u64()
        .and_then(|seq| u32::try_from(seq).ok())
        .ok_or_else(|| LedgerError::Malformed("submit sequence is not a u32".into()))?;
    let hash = field("/tx_json/hash")?
        .as_str()
        .map(|h| TxHash(h.to_string()))
        .ok_or_else(|| LedgerError::Malformed("submit hash is not a string".into()))?;

    Ok(SubmitOutcome {
        engine_result,
        account,
        sequence,
        hash,
    })
}

fn parse_aggregate(result: &Value) -> Result<AggregatePrice, LedgerError> {
    let mean = result
        .pointer("/entire_set/mean")
        .and_then(|mean| match mean {
            Value::String(s) => Decimal::from_str(s).ok(),
            Value::Number(n) => Decimal::from_str(&n.to_string()).ok(),
            _ => None,
        })
        .ok_or_else(|| LedgerError::Malformed("aggregate price without mean".into()))?;
    let size = result
        .pointer("/entire_set/size")
        .and_then(Value::as_u64)
        .and_then(|size| u32::try_from(size).ok())
        .ok_or_else(|| LedgerError::Malformed("aggregate price without size".into()))?;
    Ok(AggregatePrice { mean, size })
}
