//! # API Gateway Handler
//!
//! Core handler struct and methods for API Gateway integration.

use super::types::{ApiResponse, EntryView, ReferenceRequest, ReversalRequest};
use crate::domain::entry::{AccountId, SequenceNumber};
use crate::domain::errors::{ChainStoreError, LedgerError, VerifyError};
use crate::ports::inbound::{LedgerApi, TransferRequest};
use thiserror::Error;
use tokio::sync::watch;

/// API Gateway handler for the ledger.
///
/// Wraps a LedgerApi implementation and turns results into status codes and
/// JSON bodies.
pub struct ApiGatewayHandler<S: LedgerApi> {
    service: S,
}

impl<S: LedgerApi> ApiGatewayHandler<S> {
    pub fn new(service: S) -> Self {
        Self { service }
    }

    /// `POST /transactions` - 201 when appended, 200 when already recorded.
    pub async fn handle_record(&self, body: &serde_json::Value) -> ApiResponse {
        let request: TransferRequest = match serde_json::from_value(body.clone()) {
            Ok(request) => request,
            Err(e) => return ApiQueryError::InvalidParams(e.to_string()).into(),
        };

        match self.service.record(request).await {
            Ok(recorded) => {
                let status = if recorded.created { 201 } else { 200 };
                ApiResponse::new(status, entry_json(&recorded.entry))
            }
            Err(e) => ledger_error_response(&e),
        }
    }

    /// `POST /reversals`
    pub async fn handle_reverse(&self, body: &serde_json::Value) -> ApiResponse {
        let request: ReversalRequest = match serde_json::from_value(body.clone()) {
            Ok(request) => request,
            Err(e) => return ApiQueryError::InvalidParams(e.to_string()).into(),
        };

        match self
            .service
            .reverse_transaction(
                &request.original_transaction_id,
                &request.reversal_transaction_id,
                &request.reason,
            )
            .await
        {
            Ok(recorded) => {
                let status = if recorded.created { 201 } else { 200 };
                ApiResponse::new(status, entry_json(&recorded.entry))
            }
            Err(e) => ledger_error_response(&e),
        }
    }

    /// `PUT /transactions/{id}/reference`
    pub fn handle_attach_reference(&self, body: &serde_json::Value) -> ApiResponse {
        let request: ReferenceRequest = match serde_json::from_value(body.clone()) {
            Ok(request) => request,
            Err(e) => return ApiQueryError::InvalidParams(e.to_string()).into(),
        };

        match self
            .service
            .attach_external_reference(&request.transaction_id, &request.reference)
        {
            Ok(entry) => ApiResponse::ok(entry_json(&entry)),
            Err(e) => ledger_error_response(&e),
        }
    }

    /// `GET /accounts/{id}/history` - 404 when the account has no entries.
    pub fn handle_history(&self, account: AccountId) -> ApiResponse {
        let entries: Result<Vec<_>, _> = self.service.get_account_history(account).collect();
        match entries {
            Ok(entries) if entries.is_empty() => {
                ApiResponse::error(404, "unknownAccount", format!("no entries for account {}", account))
            }
            Ok(entries) => {
                let views: Vec<EntryView> = entries.iter().map(EntryView::from).collect();
                ApiResponse::ok(serde_json::json!({
                    "accountId": account.0,
                    "entries": views,
                }))
            }
            Err(e) => ledger_error_response(&e),
        }
    }

    /// `GET /accounts/{id}/balance`
    pub fn handle_balance(&self, account: AccountId) -> ApiResponse {
        match self.service.get_balance(account) {
            Ok(balance) => {
                // Balances beyond i64 are rendered as decimal strings.
                let balance = match i64::try_from(balance) {
                    Ok(b) => serde_json::json!(b),
                    Err(_) => serde_json::json!(balance.to_string()),
                };
                ApiResponse::ok(serde_json::json!({
                    "accountId": account.0,
                    "balance": balance,
                }))
            }
            Err(e) => ledger_error_response(&e),
        }
    }

    /// `GET /verify?fromSeq&toSeq` - 200 with `ok` or the violation found.
    pub fn handle_verify(&self, from: Option<SequenceNumber>, to: Option<SequenceNumber>) -> ApiResponse {
        match self.service.verify_integrity(from, to) {
            Ok(()) => ApiResponse::ok(serde_json::json!({ "ok": true })),
            Err(VerifyError::Violation(violation)) => ApiResponse::ok(serde_json::json!({
                "ok": false,
                "violation": violation,
            })),
            Err(e @ VerifyError::Store(ChainStoreError::Range { .. })) => {
                ApiResponse::error(400, "invalidRange", e)
            }
            Err(e @ VerifyError::Cancelled { .. }) => ApiResponse::error(503, "cancelled", e),
            Err(e @ VerifyError::Store(_)) => ApiResponse::error(500, "storage", e),
        }
    }

    /// Full-chain audit reporting every violation found.
    pub async fn handle_verify_full(&self, cancel: watch::Receiver<bool>) -> ApiResponse {
        match self.service.verify_full(cancel).await {
            Ok(report) => ApiResponse::ok(serde_json::json!({
                "ok": report.is_clean(),
                "report": report,
            })),
            Err(e @ VerifyError::Cancelled { .. }) => ApiResponse::error(503, "cancelled", e),
            Err(e) => {
                tracing::error!("[ledger] full verification failed: {}", e);
                ApiResponse::error(500, "storage", e)
            }
        }
    }

    /// `GET /tip`
    pub fn handle_tip(&self) -> ApiResponse {
        match self.service.tip() {
            Ok(Some(entry)) => ApiResponse::ok(entry_json(&entry)),
            Ok(None) => ApiResponse::ok(serde_json::json!({ "tip": null })),
            Err(e) => ledger_error_response(&e),
        }
    }

    /// Get reference to underlying service
    pub fn service(&self) -> &S {
        &self.service
    }
}

fn entry_json(entry: &crate::domain::entry::LedgerEntry) -> serde_json::Value {
    serde_json::to_value(EntryView::from(entry)).unwrap_or_default()
}

/// Status code and error kind for a service error.
pub(crate) fn ledger_error_status(err: &LedgerError) -> (u16, &'static str) {
    match err {
        LedgerError::InvalidAmount { .. } => (400, "invalidAmount"),
        LedgerError::SelfTransfer { .. } => (400, "selfTransfer"),
        LedgerError::Encoding(_) => (400, "invalidEntry"),
        LedgerError::TransactionConflict { .. } => (409, "duplicateTransaction"),
        LedgerError::AlreadyReversed { .. } => (409, "alreadyReversed"),
        LedgerError::CannotReverseReversal { .. } => (409, "cannotReverseReversal"),
        LedgerError::ExternalReferenceConflict { .. } => (409, "externalReferenceConflict"),
        LedgerError::TransactionNotFound { .. } => (404, "transactionNotFound"),
        LedgerError::RetriesExhausted { .. } => (503, "busy"),
        LedgerError::Store(ChainStoreError::Range { .. }) => (400, "invalidRange"),
        LedgerError::Store(_) => (500, "storage"),
    }
}

fn ledger_error_response(err: &LedgerError) -> ApiResponse {
    let (status, kind) = ledger_error_status(err);
    if status >= 500 {
        tracing::error!("[ledger] API request failed: {}", err);
    }
    ApiResponse::error(status, kind, err)
}

/// API query error types.
#[derive(Debug, Error)]
pub enum ApiQueryError {
    #[error("Unknown method: {0}")]
    UnknownMethod(String),

    #[error("Invalid params: {0}")]
    InvalidParams(String),
}

impl From<ApiQueryError> for ApiResponse {
    fn from(err: ApiQueryError) -> Self {
        match err {
            ApiQueryError::UnknownMethod(_) => ApiResponse::error(404, "unknownMethod", err),
            ApiQueryError::InvalidParams(_) => ApiResponse::error(400, "invalidParams", err),
        }
    }
}

fn account_param(params: &serde_json::Value) -> Result<AccountId, ApiQueryError> {
    params
        .get("accountId")
        .and_then(|v| v.as_u64())
        .map(AccountId)
        .ok_or_else(|| ApiQueryError::InvalidParams("accountId must be an unsigned integer".into()))
}

fn optional_seq(params: &serde_json::Value, name: &str) -> Result<Option<SequenceNumber>, ApiQueryError> {
    match params.get(name) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(v) => v
            .as_u64()
            .map(Some)
            .ok_or_else(|| ApiQueryError::InvalidParams(format!("{} must be an unsigned integer", name))),
    }
}

/// Handle an API query from the API Gateway.
///
/// Dispatches on the method name.
pub async fn handle_api_query<S: LedgerApi>(
    handler: &ApiGatewayHandler<S>,
    method: &str,
    params: &serde_json::Value,
) -> ApiResponse {
    let result = match method {
        "ledger_recordTransaction" => return handler.handle_record(params).await,
        "ledger_reverseTransaction" => return handler.handle_reverse(params).await,
        "ledger_attachReference" => return handler.handle_attach_reference(params),
        "ledger_getHistory" => account_param(params).map(|a| handler.handle_history(a)),
        "ledger_getBalance" => account_param(params).map(|a| handler.handle_balance(a)),
        "ledger_verify" => optional_seq(params, "fromSeq")
            .and_then(|from| Ok((from, optional_seq(params, "toSeq")?)))
            .map(|(from, to)| handler.handle_verify(from, to)),
        "ledger_tip" => Ok(handler.handle_tip()),
        "ping" => Ok(ApiResponse::ok(serde_json::json!({
            "result": "pong",
            "subsystem": "fl-01-ledger-chain",
        }))),
        _ => Err(ApiQueryError::UnknownMethod(method.to_string())),
    };
    result.unwrap_or_else(ApiResponse::from)
}
