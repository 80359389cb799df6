//! REST API
//!
//! Handlers parse and validate the request, then run the synchronous
//! ledger call on the blocking pool.

use crate::error::ApiError;
use crate::metrics::Metrics;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use stakeline_core::{PositionId, RewardEntry, TokenAmount, WalletKind};
use stakeline_ledger::{
    AccountStats, BootstrapOutcome, Ledger, LedgerError, LedgerResult, PositionList, StakeReceipt,
    UnlockReceipt,
};
use std::sync::Arc;
use std::time::Instant;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub ledger: Ledger,
    pub metrics: Arc<Metrics>,
    pub metrics_enabled: bool,
}

impl AppState {
    pub fn new(ledger: Ledger, metrics: Arc<Metrics>, metrics_enabled: bool) -> Self {
        Self {
            ledger,
            metrics,
            metrics_enabled,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SaveWalletRequest {
    pub wallet_address: String,
    #[serde(default)]
    pub referral_code: Option<String>,
    #[serde(default)]
    pub wallet_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ProcessStakeRequest {
    pub wallet_address: String,
    /// Number or decimal string
    #[serde(default)]
    pub amount: Value,
    #[serde(default)]
    pub tx_hash: String,
}

#[derive(Debug, Deserialize)]
pub struct UnlockRequest {
    pub wallet_address: String,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

/// Build the API router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/api/save-wallet/", post(save_wallet))
        .route("/api/user-stats/:address/", get(user_stats))
        .route("/api/staking/list/:address/", get(list_stakings))
        .route("/api/staking/process/", post(process_staking))
        .route("/api/staking/unlock/:id/", post(unlock_staking))
        .route("/api/rewards/:address/", get(reward_history))
        .with_state(state)
}

/// Run a ledger call on the blocking pool and record its outcome
async fn run<T, F>(state: &AppState, operation: &'static str, call: F) -> Result<Json<T>, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&Ledger) -> LedgerResult<T> + Send + 'static,
{
    let ledger = state.ledger.clone();
    let started = Instant::now();
    let result = tokio::task::spawn_blocking(move || call(&ledger))
        .await
        .map_err(|err| ApiError::Internal(err.to_string()))?;

    let outcome = match &result {
        Ok(_) => "ok",
        Err(err) => err.code(),
    };
    state.metrics.observe(operation, outcome, started.elapsed());

    Ok(Json(result?))
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(inner)| inner)
        .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))
}

fn parse_amount(value: &Value) -> Result<TokenAmount, ApiError> {
    TokenAmount::deserialize(value)
        .map_err(|err| LedgerError::InvalidAmount(format!("{}: {}", value, err)).into())
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "healthy" })
}

async fn metrics(State(state): State<AppState>) -> Result<Response, ApiError> {
    if !state.metrics_enabled {
        return Ok(StatusCode::NOT_FOUND.into_response());
    }
    let text = state
        .metrics
        .render()
        .map_err(|err| ApiError::Internal(err.to_string()))?;
    Ok(([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], text).into_response())
}

async fn save_wallet(
    State(state): State<AppState>,
    payload: Result<Json<SaveWalletRequest>, JsonRejection>,
) -> Result<Json<BootstrapOutcome>, ApiError> {
    let request = body(payload)?;
    let wallet_kind = match request.wallet_type.as_deref() {
        Some(kind) => kind
            .parse::<WalletKind>()
            .map_err(LedgerError::from)?,
        None => WalletKind::default(),
    };

    run(&state, "bootstrap_wallet", move |ledger| {
        ledger.bootstrap_wallet(
            &request.wallet_address,
            request.referral_code.as_deref(),
            wallet_kind,
        )
    })
    .await
}

async fn user_stats(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<AccountStats>, ApiError> {
    run(&state, "stats", move |ledger| ledger.stats(&address)).await
}

async fn list_stakings(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<PositionList>, ApiError> {
    run(&state, "list_positions", move |ledger| ledger.list_positions(&address)).await
}

async fn process_staking(
    State(state): State<AppState>,
    payload: Result<Json<ProcessStakeRequest>, JsonRejection>,
) -> Result<Json<StakeReceipt>, ApiError> {
    let request = body(payload)?;
    let amount = parse_amount(&request.amount)?;

    run(&state, "process_stake", move |ledger| {
        ledger.process_stake(&request.wallet_address, amount, &request.tx_hash)
    })
    .await
}

async fn unlock_staking(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<UnlockRequest>, JsonRejection>,
) -> Result<Json<UnlockReceipt>, ApiError> {
    let id: u64 = id
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("invalid staking id {:?}", id)))?;
    let request = body(payload)?;

    run(&state, "unlock", move |ledger| {
        ledger.unlock(PositionId(id), &request.wallet_address)
    })
    .await
}

async fn reward_history(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<Vec<RewardEntry>>, ApiError> {
    run(&state, "reward_history", move |ledger| ledger.reward_history(&address)).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amount_accepts_numbers_and_strings() {
        assert_eq!(parse_amount(&serde_json::json!(1.5)).unwrap().to_string(), "1.5");
        assert_eq!(parse_amount(&serde_json::json!("0.1")).unwrap().to_string(), "0.1");
        assert_eq!(parse_amount(&serde_json::json!(2)).unwrap().to_string(), "2");
    }

    #[test]
    fn test_amount_rejects_garbage() {
        for bad in [serde_json::json!(-1), serde_json::json!("abc"), Value::Null] {
            let err = parse_amount(&bad).unwrap_err();
            assert_eq!(err.code(), "invalid_amount");
        }
    }
}
