//! HTTP handlers

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
};
use serde::Serialize;

use super::auth::CurrentUser;
use super::state::AppState;
use super::types::{ApiResponse, ApiResult, error_codes, ok};
use crate::core_types::{AccountId, TransactionId};
use crate::transfer::api::{self, ApiRejection, HistoryQuery, TransactionApiResponse, TransferApiRequest};

pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";

fn into_response((status, body): ApiRejection) -> (StatusCode, Json<ApiResponse<()>>) {
    (status, Json(body))
}

/// POST /api/v1/accounts/{account_id}/transfers
pub async fn create_transfer(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(account_id): Path<AccountId>,
    headers: HeaderMap,
    Json(req): Json<TransferApiRequest>,
) -> ApiResult<TransactionApiResponse> {
    let header_key =
        api::header_idempotency_key(headers.get(IDEMPOTENCY_KEY_HEADER)).map_err(into_response)?;

    tracing::debug!(
        user_id = user.0,
        from_account = account_id,
        to_account_number = %req.to_account_number,
        amount = %req.amount,
        "Transfer request"
    );

    let resp = api::create_transfer(&state.service, user.0, account_id, req, header_key)
        .await
        .map_err(into_response)?;
    ok(resp)
}

/// GET /api/v1/accounts/{account_id}/transactions
pub async fn list_transactions(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(account_id): Path<AccountId>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Vec<TransactionApiResponse>> {
    let resp = api::list_transactions(&state.service, user.0, account_id, query)
        .await
        .map_err(into_response)?;
    ok(resp)
}

/// GET /api/v1/transactions/{transaction_id}
pub async fn get_transaction(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(transaction_id): Path<TransactionId>,
) -> ApiResult<TransactionApiResponse> {
    let resp = api::get_transaction(&state.service, user.0, transaction_id)
        .await
        .map_err(into_response)?;
    ok(resp)
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub version: &'static str,
}

/// GET /health
///
/// Storage failures are logged, never exposed.
pub async fn health_check(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<ApiResponse<HealthResponse>>) {
    match state.service.executor().store().health_check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse::success(HealthResponse {
                version: env!("CARGO_PKG_VERSION"),
            })),
        ),
        Err(e) => {
            tracing::error!(error = %e, "[HEALTH] storage check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiResponse {
                    code: error_codes::SERVICE_UNAVAILABLE,
                    msg: "unavailable".to_string(),
                    data: None,
                }),
            )
        }
    }
}
