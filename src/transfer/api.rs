//! Transfer API Layer
//!
//! Transport DTOs and the mapping from domain results to HTTP responses.
//! Amounts cross the boundary as strings.

use std::str::FromStr;

use axum::http::{HeaderValue, StatusCode};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::error::{ErrorKind, TransferError};
use super::service::LedgerService;
use super::types::{TransactionRecord, TransferRequest, validate_amount};
use crate::account::AccountNumber;
use crate::core_types::{AccountId, TransactionId, UserId};
use crate::gateway::types::{ApiResponse, error_codes};

// ============================================================================
// API Request/Response Types
// ============================================================================

/// Body of `POST /api/v1/accounts/{account_id}/transfers`
#[derive(Debug, Deserialize, Validate)]
pub struct TransferApiRequest {
    #[validate(length(equal = 10))]
    pub to_account_number: String,
    /// Amount as string (no float precision loss)
    pub amount: String,
    #[serde(default)]
    #[validate(length(max = 255))]
    pub description: Option<String>,
    #[serde(default)]
    #[validate(length(min = 1, max = 64))]
    pub idempotency_key: Option<String>,
}

/// Ledger entry as returned to API callers
#[derive(Debug, Serialize)]
pub struct TransactionApiResponse {
    pub id: TransactionId,
    pub reference: String,
    pub transaction_type: String,
    pub status: String,
    pub from_account_id: AccountId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_account_id: Option<AccountId>,
    pub amount: String,
    pub description: String,
    pub balance_before: String,
    pub balance_after: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&TransactionRecord> for TransactionApiResponse {
    fn from(r: &TransactionRecord) -> Self {
        Self {
            id: r.id,
            reference: r.reference.to_string(),
            transaction_type: r.transaction_type.to_string(),
            status: r.status.to_string(),
            from_account_id: r.from_account_id,
            to_account_id: r.to_account_id,
            amount: format_amount(r.amount),
            description: r.description.clone(),
            balance_before: format_amount(r.balance_before),
            balance_after: format_amount(r.balance_after),
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

/// Query string of the history endpoint
#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

pub type ApiRejection = (StatusCode, ApiResponse<()>);

// ============================================================================
// Helper Functions
// ============================================================================

/// Parse a positive decimal amount with at most 8 fractional digits
pub fn parse_amount(s: &str) -> Result<Decimal, TransferError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(TransferError::InvalidAmount);
    }
    let amount = Decimal::from_str(s).map_err(|_| TransferError::InvalidAmount)?;
    validate_amount(amount)?;
    Ok(amount)
}

/// Format without trailing zeros ("60", "0.5")
pub fn format_amount(amount: Decimal) -> String {
    amount.normalize().to_string()
}

/// Map TransferError to (StatusCode, error_code, message)
///
/// Internal errors are logged here and replaced by a generic message.
pub fn map_error(e: &TransferError) -> (StatusCode, i32, String) {
    let status =
        StatusCode::from_u16(e.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    let code = match e {
        TransferError::Unauthorized => error_codes::AUTH_FAILED,
        TransferError::InvalidAmount | TransferError::PrecisionOverflow { .. } => {
            error_codes::INVALID_AMOUNT
        }
        TransferError::SameAccount => error_codes::SAME_ACCOUNT,
        TransferError::SourceNotFound
        | TransferError::DestinationNotFound
        | TransferError::AccountNotFound => error_codes::ACCOUNT_NOT_FOUND,
        TransferError::TransactionNotFound => error_codes::TRANSACTION_NOT_FOUND,
        TransferError::InsufficientFunds => error_codes::INSUFFICIENT_FUNDS,
        TransferError::SourceInactive | TransferError::DestinationInactive => {
            error_codes::ACCOUNT_INACTIVE
        }
        TransferError::CurrencyMismatch => error_codes::CURRENCY_MISMATCH,
        TransferError::IdempotencyKeyReused => error_codes::IDEMPOTENCY_KEY_REUSED,
        TransferError::AccountHasBalance => error_codes::ACCOUNT_HAS_BALANCE,
        _ => match e.kind() {
            ErrorKind::InvalidInput => error_codes::INVALID_PARAMETER,
            ErrorKind::NotFound => error_codes::ACCOUNT_NOT_FOUND,
            ErrorKind::PolicyViolation => error_codes::INVALID_PARAMETER,
            ErrorKind::Conflict => error_codes::CONFLICT,
            ErrorKind::Internal => error_codes::INTERNAL_ERROR,
        },
    };

    if e.kind() == ErrorKind::Internal {
        tracing::error!(error = %e, "Ledger request failed");
    }

    (status, code, e.public_message())
}

fn reject(e: TransferError) -> ApiRejection {
    let (status, code, msg) = map_error(&e);
    (status, ApiResponse::<()>::error(code, msg))
}

/// `Idempotency-Key` header as text
///
/// A header that is present but not visible ASCII is rejected rather than
/// ignored, otherwise a retry would run without its key.
pub fn header_idempotency_key(
    value: Option<&HeaderValue>,
) -> Result<Option<String>, ApiRejection> {
    value
        .map(|v| {
            v.to_str().map(str::to_string).map_err(|_| {
                reject(TransferError::InvalidIdempotencyKey(
                    "header is not valid ASCII".to_string(),
                ))
            })
        })
        .transpose()
}

/// Header key wins only when the body has none; both present must agree
fn resolve_idempotency_key(
    header: Option<String>,
    body: Option<String>,
) -> Result<Option<String>, TransferError> {
    match (header, body) {
        (Some(h), Some(b)) if h != b => Err(TransferError::InvalidIdempotencyKey(
            "header and body keys differ".to_string(),
        )),
        (h, b) => Ok(b.or(h)),
    }
}

// ============================================================================
// Handlers (transport-independent)
// ============================================================================

pub async fn create_transfer(
    service: &LedgerService,
    caller: UserId,
    from_account_id: AccountId,
    req: TransferApiRequest,
    header_key: Option<String>,
) -> Result<TransactionApiResponse, ApiRejection> {
    // 1. Shape
    req.validate().map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            ApiResponse::<()>::error(error_codes::INVALID_PARAMETER, e.to_string()),
        )
    })?;
    let to_account_number = AccountNumber::new(&req.to_account_number)
        .map_err(|e| reject(TransferError::from(e)))?;

    // 2. Amount
    let amount = parse_amount(&req.amount).map_err(reject)?;

    // 3. Idempotency key
    let key = resolve_idempotency_key(header_key, req.idempotency_key).map_err(reject)?;

    let mut core_req = TransferRequest::new(
        from_account_id,
        to_account_number.as_str(),
        amount,
        req.description.unwrap_or_default(),
    );
    core_req.idempotency_key = key;

    let record = service.transfer(caller, core_req).await.map_err(reject)?;
    Ok(TransactionApiResponse::from(&record))
}

pub async fn get_transaction(
    service: &LedgerService,
    caller: UserId,
    transaction_id: TransactionId,
) -> Result<TransactionApiResponse, ApiRejection> {
    let record = service
        .get_transaction(caller, transaction_id)
        .await
        .map_err(reject)?;
    Ok(TransactionApiResponse::from(&record))
}

pub async fn list_transactions(
    service: &LedgerService,
    caller: UserId,
    account_id: AccountId,
    query: HistoryQuery,
) -> Result<Vec<TransactionApiResponse>, ApiRejection> {
    let records = service
        .list_account_transactions(caller, account_id, query.limit, query.offset)
        .await
        .map_err(reject)?;
    Ok(records.iter().map(TransactionApiResponse::from).collect())
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("40").unwrap(), Decimal::from(40));
        assert_eq!(parse_amount(" 0.5 ").unwrap(), Decimal::new(5, 1));
        assert_eq!(parse_amount("0.00000001").unwrap(), Decimal::new(1, 8));

        assert_eq!(parse_amount(""), Err(TransferError::InvalidAmount));
        assert_eq!(parse_amount("0"), Err(TransferError::InvalidAmount));
        assert_eq!(parse_amount("-1"), Err(TransferError::InvalidAmount));
        assert_eq!(parse_amount("abc"), Err(TransferError::InvalidAmount));
        assert!(matches!(
            parse_amount("0.000000001"),
            Err(TransferError::PrecisionOverflow { .. })
        ));
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(Decimal::new(6000, 2)), "60");
        assert_eq!(format_amount(Decimal::new(50, 2)), "0.5");
        assert_eq!(format_amount(Decimal::new(1, 8)), "0.00000001");
    }

    #[test]
    fn test_map_error() {
        let (status, code, _) = map_error(&TransferError::InsufficientFunds);
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(code, error_codes::INSUFFICIENT_FUNDS);

        let (status, code, _) = map_error(&TransferError::DestinationNotFound);
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(code, error_codes::ACCOUNT_NOT_FOUND);

        let (status, code, _) = map_error(&TransferError::LockTimeout);
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(code, error_codes::CONFLICT);

        let (status, code, _) = map_error(&TransferError::AccountHasBalance);
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(code, error_codes::ACCOUNT_HAS_BALANCE);
    }

    #[test]
    fn test_header_idempotency_key() {
        assert_eq!(header_idempotency_key(None).ok(), Some(None));

        let ascii = HeaderValue::from_static("retry-7");
        assert_eq!(
            header_idempotency_key(Some(&ascii)).ok(),
            Some(Some("retry-7".to_string()))
        );

        let accented = HeaderValue::from_bytes("clé-1".as_bytes()).unwrap();
        let (status, body) = header_idempotency_key(Some(&accented)).unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.code, error_codes::INVALID_PARAMETER);
    }

    #[test]
    fn test_internal_detail_not_leaked() {
        let (status, code, msg) =
            map_error(&TransferError::DatabaseError("relation accounts_tb".into()));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(code, error_codes::INTERNAL_ERROR);
        assert!(!msg.contains("accounts_tb"));
    }

    #[test]
    fn test_resolve_idempotency_key() {
        assert_eq!(resolve_idempotency_key(None, None), Ok(None));
        assert_eq!(
            resolve_idempotency_key(Some("h".into()), None),
            Ok(Some("h".into()))
        );
        assert_eq!(
            resolve_idempotency_key(Some("k".into()), Some("k".into())),
            Ok(Some("k".into()))
        );
        assert!(resolve_idempotency_key(Some("a".into()), Some("b".into())).is_err());
    }

    #[test]
    fn test_request_shape_validation() {
        let req: TransferApiRequest = serde_json::from_str(
            r#"{"to_account_number": "123", "amount": "1", "idempotency_key": ""}"#,
        )
        .unwrap();
        let errors = req.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("to_account_number"));
        assert!(fields.contains_key("idempotency_key"));
    }
}
