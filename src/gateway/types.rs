//! API Response types and error codes

use axum::{Json, http::StatusCode};
use serde::Serialize;

// ============================================================================
// Unified API Response Format
// ============================================================================

/// Unified API response wrapper
///
/// All API responses follow this structure:
/// - code: 0 = success, non-zero = error code
/// - msg: short message description
/// - data: actual data (success) or absent (error)
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub code: i32,
    pub msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    /// Create success response
    pub fn success(data: T) -> Self {
        Self {
            code: 0,
            msg: "ok".to_string(),
            data: Some(data),
        }
    }

    /// Create error response
    pub fn error(code: i32, msg: impl Into<String>) -> ApiResponse<()> {
        ApiResponse {
            code,
            msg: msg.into(),
            data: None,
        }
    }
}

/// Handler result: `200 + data` or `status + error envelope`
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, (StatusCode, Json<ApiResponse<()>>)>;

pub fn ok<T>(data: T) -> ApiResult<T> {
    Ok(Json(ApiResponse::success(data)))
}

// ============================================================================
// Error Codes
// ============================================================================

pub mod error_codes {
    pub const SUCCESS: i32 = 0;

    // Request errors (1xxx)
    pub const INVALID_PARAMETER: i32 = 1001;
    pub const INVALID_AMOUNT: i32 = 1002;
    pub const SAME_ACCOUNT: i32 = 1003;

    // Authentication (2xxx)
    pub const MISSING_AUTH: i32 = 2001;
    pub const AUTH_FAILED: i32 = 2002;

    // Lookup (3xxx)
    pub const ACCOUNT_NOT_FOUND: i32 = 3001;
    pub const TRANSACTION_NOT_FOUND: i32 = 3002;

    // Policy (4xxx)
    pub const INSUFFICIENT_FUNDS: i32 = 4001;
    pub const ACCOUNT_INACTIVE: i32 = 4002;
    pub const CURRENCY_MISMATCH: i32 = 4003;
    pub const ACCOUNT_HAS_BALANCE: i32 = 4004;
    pub const CONFLICT: i32 = 4090;
    pub const IDEMPOTENCY_KEY_REUSED: i32 = 4091;

    // Server (5xxx)
    pub const INTERNAL_ERROR: i32 = 5000;
    pub const SERVICE_UNAVAILABLE: i32 = 5001;
}
