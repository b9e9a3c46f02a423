//! Bearer token authentication
//!
//! Verifies HS256 JWTs and injects the caller's [`CurrentUser`]. Token
//! issuance is handled elsewhere.

use axum::{
    Json,
    body::Body,
    extract::State,
    http::{Request, StatusCode, header},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::state::AppState;
use super::types::{ApiResponse, error_codes};
use crate::core_types::UserId;

/// JWT Claims structure
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String, // Subject (user_id as string)
    pub exp: usize,  // Expiration time (as UTC timestamp)
    pub iat: usize,  // Issued at
}

/// Authenticated caller, available to handlers as an `Extension`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentUser(pub UserId);

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum AuthError {
    #[error("Missing Authorization header")]
    MissingHeader,
    #[error("Invalid token format")]
    BadScheme,
    #[error("Invalid or expired token")]
    InvalidToken,
}

pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &str) -> Self {
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    pub fn verify(&self, token: &str) -> Result<CurrentUser, AuthError> {
        let data = decode::<Claims>(token, &self.key, &self.validation)
            .map_err(|_| AuthError::InvalidToken)?;
        data.claims
            .sub
            .parse::<UserId>()
            .map(CurrentUser)
            .map_err(|_| AuthError::InvalidToken)
    }

    /// `Authorization: Bearer <token>` → caller
    pub fn authenticate(&self, header_value: Option<&str>) -> Result<CurrentUser, AuthError> {
        let value = header_value.ok_or(AuthError::MissingHeader)?;
        let token = value.strip_prefix("Bearer ").ok_or(AuthError::BadScheme)?;
        self.verify(token.trim())
    }
}

pub async fn jwt_auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, (StatusCode, Json<ApiResponse<()>>)> {
    let header_value = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    match state.jwt.authenticate(header_value) {
        Ok(user) => {
            request.extensions_mut().insert(user);
            Ok(next.run(request).await)
        }
        Err(e) => {
            let code = match e {
                AuthError::MissingHeader => error_codes::MISSING_AUTH,
                _ => error_codes::AUTH_FAILED,
            };
            tracing::debug!(error = %e, "Rejected request");
            Err((
                StatusCode::UNAUTHORIZED,
                Json(ApiResponse::<()>::error(code, e.to_string())),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{EncodingKey, Header, encode};

    const SECRET: &str = "test-secret";

    fn token(sub: &str, secret: &str, exp_offset: i64) -> String {
        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            sub: sub.to_string(),
            exp: (now + exp_offset) as usize,
            iat: now as usize,
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn test_valid_token() {
        let verifier = JwtVerifier::new(SECRET);
        let header = format!("Bearer {}", token("42", SECRET, 3600));
        assert_eq!(verifier.authenticate(Some(&header)), Ok(CurrentUser(42)));
    }

    #[test]
    fn test_rejections() {
        let verifier = JwtVerifier::new(SECRET);
        assert_eq!(verifier.authenticate(None), Err(AuthError::MissingHeader));
        assert_eq!(
            verifier.authenticate(Some("Basic abc")),
            Err(AuthError::BadScheme)
        );

        let wrong_secret = format!("Bearer {}", token("42", "other", 3600));
        assert_eq!(
            verifier.authenticate(Some(&wrong_secret)),
            Err(AuthError::InvalidToken)
        );

        let expired = format!("Bearer {}", token("42", SECRET, -3600));
        assert_eq!(
            verifier.authenticate(Some(&expired)),
            Err(AuthError::InvalidToken)
        );

        let non_numeric = format!("Bearer {}", token("alice", SECRET, 3600));
        assert_eq!(
            verifier.authenticate(Some(&non_numeric)),
            Err(AuthError::InvalidToken)
        );
    }
}
