//! HTTP error taxonomy
//!
//! Every failure leaving the API carries a machine-distinguishable kind and
//! a human-readable message; nothing collapses into a generic success.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::auth::resolver::ResolverError;
use crate::auth::signature::SignatureError;
use crate::auth::AuthError;
use crate::ledger::LedgerError;
use crate::recs::RecError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Missing or malformed input; the caller corrects and resubmits.
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    /// Bad signature or missing/expired session.
    #[error("{0}")]
    Unauthorized(String),

    /// The account's key scheme cannot be verified by this server.
    #[error("Unsupported key type")]
    UnsupportedKeyType,

    /// Concurrent-update loss or an impossible lifecycle transition.
    #[error("{0}")]
    Conflict(String),

    /// The buyer's wallet must associate the token, then retry.
    #[error("Token not associated")]
    NotAssociated { token_id: String },

    /// Ledger operator credentials absent; service-level, not user-level.
    #[error("Ledger not configured")]
    NotConfigured,

    /// Ledger or key-lookup call failed.
    #[error("{0}")]
    External(String),

    #[error("{0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            ApiError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": msg }),
            ),
            ApiError::NotFound(msg) => (
                StatusCode::NOT_FOUND,
                json!({ "error": msg }),
            ),
            ApiError::Unauthorized(msg) => (
                StatusCode::UNAUTHORIZED,
                json!({ "error": msg }),
            ),
            ApiError::UnsupportedKeyType => (
                StatusCode::BAD_REQUEST,
                json!({
                    "error": "Unsupported key type",
                    "message": "This account is not ED25519. Use an ED25519 account.",
                }),
            ),
            ApiError::Conflict(msg) => (
                StatusCode::CONFLICT,
                json!({ "error": msg }),
            ),
            ApiError::NotAssociated { token_id } => (
                StatusCode::CONFLICT,
                json!({
                    "error": "TOKEN_NOT_ASSOCIATED",
                    "message": "Associate the token in your wallet, then retry purchase.",
                    "tokenId": token_id,
                }),
            ),
            ApiError::NotConfigured => (
                StatusCode::SERVICE_UNAVAILABLE,
                json!({
                    "error": "Ledger not configured",
                    "message": "Set ledger.operator_id and ledger.operator_key in the node config",
                }),
            ),
            ApiError::External(msg) => (
                StatusCode::BAD_GATEWAY,
                json!({ "error": msg }),
            ),
            ApiError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": msg }),
            ),
        };
        (status, Json(body)).into_response()
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidNonce => ApiError::Validation("Invalid or expired nonce".to_string()),
            AuthError::UnsupportedKeyType => ApiError::UnsupportedKeyType,
            AuthError::VerificationFailed => {
                ApiError::Unauthorized("Signature verification failed".to_string())
            }
            AuthError::Signature(SignatureError::InvalidEncoding) => {
                ApiError::Validation("Invalid signature encoding".to_string())
            }
            AuthError::Signature(SignatureError::InvalidKeyEncoding) => {
                ApiError::External("Account key is not valid base64".to_string())
            }
            AuthError::Resolver(ResolverError::NotFound) => {
                ApiError::NotFound("Account not found".to_string())
            }
            AuthError::Resolver(ResolverError::NoKey) => {
                ApiError::NotFound("Public key not found for account".to_string())
            }
            AuthError::Resolver(ResolverError::Lookup(msg)) => ApiError::External(msg),
        }
    }
}

impl From<RecError> for ApiError {
    fn from(err: RecError) -> Self {
        match err {
            RecError::NotFound => ApiError::NotFound("REC not found".to_string()),
            RecError::NotMinted => {
                ApiError::Conflict("REC has no on-ledger token".to_string())
            }
            RecError::InvalidState(msg) => ApiError::Conflict(msg),
            RecError::NotAssociated { token_id } => ApiError::NotAssociated { token_id },
            RecError::RetireFailed { .. } => ApiError::Internal(err.to_string()),
            RecError::Ledger(LedgerError::NotConfigured) => ApiError::NotConfigured,
            RecError::Ledger(other) => ApiError::External(other.to_string()),
            RecError::Storage(e) => ApiError::Internal(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_associated_maps_to_conflict() {
        let err: ApiError = RecError::NotAssociated {
            token_id: "0.0.5001".to_string(),
        }
        .into();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_not_configured_maps_to_service_unavailable() {
        let err: ApiError = RecError::Ledger(LedgerError::NotConfigured).into();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_auth_failures_map_distinctly() {
        let invalid: ApiError = AuthError::InvalidNonce.into();
        assert_eq!(invalid.into_response().status(), StatusCode::BAD_REQUEST);

        let failed: ApiError = AuthError::VerificationFailed.into();
        assert_eq!(failed.into_response().status(), StatusCode::UNAUTHORIZED);

        let unsupported: ApiError = AuthError::UnsupportedKeyType.into();
        assert_eq!(unsupported.into_response().status(), StatusCode::BAD_REQUEST);
    }
}
