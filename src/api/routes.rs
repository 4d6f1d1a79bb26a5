//! API route handlers

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    response::Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::error::ApiError;
use super::AppState;
use crate::auth::signature::SignatureInput;
use crate::auth::store::Session;
use crate::recs::MintRequest;

/// Extract and validate the bearer session on an authenticated request.
fn require_session(state: &AppState, headers: &HeaderMap) -> Result<Session, ApiError> {
    let token = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| ApiError::Unauthorized("Unauthorized".to_string()))?;

    state
        .auth
        .authenticate(token)
        .ok_or_else(|| ApiError::Unauthorized("Invalid session".to_string()))
}

/// GET /api/health
pub async fn health() -> Json<Value> {
    Json(json!({ "ok": true }))
}

/// GET /api/health/ledger
pub async fn ledger_health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "network": state.network,
        "configured": state.ledger.is_configured(),
        "operatorId": state.ledger.operator_account(),
    }))
}

// === Wallet login ===

#[derive(Deserialize)]
pub struct NonceQuery {
    #[serde(rename = "accountId")]
    account_id: Option<String>,
}

/// GET /api/auth/nonce?accountId=0.0.x
pub async fn auth_nonce(
    State(state): State<AppState>,
    Query(query): Query<NonceQuery>,
) -> Result<Json<Value>, ApiError> {
    let account_id = query
        .account_id
        .filter(|a| !a.is_empty())
        .ok_or_else(|| ApiError::Validation("accountId required".to_string()))?;

    let entry = state.auth.issue_nonce(&account_id);
    Ok(Json(json!({
        "nonce": entry.nonce,
        "expiresAt": entry.expires_at,
    })))
}

#[derive(Deserialize)]
pub struct VerifyRequest {
    #[serde(rename = "accountId")]
    account_id: Option<String>,
    signature: Option<SignatureInput>,
}

/// POST /api/auth/verify
pub async fn auth_verify(
    State(state): State<AppState>,
    Json(req): Json<VerifyRequest>,
) -> Result<Json<Value>, ApiError> {
    let (account_id, signature) = match (req.account_id, req.signature) {
        (Some(a), Some(s)) if !a.is_empty() => (a, s),
        _ => {
            return Err(ApiError::Validation(
                "accountId and signature required".to_string(),
            ))
        }
    };

    let (token, session) = state.auth.verify(&account_id, &signature).await?;
    Ok(Json(json!({
        "token": token,
        "accountId": account_id,
        "expiresAt": session.expires_at,
    })))
}

// === Marketplace ===

/// GET /api/recs — available listings, public
pub async fn list_recs(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let recs = state.recs.list_available().await?;
    Ok(Json(json!(recs)))
}

/// POST /api/recs/mint
pub async fn mint_rec(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<MintRequest>,
) -> Result<Json<Value>, ApiError> {
    require_session(&state, &headers)?;

    if req.energy_source.is_empty() {
        return Err(ApiError::Validation("energySource required".to_string()));
    }
    if req.mwh == 0 {
        return Err(ApiError::Validation("mwh must be positive".to_string()));
    }
    if req.price < 0.0 {
        return Err(ApiError::Validation("price must be non-negative".to_string()));
    }

    let outcome = state.recs.mint(req).await?;
    Ok(Json(json!({
        "success": true,
        "rec": outcome.rec,
        "tokenId": outcome.token_id,
        "transactionId": outcome.transaction_id,
    })))
}

/// POST /api/recs/:id/purchase — buyer is the authenticated account
pub async fn purchase_rec(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    let session = require_session(&state, &headers)?;

    let outcome = state.recs.purchase(&id, &session.account_id).await?;
    Ok(Json(json!({
        "success": true,
        "transactionId": outcome.transaction_id,
        "message": "REC purchased successfully",
    })))
}

/// POST /api/recs/:id/retire
pub async fn retire_rec(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    require_session(&state, &headers)?;

    state.recs.retire(&id).await?;
    Ok(Json(json!({
        "success": true,
        "message": "REC retired on-ledger and marked as retired",
    })))
}

// === Portfolio ===

#[derive(Serialize)]
struct PortfolioResponse {
    recs: Vec<crate::recs::store::Rec>,
    stats: crate::recs::PortfolioStats,
}

/// GET /api/portfolio — the caller's holdings and aggregate stats
pub async fn portfolio(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    let session = require_session(&state, &headers)?;

    let (recs, stats) = state.recs.portfolio(&session.account_id).await?;
    let response = PortfolioResponse { recs, stats };
    Ok(Json(serde_json::to_value(response).map_err(|e| ApiError::Internal(e.to_string()))?))
}
