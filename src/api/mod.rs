//! HTTP API
//!
//! Marketplace REST surface: wallet login, REC listing and lifecycle
//! operations, portfolio, and health probes.

pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;

use crate::auth::AuthController;
use crate::ledger::LedgerGateway;
use crate::recs::RecService;

/// State shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthController>,
    pub recs: Arc<RecService>,
    pub ledger: Arc<dyn LedgerGateway>,
    pub network: String,
}

/// Create the API router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health
        .route("/api/health", get(routes::health))
        .route("/api/health/ledger", get(routes::ledger_health))
        // Wallet login
        .route("/api/auth/nonce", get(routes::auth_nonce))
        .route("/api/auth/verify", post(routes::auth_verify))
        // Marketplace
        .route("/api/recs", get(routes::list_recs))
        .route("/api/recs/mint", post(routes::mint_rec))
        .route("/api/recs/:id/purchase", post(routes::purchase_rec))
        .route("/api/recs/:id/retire", post(routes::retire_rec))
        .route("/api/portfolio", get(routes::portfolio))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
