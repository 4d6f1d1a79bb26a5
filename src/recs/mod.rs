//! REC lifecycle
//!
//! Coordinates every certificate state change across the local store and
//! the token ledger: mint (issue on-ledger, record locally), purchase
//! (on-ledger transfer, then ownership + trade record), and retire
//! (on-ledger wipe with burn fallback, then terminal status). This module
//! owns all writes to REC and trade records.

pub mod store;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::ledger::{LedgerError, LedgerGateway};
use store::{Rec, RecStatus, RecStore, TradeRecord};

/// MWh-to-tonnes-CO2 factor used for the portfolio offset stat.
const CARBON_OFFSET_PER_MWH: f64 = 0.4;

#[derive(Debug, thiserror::Error)]
pub enum RecError {
    #[error("REC not found")]
    NotFound,

    /// The certificate has no on-ledger token (seeded listing never minted).
    #[error("REC has no on-ledger token")]
    NotMinted,

    /// Lost a lifecycle race or the certificate is past the required state.
    #[error("{0}")]
    InvalidState(String),

    /// The buyer must associate the token in their wallet and retry.
    #[error("Token not associated with buyer account")]
    NotAssociated { token_id: String },

    /// Both the wipe and the burn fallback failed; the record is unchanged.
    #[error("Retire failed: wipe ({wipe}), burn fallback ({burn})")]
    RetireFailed { wipe: LedgerError, burn: LedgerError },

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

/// Mint request fields, as submitted by a producer.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MintRequest {
    pub energy_source: String,
    pub location: String,
    pub mwh: u64,
    pub price: f64,
    pub generation_date: String,
}

#[derive(Debug, Serialize)]
pub struct MintOutcome {
    pub rec: Rec,
    pub token_id: String,
    pub transaction_id: String,
}

#[derive(Debug, Serialize)]
pub struct PurchaseOutcome {
    pub transaction_id: String,
}

/// Aggregate stats over an account's holdings.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioStats {
    pub total_recs: usize,
    pub total_mwh: u64,
    pub total_spent: f64,
    pub carbon_offset: f64,
}

/// Certificate lifecycle controller.
pub struct RecService {
    store: RecStore,
    ledger: Arc<dyn LedgerGateway>,
}

impl RecService {
    pub fn new(store: RecStore, ledger: Arc<dyn LedgerGateway>) -> Self {
        Self { store, ledger }
    }

    /// Issue a new certificate: create the token on-ledger, then record it
    /// locally with the treasury as initial owner.
    pub async fn mint(&self, req: MintRequest) -> Result<MintOutcome, RecError> {
        if !self.ledger.is_configured() {
            return Err(LedgerError::NotConfigured.into());
        }

        // Timestamped name keeps ledger-level symbols collision-free
        let now = now_secs();
        let token_name = format!(
            "REC-{}-{}",
            req.energy_source.to_uppercase(),
            now_millis()
        );
        let token_symbol = format!(
            "R{}",
            req.energy_source
                .chars()
                .next()
                .map(|c| c.to_ascii_uppercase())
                .unwrap_or('X')
        );

        let token_id = self
            .ledger
            .create_token(&token_name, &token_symbol, req.mwh)
            .await?;

        let owner = self
            .ledger
            .operator_account()
            .ok_or(LedgerError::NotConfigured)?;

        let rec = Rec {
            id: Uuid::new_v4().to_string(),
            token_id: Some(token_id.clone()),
            energy_source: req.energy_source,
            location: req.location,
            mwh: req.mwh,
            price: req.price,
            generation_date: req.generation_date,
            status: RecStatus::Available,
            owner_id: owner,
            created_at: now,
        };

        if let Err(e) = self.store.insert(&rec).await {
            // The token exists on-ledger with no local record. There is no
            // compensating uncreate; surface the divergence for manual
            // reconciliation.
            error!(token_id, error = %e, "Local record write failed after token creation");
            return Err(RecError::Storage(e));
        }

        info!(rec_id = %rec.id, token_id, "REC minted");
        Ok(MintOutcome {
            rec,
            token_id: token_id.clone(),
            transaction_id: format!("mint-{}", token_id),
        })
    }

    /// Purchase a listed certificate for `buyer_id`. The on-ledger transfer
    /// runs first; local state is untouched unless it succeeds.
    pub async fn purchase(&self, id: &str, buyer_id: &str) -> Result<PurchaseOutcome, RecError> {
        if !self.ledger.is_configured() {
            return Err(LedgerError::NotConfigured.into());
        }

        let rec = self.store.get(id).await?.ok_or(RecError::NotFound)?;
        if rec.status != RecStatus::Available {
            return Err(RecError::InvalidState(format!(
                "REC is {}, not available",
                rec.status.as_str()
            )));
        }
        let token_id = rec.token_id.clone().ok_or(RecError::NotMinted)?;

        let receipt = self
            .ledger
            .transfer(&token_id, &rec.owner_id, buyer_id, rec.mwh)
            .await
            .map_err(|e| match e {
                LedgerError::NotAssociated { token_id } => {
                    RecError::NotAssociated { token_id }
                }
                other => RecError::Ledger(other),
            })?;

        // Price is captured at purchase time, never re-read
        let trade = TradeRecord {
            id: Uuid::new_v4().to_string(),
            rec_id: rec.id.clone(),
            buyer_id: buyer_id.to_string(),
            seller_id: rec.owner_id.clone(),
            amount: rec.price * rec.mwh as f64,
            ledger_tx_id: receipt.transaction_id.clone(),
            timestamp: now_secs(),
        };

        if !self.store.settle_purchase(&trade).await? {
            // A concurrent purchase won the compare-and-set after our
            // transfer was dispatched; the divergence is logged, the loser
            // reloads and re-decides.
            warn!(rec_id = %rec.id, buyer_id, "Purchase lost a concurrent update");
            return Err(RecError::InvalidState(
                "REC was sold by a concurrent purchase".to_string(),
            ));
        }

        info!(rec_id = %rec.id, buyer_id, tx = %receipt.transaction_id, "REC purchased");
        Ok(PurchaseOutcome {
            transaction_id: receipt.transaction_id,
        })
    }

    /// Retire a certificate: wipe the holder's balance, falling back to a
    /// treasury burn when the wipe fails for any reason (the treasury holds
    /// its own unsold issuance and cannot be wiped). Only when both
    /// destructive paths fail is the record left unchanged.
    pub async fn retire(&self, id: &str) -> Result<(), RecError> {
        if !self.ledger.is_configured() {
            return Err(LedgerError::NotConfigured.into());
        }

        let rec = self.store.get(id).await?.ok_or(RecError::NotFound)?;
        if rec.status == RecStatus::Retired {
            return Err(RecError::InvalidState("REC is already retired".to_string()));
        }
        let token_id = rec.token_id.clone().ok_or(RecError::NotMinted)?;

        match self.ledger.wipe(&token_id, &rec.owner_id, rec.mwh).await {
            Ok(receipt) => {
                info!(rec_id = %rec.id, tx = %receipt.transaction_id, "REC wiped from holder");
            }
            Err(wipe_err) => {
                warn!(rec_id = %rec.id, error = %wipe_err, "Wipe failed, burning from treasury");
                match self.ledger.burn(&token_id, rec.mwh).await {
                    Ok(receipt) => {
                        info!(rec_id = %rec.id, tx = %receipt.transaction_id, "REC burned from treasury");
                    }
                    Err(burn_err) => {
                        error!(rec_id = %rec.id, wipe = %wipe_err, burn = %burn_err, "Retire failed on both paths");
                        return Err(RecError::RetireFailed {
                            wipe: wipe_err,
                            burn: burn_err,
                        });
                    }
                }
            }
        }

        // The tokens left circulation; the local status follows
        // unconditionally even if a concurrent retire already flipped it.
        self.store.mark_retired(id).await?;
        info!(rec_id = %rec.id, "REC retired");
        Ok(())
    }

    pub async fn get(&self, id: &str) -> Result<Rec, RecError> {
        self.store.get(id).await?.ok_or(RecError::NotFound)
    }

    /// Marketplace listing of available certificates.
    pub async fn list_available(&self) -> Result<Vec<Rec>, RecError> {
        Ok(self.store.list_available().await?)
    }

    /// An account's holdings with aggregate stats.
    pub async fn portfolio(&self, owner_id: &str) -> Result<(Vec<Rec>, PortfolioStats), RecError> {
        let recs = self.store.list_by_owner(owner_id).await?;
        let total_mwh: u64 = recs.iter().map(|r| r.mwh).sum();
        let stats = PortfolioStats {
            total_recs: recs.len(),
            total_mwh,
            total_spent: recs.iter().map(|r| r.mwh as f64 * r.price).sum(),
            carbon_offset: total_mwh as f64 * CARBON_OFFSET_PER_MWH,
        };
        Ok((recs, stats))
    }

    pub async fn trades_for(&self, rec_id: &str) -> Result<Vec<TradeRecord>, RecError> {
        Ok(self.store.trades_for(rec_id).await?)
    }

    /// Seed sample listings into an empty database so a fresh node shows a
    /// populated market. Seeded RECs carry no on-ledger token.
    pub async fn seed_if_empty(&self) -> Result<(), RecError> {
        if self.store.count().await? > 0 {
            return Ok(());
        }

        let samples = [
            ("solar", "Mojave Desert, CA", 100u64, 45.0, "2024-07-01", "producer-1"),
            ("wind", "Texas Wind Farm", 150, 42.0, "2024-07-01", "producer-2"),
            ("hydro", "Columbia River Basin", 80, 39.0, "2024-06-15", "producer-3"),
        ];

        for (source, location, mwh, price, date, owner) in samples {
            let rec = Rec {
                id: Uuid::new_v4().to_string(),
                token_id: None,
                energy_source: source.to_string(),
                location: location.to_string(),
                mwh,
                price,
                generation_date: date.to_string(),
                status: RecStatus::Available,
                owner_id: owner.to_string(),
                created_at: now_secs(),
            };
            self.store.insert(&rec).await?;
        }

        info!("Seeded sample RECs into empty database");
        Ok(())
    }
}

fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_millis() as u64
}
