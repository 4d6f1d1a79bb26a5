//! REC lifecycle integration tests
//!
//! Mint, purchase, and retire against the in-process token ledger and a
//! scratch SQLite store, including the failure policies: the not-associated
//! retry contract, the wipe-to-burn retire fallback, and the no-double-sell
//! guarantee under concurrent purchases.

use std::sync::Arc;

use async_trait::async_trait;
use tempfile::TempDir;

use ecoledger_node::ledger::token::TokenLedger;
use ecoledger_node::ledger::{LedgerError, LedgerGateway, TxReceipt};
use ecoledger_node::recs::store::{RecStatus, RecStore};
use ecoledger_node::recs::{MintRequest, RecError, RecService};

const TREASURY: &str = "0.0.2";
const BUYER: &str = "0.0.9";

fn service() -> (RecService, Arc<TokenLedger>, TempDir) {
    let dir = TempDir::new().unwrap();
    let ledger = Arc::new(TokenLedger::new(Some(TREASURY.to_string())));
    let store = RecStore::open(dir.path()).unwrap();
    let service = RecService::new(store, ledger.clone());
    (service, ledger, dir)
}

fn solar_100() -> MintRequest {
    MintRequest {
        energy_source: "solar".to_string(),
        location: "Mojave Desert, CA".to_string(),
        mwh: 100,
        price: 45.0,
        generation_date: "2024-07-01".to_string(),
    }
}

#[tokio::test]
async fn test_mint_purchase_retire_end_to_end() {
    let (service, ledger, _dir) = service();

    // Mint: token created, local record available and treasury-owned
    let minted = service.mint(solar_100()).await.unwrap();
    assert_eq!(minted.rec.status, RecStatus::Available);
    assert_eq!(minted.rec.owner_id, TREASURY);
    assert_eq!(minted.rec.mwh, 100);
    assert_eq!(ledger.supply(&minted.token_id), 100);

    // Purchase: transfer settles, ownership moves, one trade at 100 * 45
    ledger.associate(&minted.token_id, BUYER).unwrap();
    service.purchase(&minted.rec.id, BUYER).await.unwrap();

    let rec = service.get(&minted.rec.id).await.unwrap();
    assert_eq!(rec.status, RecStatus::Sold);
    assert_eq!(rec.owner_id, BUYER);
    assert_eq!(ledger.balance(&minted.token_id, BUYER), 100);

    let trades = service.trades_for(&minted.rec.id).await.unwrap();
    assert_eq!(trades.len(), 1);
    assert_eq!(trades[0].amount, 4500.0);
    assert_eq!(trades[0].buyer_id, BUYER);
    assert_eq!(trades[0].seller_id, TREASURY);

    // Retire: wipe hits the buyer's balance and the status goes terminal
    service.retire(&minted.rec.id).await.unwrap();
    let rec = service.get(&minted.rec.id).await.unwrap();
    assert_eq!(rec.status, RecStatus::Retired);
    assert_eq!(ledger.supply(&minted.token_id), 0);
}

#[tokio::test]
async fn test_purchase_without_association_aborts_cleanly() {
    let (service, _ledger, _dir) = service();
    let minted = service.mint(solar_100()).await.unwrap();

    let err = service.purchase(&minted.rec.id, BUYER).await.unwrap_err();
    match err {
        RecError::NotAssociated { token_id } => assert_eq!(token_id, minted.token_id),
        other => panic!("expected NotAssociated, got {other:?}"),
    }

    // No local state was touched
    let rec = service.get(&minted.rec.id).await.unwrap();
    assert_eq!(rec.status, RecStatus::Available);
    assert_eq!(rec.owner_id, TREASURY);
    assert!(service.trades_for(&minted.rec.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_concurrent_purchases_single_winner() {
    let (service, ledger, _dir) = service();
    let minted = service.mint(solar_100()).await.unwrap();
    ledger.associate(&minted.token_id, "0.0.8").unwrap();
    ledger.associate(&minted.token_id, "0.0.9").unwrap();

    let service = Arc::new(service);
    let (a, b) = tokio::join!(
        {
            let service = service.clone();
            let id = minted.rec.id.clone();
            async move { service.purchase(&id, "0.0.8").await }
        },
        {
            let service = service.clone();
            let id = minted.rec.id.clone();
            async move { service.purchase(&id, "0.0.9").await }
        }
    );

    // Exactly one purchase settles; the loser observes a typed failure
    assert_eq!(a.is_ok() as u8 + b.is_ok() as u8, 1);

    let rec = service.get(&minted.rec.id).await.unwrap();
    assert_eq!(rec.status, RecStatus::Sold);
    assert_eq!(service.trades_for(&minted.rec.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_purchase_of_sold_rec_conflicts() {
    let (service, ledger, _dir) = service();
    let minted = service.mint(solar_100()).await.unwrap();
    ledger.associate(&minted.token_id, BUYER).unwrap();
    service.purchase(&minted.rec.id, BUYER).await.unwrap();

    let err = service.purchase(&minted.rec.id, "0.0.8").await.unwrap_err();
    assert!(matches!(err, RecError::InvalidState(_)));
}

#[tokio::test]
async fn test_purchase_unknown_rec_is_not_found() {
    let (service, _ledger, _dir) = service();
    let err = service.purchase("no-such-rec", BUYER).await.unwrap_err();
    assert!(matches!(err, RecError::NotFound));
}

#[tokio::test]
async fn test_unconfigured_ledger_fails_before_any_mutation() {
    let dir = TempDir::new().unwrap();
    let ledger = Arc::new(TokenLedger::new(None));
    let store = RecStore::open(dir.path()).unwrap();
    let service = RecService::new(store, ledger);

    let err = service.mint(solar_100()).await.unwrap_err();
    assert!(matches!(
        err,
        RecError::Ledger(LedgerError::NotConfigured)
    ));
}

#[tokio::test]
async fn test_retire_of_treasury_held_rec_burns() {
    let (service, ledger, _dir) = service();
    let minted = service.mint(solar_100()).await.unwrap();

    // The treasury still holds the issuance, so the wipe is refused and
    // the retire must fall back to a burn
    service.retire(&minted.rec.id).await.unwrap();

    let rec = service.get(&minted.rec.id).await.unwrap();
    assert_eq!(rec.status, RecStatus::Retired);
    assert_eq!(ledger.supply(&minted.token_id), 0);
    assert_eq!(ledger.balance(&minted.token_id, TREASURY), 0);
}

#[tokio::test]
async fn test_retire_twice_conflicts() {
    let (service, _ledger, _dir) = service();
    let minted = service.mint(solar_100()).await.unwrap();
    service.retire(&minted.rec.id).await.unwrap();

    let err = service.retire(&minted.rec.id).await.unwrap_err();
    assert!(matches!(err, RecError::InvalidState(_)));
}

/// Gateway whose destructive operations always fail, for exercising the
/// both-paths-failed retire outcome.
struct BrokenRetireGateway;

#[async_trait]
impl LedgerGateway for BrokenRetireGateway {
    fn is_configured(&self) -> bool {
        true
    }

    fn operator_account(&self) -> Option<String> {
        Some(TREASURY.to_string())
    }

    async fn create_token(
        &self,
        _name: &str,
        _symbol: &str,
        _initial_supply: u64,
    ) -> Result<String, LedgerError> {
        Ok("0.0.9999".to_string())
    }

    async fn transfer(
        &self,
        _token_id: &str,
        _from: &str,
        _to: &str,
        _amount: u64,
    ) -> Result<TxReceipt, LedgerError> {
        Ok(TxReceipt {
            transaction_id: "0.0.2@1".to_string(),
            status: "SUCCESS".to_string(),
        })
    }

    async fn wipe(
        &self,
        _token_id: &str,
        _account_id: &str,
        _amount: u64,
    ) -> Result<TxReceipt, LedgerError> {
        Err(LedgerError::Rejected("wipe refused".to_string()))
    }

    async fn burn(&self, _token_id: &str, _amount: u64) -> Result<TxReceipt, LedgerError> {
        Err(LedgerError::Network("node unreachable".to_string()))
    }
}

#[tokio::test]
async fn test_retire_with_both_paths_failing_leaves_record_unchanged() {
    let dir = TempDir::new().unwrap();
    let store = RecStore::open(dir.path()).unwrap();
    let service = RecService::new(store, Arc::new(BrokenRetireGateway));

    let minted = service.mint(solar_100()).await.unwrap();
    let err = service.retire(&minted.rec.id).await.unwrap_err();
    assert!(matches!(err, RecError::RetireFailed { .. }));

    // No partial status update
    let rec = service.get(&minted.rec.id).await.unwrap();
    assert_eq!(rec.status, RecStatus::Available);
}

#[tokio::test]
async fn test_seed_if_empty_is_idempotent() {
    let (service, _ledger, _dir) = service();

    service.seed_if_empty().await.unwrap();
    let listed = service.list_available().await.unwrap();
    assert_eq!(listed.len(), 3);
    assert!(listed.iter().all(|r| r.token_id.is_none()));

    service.seed_if_empty().await.unwrap();
    assert_eq!(service.list_available().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_portfolio_stats() {
    let (service, ledger, _dir) = service();

    let first = service.mint(solar_100()).await.unwrap();
    let second = service
        .mint(MintRequest {
            energy_source: "wind".to_string(),
            location: "Texas Wind Farm".to_string(),
            mwh: 50,
            price: 40.0,
            generation_date: "2024-07-01".to_string(),
        })
        .await
        .unwrap();

    ledger.associate(&first.token_id, BUYER).unwrap();
    ledger.associate(&second.token_id, BUYER).unwrap();
    service.purchase(&first.rec.id, BUYER).await.unwrap();
    service.purchase(&second.rec.id, BUYER).await.unwrap();

    let (recs, stats) = service.portfolio(BUYER).await.unwrap();
    assert_eq!(recs.len(), 2);
    assert_eq!(stats.total_recs, 2);
    assert_eq!(stats.total_mwh, 150);
    assert_eq!(stats.total_spent, 100.0 * 45.0 + 50.0 * 40.0);
    assert!((stats.carbon_offset - 60.0).abs() < 1e-9);
}
