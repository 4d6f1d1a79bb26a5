//! SQLite-backed REC and trade records
//!
//! The local shadow of certificate state: who owns each REC and where it is
//! in its lifecycle. Status transitions are compare-and-set SQL updates so
//! two concurrent purchases of the same certificate cannot both win.

use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Lifecycle state of a certificate. Transitions only move forward:
/// `available -> sold -> retired`, with retire also allowed straight from
/// `available` (producers may retire unsold certificates).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecStatus {
    Available,
    Sold,
    Retired,
}

impl RecStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecStatus::Available => "available",
            RecStatus::Sold => "sold",
            RecStatus::Retired => "retired",
        }
    }

    fn parse(s: &str) -> Self {
        match s {
            "sold" => RecStatus::Sold,
            "retired" => RecStatus::Retired,
            _ => RecStatus::Available,
        }
    }
}

/// A renewable energy certificate tracked locally, with its on-ledger token
/// reference once minted.
#[derive(Debug, Clone, Serialize)]
pub struct Rec {
    pub id: String,
    pub token_id: Option<String>,
    pub energy_source: String,
    pub location: String,
    pub mwh: u64,
    pub price: f64,
    pub generation_date: String,
    pub status: RecStatus,
    pub owner_id: String,
    pub created_at: u64,
}

/// One settled purchase. Immutable once written.
#[derive(Debug, Clone, Serialize)]
pub struct TradeRecord {
    pub id: String,
    pub rec_id: String,
    pub buyer_id: String,
    pub seller_id: String,
    pub amount: f64,
    pub ledger_tx_id: String,
    pub timestamp: u64,
}

/// REC persistence over SQLite.
pub struct RecStore {
    db: Mutex<Connection>,
}

impl RecStore {
    /// Open or create the marketplace database under `data_dir`.
    pub fn open(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir).context("creating data directory")?;
        let db_path = data_dir.join("recs.db");
        let db = Connection::open(&db_path)
            .with_context(|| format!("opening database at {}", db_path.display()))?;

        // WAL for concurrent read access
        db.execute_batch("PRAGMA journal_mode=WAL;")?;

        db.execute_batch(
            "CREATE TABLE IF NOT EXISTS recs (
                id TEXT PRIMARY KEY,
                token_id TEXT,
                energy_source TEXT NOT NULL,
                location TEXT NOT NULL,
                mwh INTEGER NOT NULL,
                price REAL NOT NULL,
                generation_date TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'available',
                owner_id TEXT NOT NULL,
                created_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
            );
            CREATE TABLE IF NOT EXISTS trades (
                id TEXT PRIMARY KEY,
                rec_id TEXT NOT NULL,
                buyer_id TEXT NOT NULL,
                seller_id TEXT NOT NULL,
                amount REAL NOT NULL,
                ledger_tx_id TEXT NOT NULL,
                timestamp INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
            );",
        )?;

        info!(path = %db_path.display(), "REC store initialized");

        Ok(Self { db: Mutex::new(db) })
    }

    pub async fn insert(&self, rec: &Rec) -> Result<()> {
        let db = self.db.lock().await;
        db.execute(
            "INSERT INTO recs (id, token_id, energy_source, location, mwh, price,
                               generation_date, status, owner_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                rec.id,
                rec.token_id,
                rec.energy_source,
                rec.location,
                rec.mwh,
                rec.price,
                rec.generation_date,
                rec.status.as_str(),
                rec.owner_id,
                rec.created_at,
            ],
        )?;
        debug!(id = %rec.id, "REC inserted");
        Ok(())
    }

    pub async fn get(&self, id: &str) -> Result<Option<Rec>> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare_cached(
            "SELECT id, token_id, energy_source, location, mwh, price,
                    generation_date, status, owner_id, created_at
             FROM recs WHERE id = ?1",
        )?;
        let rec = stmt.query_row([id], row_to_rec).optional()?;
        Ok(rec)
    }

    /// Certificates currently listed on the marketplace.
    pub async fn list_available(&self) -> Result<Vec<Rec>> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare_cached(
            "SELECT id, token_id, energy_source, location, mwh, price,
                    generation_date, status, owner_id, created_at
             FROM recs WHERE status = 'available' ORDER BY created_at DESC",
        )?;
        let recs = stmt
            .query_map([], row_to_rec)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(recs)
    }

    pub async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<Rec>> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare_cached(
            "SELECT id, token_id, energy_source, location, mwh, price,
                    generation_date, status, owner_id, created_at
             FROM recs WHERE owner_id = ?1 ORDER BY created_at DESC",
        )?;
        let recs = stmt
            .query_map([owner_id], row_to_rec)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(recs)
    }

    /// Settle a purchase: move the REC to the buyer and append the trade
    /// record, both inside one transaction. The owner update is conditioned
    /// on `status = 'available'`; returns `false` (and writes nothing) when
    /// a concurrent purchase got there first.
    pub async fn settle_purchase(&self, trade: &TradeRecord) -> Result<bool> {
        let mut db = self.db.lock().await;
        let tx = db.transaction()?;

        let changed = tx.execute(
            "UPDATE recs SET owner_id = ?1, status = 'sold'
             WHERE id = ?2 AND status = 'available'",
            params![trade.buyer_id, trade.rec_id],
        )?;
        if changed == 0 {
            return Ok(false);
        }

        tx.execute(
            "INSERT INTO trades (id, rec_id, buyer_id, seller_id, amount, ledger_tx_id, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                trade.id,
                trade.rec_id,
                trade.buyer_id,
                trade.seller_id,
                trade.amount,
                trade.ledger_tx_id,
                trade.timestamp,
            ],
        )?;

        tx.commit()?;
        debug!(rec_id = %trade.rec_id, buyer = %trade.buyer_id, "Purchase settled");
        Ok(true)
    }

    /// Mark a REC retired. Conditioned on a pre-retired status; returns
    /// `false` when the certificate was already retired.
    pub async fn mark_retired(&self, id: &str) -> Result<bool> {
        let db = self.db.lock().await;
        let changed = db.execute(
            "UPDATE recs SET status = 'retired'
             WHERE id = ?1 AND status IN ('available', 'sold')",
            [id],
        )?;
        Ok(changed == 1)
    }

    pub async fn trades_for(&self, rec_id: &str) -> Result<Vec<TradeRecord>> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare_cached(
            "SELECT id, rec_id, buyer_id, seller_id, amount, ledger_tx_id, timestamp
             FROM trades WHERE rec_id = ?1 ORDER BY timestamp",
        )?;
        let trades = stmt
            .query_map([rec_id], |row| {
                Ok(TradeRecord {
                    id: row.get(0)?,
                    rec_id: row.get(1)?,
                    buyer_id: row.get(2)?,
                    seller_id: row.get(3)?,
                    amount: row.get(4)?,
                    ledger_tx_id: row.get(5)?,
                    timestamp: row.get(6)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(trades)
    }

    pub async fn count(&self) -> Result<u64> {
        let db = self.db.lock().await;
        let count: u64 = db.query_row("SELECT count(*) FROM recs", [], |row| row.get(0))?;
        Ok(count)
    }
}

fn row_to_rec(row: &rusqlite::Row<'_>) -> rusqlite::Result<Rec> {
    let status: String = row.get(7)?;
    Ok(Rec {
        id: row.get(0)?,
        token_id: row.get(1)?,
        energy_source: row.get(2)?,
        location: row.get(3)?,
        mwh: row.get(4)?,
        price: row.get(5)?,
        generation_date: row.get(6)?,
        status: RecStatus::parse(&status),
        owner_id: row.get(8)?,
        created_at: row.get(9)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample(id: &str) -> Rec {
        Rec {
            id: id.to_string(),
            token_id: Some("0.0.5001".to_string()),
            energy_source: "solar".to_string(),
            location: "Mojave Desert, CA".to_string(),
            mwh: 100,
            price: 45.0,
            generation_date: "2024-07-01".to_string(),
            status: RecStatus::Available,
            owner_id: "0.0.2".to_string(),
            created_at: 1_720_000_000,
        }
    }

    fn trade(rec_id: &str, buyer: &str) -> TradeRecord {
        TradeRecord {
            id: uuid::Uuid::new_v4().to_string(),
            rec_id: rec_id.to_string(),
            buyer_id: buyer.to_string(),
            seller_id: "0.0.2".to_string(),
            amount: 4500.0,
            ledger_tx_id: "0.0.2@1".to_string(),
            timestamp: 1_720_000_100,
        }
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let dir = TempDir::new().unwrap();
        let store = RecStore::open(dir.path()).unwrap();

        store.insert(&sample("rec-1")).await.unwrap();
        let rec = store.get("rec-1").await.unwrap().unwrap();
        assert_eq!(rec.energy_source, "solar");
        assert_eq!(rec.status, RecStatus::Available);
        assert!(store.get("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_available_excludes_sold() {
        let dir = TempDir::new().unwrap();
        let store = RecStore::open(dir.path()).unwrap();

        store.insert(&sample("rec-1")).await.unwrap();
        store.insert(&sample("rec-2")).await.unwrap();
        store.settle_purchase(&trade("rec-1", "0.0.9")).await.unwrap();

        let available = store.list_available().await.unwrap();
        assert_eq!(available.len(), 1);
        assert_eq!(available[0].id, "rec-2");
    }

    #[tokio::test]
    async fn test_settle_purchase_moves_ownership_once() {
        let dir = TempDir::new().unwrap();
        let store = RecStore::open(dir.path()).unwrap();
        store.insert(&sample("rec-1")).await.unwrap();

        assert!(store.settle_purchase(&trade("rec-1", "0.0.9")).await.unwrap());
        // Second settlement loses the compare-and-set
        assert!(!store.settle_purchase(&trade("rec-1", "0.0.8")).await.unwrap());

        let rec = store.get("rec-1").await.unwrap().unwrap();
        assert_eq!(rec.owner_id, "0.0.9");
        assert_eq!(rec.status, RecStatus::Sold);
        assert_eq!(store.trades_for("rec-1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_retire_from_available_and_sold() {
        let dir = TempDir::new().unwrap();
        let store = RecStore::open(dir.path()).unwrap();

        store.insert(&sample("rec-1")).await.unwrap();
        assert!(store.mark_retired("rec-1").await.unwrap());

        store.insert(&sample("rec-2")).await.unwrap();
        store.settle_purchase(&trade("rec-2", "0.0.9")).await.unwrap();
        assert!(store.mark_retired("rec-2").await.unwrap());

        // Already retired: no transition
        assert!(!store.mark_retired("rec-1").await.unwrap());
    }
}
