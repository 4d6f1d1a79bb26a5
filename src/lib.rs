//! Marketplace backend for EcoLedger renewable energy certificates
//!
//! Certificates ("RECs") are tracked in two places: a local SQLite ledger
//! holding owner and lifecycle status, and an external token ledger holding
//! supply, transfers, and burns. The crate provides:
//! - Challenge-response wallet login (Ed25519, single-use nonce per account)
//! - The REC lifecycle state machine: mint, purchase, retire
//! - The HTTP API tying both together

pub mod api;
pub mod auth;
pub mod config;
pub mod ledger;
pub mod recs;
