//! Token ledger gateway
//!
//! The marketplace's authoritative token state (supply, transfers, burns)
//! lives on an external distributed ledger. The lifecycle controller talks
//! to it through [`LedgerGateway`] and branches on the typed failures below;
//! it never inspects ledger wire formats itself.

pub mod token;

use async_trait::async_trait;

/// Outcome of a mutating ledger call.
#[derive(Debug, Clone)]
pub struct TxReceipt {
    pub transaction_id: String,
    pub status: String,
}

/// Failures the lifecycle controller distinguishes.
#[derive(Debug, Clone, thiserror::Error)]
pub enum LedgerError {
    /// Operator credentials are absent; nothing was sent to the network.
    #[error("Ledger operator not configured")]
    NotConfigured,

    /// The destination account has not associated the token type. The
    /// caller is expected to prompt association and retry.
    #[error("Token {token_id} not associated with account")]
    NotAssociated { token_id: String },

    /// Holder balance below the requested amount.
    #[error("Insufficient token balance")]
    InsufficientBalance,

    /// The network accepted the submission but rejected the operation.
    #[error("Ledger rejected operation: {0}")]
    Rejected(String),

    /// Transport-level failure reaching the network.
    #[error("Ledger network error: {0}")]
    Network(String),
}

/// Mutating operations against the token ledger.
///
/// Every call either fully succeeds with a transaction reference or fails
/// with a typed error; in-flight calls are always awaited to completion
/// because a ledger-side effect may already have landed.
#[async_trait]
pub trait LedgerGateway: Send + Sync {
    /// Whether operator credentials are present. Checked before any
    /// mutating call so an unconfigured node fails fast without a network
    /// round-trip.
    fn is_configured(&self) -> bool;

    /// Treasury account id, when configured.
    fn operator_account(&self) -> Option<String>;

    /// Create a fungible token with the treasury holding the initial
    /// supply. Returns the new token id.
    async fn create_token(
        &self,
        name: &str,
        symbol: &str,
        initial_supply: u64,
    ) -> Result<String, LedgerError>;

    /// Move `amount` of `token_id` between accounts. Fails
    /// [`LedgerError::NotAssociated`] when the destination has not
    /// associated the token.
    async fn transfer(
        &self,
        token_id: &str,
        from: &str,
        to: &str,
        amount: u64,
    ) -> Result<TxReceipt, LedgerError>;

    /// Destructively remove `amount` from a specific holder's balance.
    async fn wipe(
        &self,
        token_id: &str,
        account_id: &str,
        amount: u64,
    ) -> Result<TxReceipt, LedgerError>;

    /// Destructively remove `amount` from the treasury's own balance.
    async fn burn(&self, token_id: &str, amount: u64) -> Result<TxReceipt, LedgerError>;
}
