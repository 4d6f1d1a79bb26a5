//! In-process token ledger
//!
//! A [`LedgerGateway`] holding token state in memory with the same rules a
//! public token service imposes: accounts must associate a token before
//! receiving it, transfers and wipes are balance-checked, and the treasury
//! cannot be wiped (a retire against treasury-held supply must burn
//! instead). A gateway for a real ledger network implements the same trait
//! out of tree.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::info;

use super::{LedgerError, LedgerGateway, TxReceipt};

#[derive(Debug)]
struct TokenState {
    #[allow(dead_code)]
    name: String,
    #[allow(dead_code)]
    symbol: String,
    supply: u64,
    balances: HashMap<String, u64>,
    associated: HashSet<String>,
}

#[derive(Debug, Default)]
struct LedgerState {
    tokens: HashMap<String, TokenState>,
    next_token: u64,
    next_tx: u64,
}

/// In-memory token ledger. `operator` is the treasury account; when absent
/// every mutating call fails [`LedgerError::NotConfigured`].
pub struct TokenLedger {
    operator: Option<String>,
    state: Mutex<LedgerState>,
}

impl TokenLedger {
    pub fn new(operator: Option<String>) -> Self {
        Self {
            operator,
            state: Mutex::new(LedgerState::default()),
        }
    }

    fn operator(&self) -> Result<&str, LedgerError> {
        self.operator.as_deref().ok_or(LedgerError::NotConfigured)
    }

    /// Associate an account with a token so it can receive transfers. On a
    /// public ledger this is done by the account holder's wallet.
    pub fn associate(&self, token_id: &str, account_id: &str) -> Result<(), LedgerError> {
        let mut state = self.state.lock().unwrap();
        let token = state
            .tokens
            .get_mut(token_id)
            .ok_or_else(|| LedgerError::Rejected(format!("Unknown token {}", token_id)))?;
        token.associated.insert(account_id.to_string());
        Ok(())
    }

    /// Current balance of an account for a token.
    pub fn balance(&self, token_id: &str, account_id: &str) -> u64 {
        let state = self.state.lock().unwrap();
        state
            .tokens
            .get(token_id)
            .and_then(|t| t.balances.get(account_id).copied())
            .unwrap_or(0)
    }

    /// Circulating supply of a token.
    pub fn supply(&self, token_id: &str) -> u64 {
        let state = self.state.lock().unwrap();
        state.tokens.get(token_id).map(|t| t.supply).unwrap_or(0)
    }

    fn receipt(state: &mut LedgerState) -> TxReceipt {
        state.next_tx += 1;
        TxReceipt {
            transaction_id: format!("0.0.2@{}", state.next_tx),
            status: "SUCCESS".to_string(),
        }
    }
}

#[async_trait]
impl LedgerGateway for TokenLedger {
    fn is_configured(&self) -> bool {
        self.operator.is_some()
    }

    fn operator_account(&self) -> Option<String> {
        self.operator.clone()
    }

    async fn create_token(
        &self,
        name: &str,
        symbol: &str,
        initial_supply: u64,
    ) -> Result<String, LedgerError> {
        let treasury = self.operator()?.to_string();
        let mut state = self.state.lock().unwrap();

        state.next_token += 1;
        let token_id = format!("0.0.{}", 5000 + state.next_token);

        let mut balances = HashMap::new();
        balances.insert(treasury.clone(), initial_supply);
        // The treasury is implicitly associated with its own issuance
        let mut associated = HashSet::new();
        associated.insert(treasury);

        state.tokens.insert(
            token_id.clone(),
            TokenState {
                name: name.to_string(),
                symbol: symbol.to_string(),
                supply: initial_supply,
                balances,
                associated,
            },
        );

        info!(token_id, name, symbol, initial_supply, "Token created");
        Ok(token_id)
    }

    async fn transfer(
        &self,
        token_id: &str,
        from: &str,
        to: &str,
        amount: u64,
    ) -> Result<TxReceipt, LedgerError> {
        self.operator()?;
        let mut state = self.state.lock().unwrap();

        let token = state
            .tokens
            .get_mut(token_id)
            .ok_or_else(|| LedgerError::Rejected(format!("Unknown token {}", token_id)))?;

        if !token.associated.contains(to) {
            return Err(LedgerError::NotAssociated {
                token_id: token_id.to_string(),
            });
        }

        let from_balance = token.balances.get(from).copied().unwrap_or(0);
        if from_balance < amount {
            return Err(LedgerError::InsufficientBalance);
        }

        token.balances.insert(from.to_string(), from_balance - amount);
        *token.balances.entry(to.to_string()).or_insert(0) += amount;

        info!(token_id, from, to, amount, "Token transfer");
        Ok(Self::receipt(&mut state))
    }

    async fn wipe(
        &self,
        token_id: &str,
        account_id: &str,
        amount: u64,
    ) -> Result<TxReceipt, LedgerError> {
        let treasury = self.operator()?.to_string();
        let mut state = self.state.lock().unwrap();

        let token = state
            .tokens
            .get_mut(token_id)
            .ok_or_else(|| LedgerError::Rejected(format!("Unknown token {}", token_id)))?;

        // Token-service rule: the treasury's own balance cannot be wiped
        if account_id == treasury {
            return Err(LedgerError::Rejected(
                "CANNOT_WIPE_TOKEN_TREASURY_ACCOUNT".to_string(),
            ));
        }
        if !token.associated.contains(account_id) {
            return Err(LedgerError::NotAssociated {
                token_id: token_id.to_string(),
            });
        }

        let balance = token.balances.get(account_id).copied().unwrap_or(0);
        if balance < amount {
            return Err(LedgerError::InsufficientBalance);
        }

        token.balances.insert(account_id.to_string(), balance - amount);
        token.supply -= amount;

        info!(token_id, account_id, amount, "Token wipe");
        Ok(Self::receipt(&mut state))
    }

    async fn burn(&self, token_id: &str, amount: u64) -> Result<TxReceipt, LedgerError> {
        let treasury = self.operator()?.to_string();
        let mut state = self.state.lock().unwrap();

        let token = state
            .tokens
            .get_mut(token_id)
            .ok_or_else(|| LedgerError::Rejected(format!("Unknown token {}", token_id)))?;

        let balance = token.balances.get(&treasury).copied().unwrap_or(0);
        if balance < amount {
            return Err(LedgerError::InsufficientBalance);
        }

        token.balances.insert(treasury, balance - amount);
        token.supply -= amount;

        info!(token_id, amount, "Token burn from treasury");
        Ok(Self::receipt(&mut state))
    }
}
