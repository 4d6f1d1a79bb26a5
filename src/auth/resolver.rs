//! Account key lookup via the ledger's mirror node
//!
//! Login verification needs the public key registered for an account on the
//! external ledger. The mirror node's REST API is the read-only source for
//! that; failures and non-Ed25519 keys are first-class outcomes the login
//! flow branches on, not generic errors.

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

/// Key algorithm registered for an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyType {
    Ed25519,
    EcdsaSecp256k1,
    Unknown,
}

/// Public key material for an account, as returned by the mirror node.
#[derive(Debug, Clone)]
pub struct AccountKey {
    /// Base64-encoded raw public key
    pub public_key: String,
    pub key_type: KeyType,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ResolverError {
    #[error("Account not found")]
    NotFound,

    #[error("Public key not found for account")]
    NoKey,

    #[error("Mirror node error: {0}")]
    Lookup(String),
}

/// Resolves an account reference to its registered public key.
#[async_trait]
pub trait KeyResolver: Send + Sync {
    async fn resolve(&self, account_id: &str) -> Result<AccountKey, ResolverError>;
}

/// [`KeyResolver`] backed by a mirror node REST endpoint.
pub struct MirrorNodeResolver {
    base_url: String,
    client: reqwest::Client,
}

impl MirrorNodeResolver {
    pub fn new(base_url: String) -> Self {
        Self {
            base_url,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl KeyResolver for MirrorNodeResolver {
    async fn resolve(&self, account_id: &str) -> Result<AccountKey, ResolverError> {
        let url = format!("{}/api/v1/accounts/{}", self.base_url, account_id);
        let response = self
            .client
            .get(&url)
            .timeout(std::time::Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| ResolverError::Lookup(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(ResolverError::NotFound);
        }
        if !response.status().is_success() {
            return Err(ResolverError::Lookup(format!(
                "Mirror node returned HTTP {}",
                response.status()
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ResolverError::Lookup(e.to_string()))?;

        let key = parse_account_key(&body).ok_or(ResolverError::NoKey)?;
        debug!(account_id, key_type = ?key.key_type, "Resolved account key");
        Ok(key)
    }
}

/// Extract the key from a mirror node account document.
///
/// Two shapes exist in the wild: the documented `{key: {_type, key}}` and a
/// legacy per-algorithm form `{key: {ed25519}}` / `{key: {ecdsa_secp256k1}}`.
fn parse_account_key(body: &Value) -> Option<AccountKey> {
    let key_obj = body.get("key")?;

    let raw = key_obj
        .get("key")
        .or_else(|| key_obj.get("ed25519"))
        .or_else(|| key_obj.get("ecdsa_secp256k1"))?
        .as_str()?
        .to_string();

    let key_type = match key_obj.get("_type").and_then(Value::as_str) {
        Some("ED25519") => KeyType::Ed25519,
        Some("ECDSA_SECP256K1") => KeyType::EcdsaSecp256k1,
        Some(_) => KeyType::Unknown,
        None => {
            if key_obj.get("ed25519").is_some() {
                KeyType::Ed25519
            } else if key_obj.get("ecdsa_secp256k1").is_some() {
                KeyType::EcdsaSecp256k1
            } else {
                KeyType::Unknown
            }
        }
    };

    Some(AccountKey {
        public_key: raw,
        key_type,
    })
}
