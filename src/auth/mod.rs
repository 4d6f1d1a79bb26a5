//! Wallet login protocol
//!
//! Challenge-response authentication binding an externally held Ed25519 key
//! pair to a server session:
//! 1. Client requests a nonce for its account
//! 2. Client signs the challenge message in its wallet
//! 3. Server consumes the nonce, reconstructs the message, resolves the
//!    account's public key, and verifies the signature
//! 4. On success a bearer session is minted
//!
//! The private key never travels; replaying a signature fails at nonce
//! consumption, not at verification.

pub mod resolver;
pub mod signature;
pub mod store;

use std::sync::Arc;

use tracing::{info, warn};

use resolver::{KeyResolver, KeyType, ResolverError};
use signature::{SignatureError, SignatureInput};
use store::{AuthStore, NonceEntry, Session};

/// Login failure modes, each mapped to a distinct HTTP outcome by the API
/// layer.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No outstanding challenge, or the challenge expired. The client must
    /// restart from nonce issuance.
    #[error("Invalid or expired nonce")]
    InvalidNonce,

    /// The account's registered key is not Ed25519.
    #[error("Unsupported key type")]
    UnsupportedKeyType,

    /// Signature decoded but did not verify against the account key.
    #[error("Signature verification failed")]
    VerificationFailed,

    #[error(transparent)]
    Signature(#[from] SignatureError),

    #[error(transparent)]
    Resolver(#[from] ResolverError),
}

/// Orchestrates nonce issuance, message reconstruction, verification, and
/// session minting. Collaborators are injected so tests can substitute the
/// resolver and store.
pub struct AuthController {
    store: Arc<dyn AuthStore>,
    resolver: Arc<dyn KeyResolver>,
}

impl AuthController {
    pub fn new(store: Arc<dyn AuthStore>, resolver: Arc<dyn KeyResolver>) -> Self {
        Self { store, resolver }
    }

    /// Step 1: issue a login challenge for the account.
    pub fn issue_nonce(&self, account_id: &str) -> NonceEntry {
        self.store.issue_nonce(account_id)
    }

    /// The exact challenge text the wallet signs. Client and server derive
    /// this independently; it is never transmitted or stored.
    pub fn login_message(account_id: &str, nonce: &str) -> String {
        format!("EcoLedger Login\nAccount: {}\nNonce: {}", account_id, nonce)
    }

    /// Steps 2-5: consume the nonce, verify the signature against the
    /// account's registered key, and mint a session.
    pub async fn verify(
        &self,
        account_id: &str,
        signature: &SignatureInput,
    ) -> Result<(String, Session), AuthError> {
        // The nonce is gone after this regardless of what verification says.
        let nonce = self
            .store
            .consume_nonce(account_id)
            .ok_or(AuthError::InvalidNonce)?;

        let message = Self::login_message(account_id, &nonce);
        let key = self.resolver.resolve(account_id).await?;

        if key.key_type != KeyType::Ed25519 {
            warn!(account_id, key_type = ?key.key_type, "Login with unsupported key type");
            return Err(AuthError::UnsupportedKeyType);
        }

        if !signature::verify_ed25519(&message, signature, &key.public_key)? {
            warn!(account_id, "Signature verification failed");
            return Err(AuthError::VerificationFailed);
        }

        let (token, session) = self.store.create_session(account_id);
        info!(account_id, "Wallet login verified, session created");
        Ok((token, session))
    }

    /// Validate a bearer token on an authenticated request.
    pub fn authenticate(&self, token: &str) -> Option<Session> {
        self.store.get_session(token)
    }
}
