//! In-memory nonce and session storage
//!
//! Challenges and sessions are process-local with fixed lifetimes. Expired
//! entries are deleted on read rather than by a background sweep.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use rand::RngCore;

/// An issued login challenge awaiting a signature.
#[derive(Debug, Clone)]
pub struct NonceEntry {
    pub nonce: String,
    pub expires_at: u64,
}

/// An authenticated session.
#[derive(Debug, Clone)]
pub struct Session {
    pub account_id: String,
    pub expires_at: u64,
}

/// Nonce and session lifecycle, keyed per account / per token.
///
/// Every operation must be atomic with respect to concurrent callers for the
/// same key: a nonce is consumed exactly once, and re-issuing discards any
/// prior outstanding challenge for the account.
pub trait AuthStore: Send + Sync {
    /// Issue a fresh challenge for the account, replacing any prior one.
    fn issue_nonce(&self, account_id: &str) -> NonceEntry;

    /// Atomically fetch and delete the outstanding nonce. Returns `None` if
    /// absent or expired; an expired entry is deleted by the lookup itself.
    fn consume_nonce(&self, account_id: &str) -> Option<String>;

    /// Mint a session for a verified account.
    fn create_session(&self, account_id: &str) -> (String, Session);

    /// Look up a session by bearer token, deleting it if expired.
    fn get_session(&self, token: &str) -> Option<Session>;
}

/// Process-wide in-memory [`AuthStore`].
pub struct MemoryAuthStore {
    nonce_ttl: Duration,
    session_ttl: Duration,
    nonces: Mutex<HashMap<String, NonceEntry>>,
    sessions: Mutex<HashMap<String, Session>>,
}

impl MemoryAuthStore {
    pub fn new(nonce_ttl: Duration, session_ttl: Duration) -> Self {
        Self {
            nonce_ttl,
            session_ttl,
            nonces: Mutex::new(HashMap::new()),
            sessions: Mutex::new(HashMap::new()),
        }
    }
}

impl AuthStore for MemoryAuthStore {
    fn issue_nonce(&self, account_id: &str) -> NonceEntry {
        let entry = NonceEntry {
            nonce: random_hex(32),
            expires_at: now_millis() + self.nonce_ttl.as_millis() as u64,
        };
        self.nonces
            .lock()
            .unwrap()
            .insert(account_id.to_string(), entry.clone());
        entry
    }

    fn consume_nonce(&self, account_id: &str) -> Option<String> {
        // remove() under the lock is the atomic get-and-delete; a nonce is
        // gone after the first consumption attempt whatever happens next.
        let entry = self.nonces.lock().unwrap().remove(account_id)?;
        if now_millis() > entry.expires_at {
            return None;
        }
        Some(entry.nonce)
    }

    fn create_session(&self, account_id: &str) -> (String, Session) {
        let token = random_hex(32);
        let session = Session {
            account_id: account_id.to_string(),
            expires_at: now_millis() + self.session_ttl.as_millis() as u64,
        };
        self.sessions
            .lock()
            .unwrap()
            .insert(token.clone(), session.clone());
        (token, session)
    }

    fn get_session(&self, token: &str) -> Option<Session> {
        let mut sessions = self.sessions.lock().unwrap();
        let session = sessions.get(token)?;
        if now_millis() > session.expires_at {
            sessions.remove(token);
            return None;
        }
        Some(session.clone())
    }
}

/// Cryptographically random hex string of `bytes` bytes of entropy.
fn random_hex(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    rand::rngs::OsRng.fill_bytes(&mut buf);
    hex::encode(buf)
}

pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_millis() as u64
}
